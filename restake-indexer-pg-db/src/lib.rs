// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::anyhow;
use diesel::migration::{Migration, MigrationSource, MigrationVersion};
use diesel::pg::Pg;
use diesel::ConnectionError;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::ManagerConfig;
use diesel_async::{
    pooled_connection::{
        bb8::{Pool, PooledConnection},
        AsyncDieselConnectionManager,
    },
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use diesel_migrations::EmbeddedMigrations;
use futures::FutureExt;
use tracing::info;
use url::Url;

pub mod query;

pub use query::Query;

#[derive(clap::Args, Debug, Clone)]
pub struct DbArgs {
    /// Number of connections to keep in the pool.
    #[arg(long, env = "DB_CONNECTION_POOL_SIZE", default_value_t = Self::default().db_connection_pool_size)]
    pub db_connection_pool_size: u32,

    /// Time spent waiting for a connection from the pool to become available, in milliseconds.
    #[arg(long, default_value_t = Self::default().db_connection_timeout_ms)]
    pub db_connection_timeout_ms: u64,

    /// Time spent waiting for statements to complete, in milliseconds.
    #[arg(long)]
    pub db_statement_timeout_ms: Option<u64>,
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<AsyncPgConnection>,
    database_url: String,
}

/// A pooled connection. Derefs to the diesel-async connection so it can be handed straight to
/// `RunQueryDsl` methods.
pub struct Connection<'a>(PooledConnection<'a, AsyncPgConnection>);

impl DbArgs {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.db_connection_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.db_statement_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for DbArgs {
    fn default() -> Self {
        Self {
            db_connection_pool_size: 100,
            db_connection_timeout_ms: 60_000,
            db_statement_timeout_ms: None,
        }
    }
}

impl Db {
    /// Pool used by the sync engine. Instances can be cloned to share the same pool.
    pub async fn for_write(database_url: Url, config: DbArgs) -> anyhow::Result<Self> {
        let pool = pool(database_url.clone(), config, false).await?;
        Ok(Self {
            pool,
            database_url: database_url.to_string(),
        })
    }

    /// Pool whose connections default to read-only transactions, for the metric aggregator.
    pub async fn for_read(database_url: Url, config: DbArgs) -> anyhow::Result<Self> {
        let pool = pool(database_url.clone(), config, true).await?;
        Ok(Self {
            pool,
            database_url: database_url.to_string(),
        })
    }

    /// Can fail with a timeout if no connection frees up within [DbArgs::connection_timeout].
    pub async fn connect(&self) -> anyhow::Result<Connection<'_>> {
        Ok(Connection(self.pool.get().await?))
    }

    async fn clear_database(&self) -> anyhow::Result<()> {
        info!("Clearing the database...");
        let mut conn = self.connect().await?;
        let drop_all_tables = "
        DO $$ DECLARE
            r RECORD;
        BEGIN
        FOR r IN (SELECT tablename FROM pg_tables WHERE schemaname = 'public')
            LOOP
                EXECUTE 'DROP TABLE IF EXISTS ' || quote_ident(r.tablename) || ' CASCADE';
            END LOOP;
        END $$;";
        diesel::sql_query(drop_all_tables)
            .execute(&mut conn)
            .await?;
        info!("Database cleared.");
        Ok(())
    }

    /// Applies any pending migrations from `migrations` on a dedicated connection.
    pub async fn run_migrations(
        &self,
        migrations: &'static EmbeddedMigrations,
    ) -> anyhow::Result<Vec<MigrationVersion<'static>>> {
        use diesel_migrations::MigrationHarness;

        info!("Running migrations ...");
        let conn = AsyncPgConnection::establish(&self.database_url)
            .await
            .map_err(|e| anyhow!("Failed to establish connection for migrations: {}", e))?;
        let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> = conn.into();

        let source = StaticMigrations(migrations);
        let finished_migrations: Vec<MigrationVersion<'static>> =
            tokio::task::spawn_blocking(move || {
                wrapper.run_pending_migrations(source).map(|versions| {
                    versions
                        .iter()
                        .map(MigrationVersion::as_owned)
                        .collect::<Vec<_>>()
                })
            })
            .await?
            .map_err(|e| anyhow!("Failed to run migrations: {:?}", e))?;

        info!("Migrations complete, {} applied.", finished_migrations.len());
        Ok(finished_migrations)
    }
}

/// Drop every table, then re-run `migrations`.
pub async fn reset_database(
    database_url: Url,
    db_config: DbArgs,
    migrations: &'static EmbeddedMigrations,
) -> anyhow::Result<()> {
    let db = Db::for_write(database_url, db_config).await?;
    db.clear_database().await?;
    db.run_migrations(migrations).await?;
    Ok(())
}

impl<'a> Deref for Connection<'a> {
    type Target = PooledConnection<'a, AsyncPgConnection>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Connection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

async fn pool(
    database_url: Url,
    args: DbArgs,
    read_only: bool,
) -> anyhow::Result<Pool<AsyncPgConnection>> {
    let statement_timeout = args.statement_timeout();

    let mut config = ManagerConfig::default();

    config.custom_setup = Box::new(move |url| {
        async move {
            let mut conn = AsyncPgConnection::establish(url).await?;

            if let Some(timeout) = statement_timeout {
                diesel::sql_query(format!("SET statement_timeout = {}", timeout.as_millis()))
                    .execute(&mut conn)
                    .await
                    .map_err(ConnectionError::CouldntSetupConfiguration)?;
            }

            if read_only {
                diesel::sql_query("SET default_transaction_read_only = 'on'")
                    .execute(&mut conn)
                    .await
                    .map_err(ConnectionError::CouldntSetupConfiguration)?;
            }

            Ok(conn)
        }
        .boxed()
    });

    let manager = AsyncDieselConnectionManager::new_with_config(database_url.as_str(), config);

    Ok(Pool::builder()
        .max_size(args.db_connection_pool_size)
        .connection_timeout(args.connection_timeout())
        .build(manager)
        .await?)
}

// `run_pending_migrations` takes its source by value and must move into the blocking task.
struct StaticMigrations(&'static EmbeddedMigrations);

impl MigrationSource<Pg> for StaticMigrations {
    fn migrations(&self) -> diesel::migration::Result<Vec<Box<dyn Migration<Pg>>>> {
        self.0.migrations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::migration::MigrationName;
    use diesel_migrations::embed_migrations;

    const MIGRATIONS: EmbeddedMigrations =
        embed_migrations!("../restake-indexer-schema/migrations");

    #[test]
    fn test_static_migrations_yield_owned_versions() {
        let versions: Vec<MigrationVersion<'static>> = StaticMigrations(&MIGRATIONS)
            .migrations()
            .unwrap()
            .iter()
            .map(|m| m.name().version().as_owned())
            .collect();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].to_string(), "20240101000000");
    }

    #[test]
    fn test_db_args_defaults() {
        let args = DbArgs::default();
        assert_eq!(args.db_connection_pool_size, 100);
        assert_eq!(args.connection_timeout(), Duration::from_secs(60));
        assert_eq!(args.statement_timeout(), None);

        let args = DbArgs {
            db_statement_timeout_ms: Some(1_500),
            ..DbArgs::default()
        };
        assert_eq!(args.statement_timeout(), Some(Duration::from_millis(1_500)));
    }
}
