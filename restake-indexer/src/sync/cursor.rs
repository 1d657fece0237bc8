// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-stream sync cursors.
//!
//! A cursor is the last block whose logs have been durably written for one stream. It lives in
//! the `settings` key/value table under the stream's cursor key and only ever moves forward.

use std::collections::HashMap;
use std::sync::Arc;

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use restake_indexer_pg_db::Db;
use restake_indexer_schema::models::Setting;
use restake_indexer_schema::schema::settings;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{IndexerError, IndexerResult};
use crate::sync::streams::StreamKind;

#[async_trait::async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, key: &str) -> IndexerResult<Option<u64>>;

    async fn set(&self, key: &str, block: u64) -> IndexerResult<()>;
}

#[derive(Clone)]
pub struct PgCursorStore {
    db: Db,
}

impl PgCursorStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn store_error(e: anyhow::Error) -> IndexerError {
    IndexerError::Store(e.to_string())
}

#[async_trait::async_trait]
impl CursorStore for PgCursorStore {
    async fn get(&self, key: &str) -> IndexerResult<Option<u64>> {
        use settings::dsl;

        let mut conn = self.db.connect().await.map_err(store_error)?;
        let value: Option<serde_json::Value> = dsl::settings
            .filter(dsl::key.eq(key))
            .select(dsl::value)
            .first(&mut conn)
            .await
            .optional()?;

        match value {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                IndexerError::Store(format!("Setting {} is not a block number: {}", key, value))
            }),
        }
    }

    async fn set(&self, key: &str, block: u64) -> IndexerResult<()> {
        use settings::dsl;

        let mut conn = self.db.connect().await.map_err(store_error)?;
        let row = Setting {
            key: key.to_string(),
            value: serde_json::Value::from(block),
            updated_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        diesel::insert_into(dsl::settings)
            .values(&row)
            .on_conflict(dsl::key)
            .do_update()
            .set((
                dsl::value.eq(&row.value),
                dsl::updated_at_ms.eq(row.updated_at_ms),
            ))
            .execute(&mut conn)
            .await?;

        debug!("Updated cursor '{}' to {}", key, block);
        Ok(())
    }
}

/// Cursors of every stream, seeded with the network's genesis block.
pub struct SyncCursors {
    store: Arc<dyn CursorStore>,
    genesis_block: u64,
    // Last value this process wrote, per key
    known: Mutex<HashMap<&'static str, u64>>,
}

impl SyncCursors {
    pub fn new(store: Arc<dyn CursorStore>, genesis_block: u64) -> Self {
        Self {
            store,
            genesis_block,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn genesis_block(&self) -> u64 {
        self.genesis_block
    }

    /// The stream's cursor, or the genesis block when the stream never synced.
    pub async fn get(&self, kind: StreamKind) -> IndexerResult<u64> {
        Ok(self
            .store
            .get(kind.cursor_key())
            .await?
            .unwrap_or(self.genesis_block))
    }

    /// Move the cursor to `block`. Moving backwards is rejected.
    ///
    /// Each stream advances its own cursor from a single task, so the lock only guards the map and
    /// is never held across the store write.
    pub async fn advance(&self, kind: StreamKind, block: u64) -> IndexerResult<()> {
        let known = self.known.lock().await.get(kind.cursor_key()).copied();
        let current = match known {
            Some(current) => current,
            None => self.get(kind).await?,
        };
        if block < current {
            return Err(IndexerError::Validation(format!(
                "[{}] cursor cannot move backwards from {} to {}",
                kind, current, block
            )));
        }
        self.store.set(kind.cursor_key(), block).await?;
        self.known.lock().await.insert(kind.cursor_key(), block);
        Ok(())
    }
}
