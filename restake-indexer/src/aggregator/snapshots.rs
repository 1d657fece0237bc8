// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read access to the hourly metric snapshot tables.

use std::fmt;
use std::str::FromStr;

use diesel::sql_types::{BigInt, Text};
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;
use restake_indexer_pg_db::{Db, Query};
use strum_macros::EnumString;

use crate::decimal::{TokenAmount, ETH_SCALE};
use crate::error::{IndexerError, IndexerResult};

/// One snapshot row reduced to the requested field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRow {
    pub timestamp_ms: i64,
    /// Absolute value at `timestamp_ms`.
    pub value: f64,
    /// Change since the previous snapshot.
    pub delta: f64,
}

/// Snapshot row as stored, numeric columns rendered as exact decimal text.
#[derive(Debug, Clone, QueryableByName)]
struct StoredSnapshotRow {
    #[diesel(sql_type = BigInt)]
    timestamp_ms: i64,
    #[diesel(sql_type = Text)]
    value: String,
    #[diesel(sql_type = Text)]
    delta: String,
}

impl TryFrom<StoredSnapshotRow> for SnapshotRow {
    type Error = IndexerError;

    fn try_from(row: StoredSnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp_ms: row.timestamp_ms,
            value: TokenAmount::parse(&row.value, ETH_SCALE)?.to_f64_lossy(),
            delta: TokenAmount::parse(&row.delta, ETH_SCALE)?.to_f64_lossy(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricEntity {
    Strategy(String),
    Avs(String),
    Operator(String),
    /// ETH restaked natively through eigen pods.
    BeaconChain,
}

impl MetricEntity {
    pub fn strategy(address: &str) -> Self {
        MetricEntity::Strategy(address.to_lowercase())
    }

    pub fn avs(address: &str) -> Self {
        MetricEntity::Avs(address.to_lowercase())
    }

    pub fn operator(address: &str) -> Self {
        MetricEntity::Operator(address.to_lowercase())
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            MetricEntity::Strategy(a) | MetricEntity::Avs(a) | MetricEntity::Operator(a) => {
                Some(a)
            }
            MetricEntity::BeaconChain => None,
        }
    }

    /// Table and columns holding `field` for this entity.
    pub fn columns(&self, field: MetricField) -> IndexerResult<SnapshotColumns> {
        use MetricField::*;

        let (table, key) = match self {
            MetricEntity::Strategy(_) => ("metric_strategy_hourly", Some("strategy_address")),
            MetricEntity::Avs(_) => ("metric_avs_hourly", Some("avs_address")),
            MetricEntity::Operator(_) => ("metric_operator_hourly", Some("operator_address")),
            MetricEntity::BeaconChain => ("metric_eigen_pods_hourly", None),
        };
        let (value, delta) = match (self, field) {
            (MetricEntity::Strategy(_), Tvl) => ("tvl", "change_tvl"),
            (_, TvlEth) => ("tvl_eth", "change_tvl_eth"),
            (MetricEntity::Avs(_) | MetricEntity::Operator(_), Stakers) => {
                ("total_stakers", "change_stakers")
            }
            (MetricEntity::Avs(_), Operators) => ("total_operators", "change_operators"),
            (MetricEntity::Operator(_), Avs) => ("total_avs", "change_avs"),
            _ => {
                return Err(IndexerError::Validation(format!(
                    "{} has no {} metric",
                    self,
                    field.label()
                )))
            }
        };
        Ok(SnapshotColumns {
            table,
            key,
            value,
            delta,
        })
    }
}

impl fmt::Display for MetricEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricEntity::Strategy(a) => write!(f, "strategy:{}", a),
            MetricEntity::Avs(a) => write!(f, "avs:{}", a),
            MetricEntity::Operator(a) => write!(f, "operator:{}", a),
            MetricEntity::BeaconChain => f.write_str("beacon"),
        }
    }
}

impl FromStr for MetricEntity {
    type Err = IndexerError;

    /// `strategy:<address>`, `avs:<address>`, `operator:<address>` or `beacon`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IndexerError::Validation(format!("invalid metric entity: {:?}", s));
        if s == "beacon" {
            return Ok(MetricEntity::BeaconChain);
        }
        let (kind, address) = s.split_once(':').ok_or_else(invalid)?;
        let valid_address = address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid_address {
            return Err(invalid());
        }
        match kind {
            "strategy" => Ok(MetricEntity::strategy(address)),
            "avs" => Ok(MetricEntity::avs(address)),
            "operator" => Ok(MetricEntity::operator(address)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
pub enum MetricField {
    #[strum(serialize = "tvl")]
    Tvl,
    #[strum(serialize = "tvlEth", serialize = "tvl_eth")]
    TvlEth,
    #[strum(serialize = "totalStakers", serialize = "stakers")]
    Stakers,
    #[strum(serialize = "totalOperators", serialize = "operators")]
    Operators,
    #[strum(serialize = "totalAvs", serialize = "avs")]
    Avs,
}

impl MetricField {
    /// Key of the value in entity-specific output shapes.
    pub fn label(&self) -> &'static str {
        match self {
            MetricField::Tvl => "tvl",
            MetricField::TvlEth => "tvlEth",
            MetricField::Stakers => "totalStakers",
            MetricField::Operators => "totalOperators",
            MetricField::Avs => "totalAvs",
        }
    }
}

/// Location of one metric in the snapshot tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotColumns {
    pub table: &'static str,
    /// Entity key column. The beacon chain table is global and has none.
    pub key: Option<&'static str>,
    pub value: &'static str,
    pub delta: &'static str,
}

/// Snapshot rows of one entity and field.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Rows with `start_ms <= timestamp <= end_ms`, ascending.
    async fn range(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        start_ms: i64,
        end_ms: i64,
    ) -> IndexerResult<Vec<SnapshotRow>>;

    async fn latest_at_or_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>>;

    async fn latest_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>>;
}

#[derive(Clone)]
pub struct PgSnapshotSource {
    db: Db,
}

impl PgSnapshotSource {
    /// `db` should come from [Db::for_read].
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn load(&self, query: Query<'static>) -> IndexerResult<Vec<SnapshotRow>> {
        let mut conn = self
            .db
            .connect()
            .await
            .map_err(|e| IndexerError::Store(e.to_string()))?;
        query
            .load::<StoredSnapshotRow>(&mut conn)
            .await?
            .into_iter()
            .map(SnapshotRow::try_from)
            .collect()
    }
}

/// `SELECT timestamp_ms, value, delta FROM table WHERE key = address`, numeric columns cast to
/// text so no precision is lost before [TokenAmount::parse].
fn select_rows(entity: &MetricEntity, field: MetricField) -> IndexerResult<Query<'static>> {
    let columns = entity.columns(field)?;
    let mut query = Query::new("SELECT timestamp_ms, CAST(")
        .ident(columns.value)
        .sql(" AS TEXT) AS value, CAST(")
        .ident(columns.delta)
        .sql(" AS TEXT) AS delta FROM ")
        .ident(columns.table)
        .sql(" WHERE TRUE");
    if let (Some(key), Some(address)) = (columns.key, entity.address()) {
        query = query
            .sql(" AND ")
            .ident(key)
            .sql(" = ")
            .bind::<Text, _>(address.to_string());
    }
    Ok(query)
}

fn range_query(
    entity: &MetricEntity,
    field: MetricField,
    start_ms: i64,
    end_ms: i64,
) -> IndexerResult<Query<'static>> {
    Ok(select_rows(entity, field)?
        .sql(" AND timestamp_ms >= ")
        .bind::<BigInt, _>(start_ms)
        .sql(" AND timestamp_ms <= ")
        .bind::<BigInt, _>(end_ms)
        .sql(" ORDER BY timestamp_ms ASC"))
}

fn latest_query(
    entity: &MetricEntity,
    field: MetricField,
    ts_ms: i64,
    inclusive: bool,
) -> IndexerResult<Query<'static>> {
    let op = if inclusive { " <= " } else { " < " };
    Ok(select_rows(entity, field)?
        .sql(" AND timestamp_ms")
        .sql(op)
        .bind::<BigInt, _>(ts_ms)
        .sql(" ORDER BY timestamp_ms DESC LIMIT 1"))
}

#[async_trait::async_trait]
impl SnapshotSource for PgSnapshotSource {
    async fn range(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        start_ms: i64,
        end_ms: i64,
    ) -> IndexerResult<Vec<SnapshotRow>> {
        self.load(range_query(entity, field, start_ms, end_ms)?)
            .await
    }

    async fn latest_at_or_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>> {
        let rows = self.load(latest_query(entity, field, ts_ms, true)?).await?;
        Ok(rows.into_iter().next())
    }

    async fn latest_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>> {
        let rows = self.load(latest_query(entity, field, ts_ms, false)?).await?;
        Ok(rows.into_iter().next())
    }
}
