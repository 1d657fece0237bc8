// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use diesel::upsert::excluded;
use diesel::ExpressionMethods;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use restake_indexer_pg_db::Db;
use restake_indexer_schema::models;
use tracing::{debug, info};

use crate::error::{IndexerError, IndexerResult};
use crate::events::{DomainEvent, EventMeta};

/// Default number of operations committed per database transaction.
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 1000;

/// Destination table of an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTable {
    Pods,
    OperatorShareEvents,
    Deposits,
    StakerDelegationEvents,
    AvsOperatorEvents,
    WithdrawalsCompleted,
}

impl EventTable {
    pub fn name(&self) -> &'static str {
        match self {
            EventTable::Pods => "pods",
            EventTable::OperatorShareEvents => "operator_share_events",
            EventTable::Deposits => "deposits",
            EventTable::StakerDelegationEvents => "staker_delegation_events",
            EventTable::AvsOperatorEvents => "avs_operator_events",
            EventTable::WithdrawalsCompleted => "withdrawals_completed",
        }
    }
}

impl fmt::Display for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pending row write, keyed by `(transaction_hash, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Pod(models::Pod),
    OperatorShare(models::OperatorShareEvent),
    Deposit(models::Deposit),
    StakerDelegation(models::StakerDelegationEvent),
    AvsOperator(models::AvsOperatorEvent),
    WithdrawalCompleted(models::WithdrawalCompleted),
}

impl WriteOp {
    pub fn table(&self) -> EventTable {
        match self {
            WriteOp::Pod(_) => EventTable::Pods,
            WriteOp::OperatorShare(_) => EventTable::OperatorShareEvents,
            WriteOp::Deposit(_) => EventTable::Deposits,
            WriteOp::StakerDelegation(_) => EventTable::StakerDelegationEvents,
            WriteOp::AvsOperator(_) => EventTable::AvsOperatorEvents,
            WriteOp::WithdrawalCompleted(_) => EventTable::WithdrawalsCompleted,
        }
    }

    /// Natural key of the row.
    pub fn key(&self) -> (&str, i32) {
        match self {
            WriteOp::Pod(r) => (&r.transaction_hash, r.log_index),
            WriteOp::OperatorShare(r) => (&r.transaction_hash, r.log_index),
            WriteOp::Deposit(r) => (&r.transaction_hash, r.log_index),
            WriteOp::StakerDelegation(r) => (&r.transaction_hash, r.log_index),
            WriteOp::AvsOperator(r) => (&r.transaction_hash, r.log_index),
            WriteOp::WithdrawalCompleted(r) => (&r.transaction_hash, r.log_index),
        }
    }
}

// Positional columns shared by every event row
struct Position {
    address: String,
    transaction_hash: String,
    transaction_index: i32,
    log_index: i32,
    block_number: i64,
    block_hash: String,
    block_time_ms: i64,
}

impl TryFrom<EventMeta> for Position {
    type Error = IndexerError;

    fn try_from(meta: EventMeta) -> Result<Self, Self::Error> {
        let out_of_range = |field: &str, value: u64| {
            IndexerError::Validation(format!(
                "{} {} of {} does not fit the column",
                field, value, meta.transaction_hash
            ))
        };
        Ok(Self {
            transaction_index: i32::try_from(meta.transaction_index)
                .map_err(|_| out_of_range("transaction_index", meta.transaction_index))?,
            log_index: i32::try_from(meta.log_index)
                .map_err(|_| out_of_range("log_index", meta.log_index))?,
            block_number: i64::try_from(meta.block_number)
                .map_err(|_| out_of_range("block_number", meta.block_number))?,
            address: meta.address,
            transaction_hash: meta.transaction_hash,
            block_hash: meta.block_hash,
            block_time_ms: meta.block_time_ms,
        })
    }
}

macro_rules! event_row {
    ($model:ident, $pos:expr, { $($field:ident: $value:expr),* $(,)? }) => {{
        let pos = $pos;
        models::$model {
            address: pos.address,
            transaction_hash: pos.transaction_hash,
            transaction_index: pos.transaction_index,
            log_index: pos.log_index,
            block_number: pos.block_number,
            block_hash: pos.block_hash,
            block_time_ms: pos.block_time_ms,
            $($field: $value,)*
        }
    }};
}

impl TryFrom<DomainEvent> for WriteOp {
    type Error = IndexerError;

    fn try_from(event: DomainEvent) -> Result<Self, Self::Error> {
        Ok(match event {
            DomainEvent::PodDeployed { meta, pod, owner } => {
                WriteOp::Pod(event_row!(Pod, Position::try_from(meta)?, {
                    pod_address: pod,
                    pod_owner: owner,
                }))
            }
            DomainEvent::OperatorShares {
                meta,
                kind,
                operator,
                staker,
                strategy,
                shares,
            } => WriteOp::OperatorShare(event_row!(OperatorShareEvent, Position::try_from(meta)?, {
                kind: kind.to_string(),
                operator: operator,
                staker: staker,
                strategy: strategy,
                shares: shares.raw_string(),
            })),
            DomainEvent::Deposit {
                meta,
                staker,
                token,
                strategy,
                shares,
            } => WriteOp::Deposit(event_row!(Deposit, Position::try_from(meta)?, {
                staker: staker,
                token: token,
                strategy: strategy,
                shares: shares.raw_string(),
            })),
            DomainEvent::StakerDelegation {
                meta,
                kind,
                staker,
                operator,
            } => WriteOp::StakerDelegation(event_row!(
                StakerDelegationEvent,
                Position::try_from(meta)?,
                {
                    kind: kind.to_string(),
                    staker: staker,
                    operator: operator,
                }
            )),
            DomainEvent::AvsOperatorStatus {
                meta,
                operator,
                avs,
                status,
            } => WriteOp::AvsOperator(event_row!(AvsOperatorEvent, Position::try_from(meta)?, {
                operator: operator,
                avs: avs,
                status: i16::from(status),
            })),
            DomainEvent::WithdrawalCompleted {
                meta,
                withdrawal_root,
            } => WriteOp::WithdrawalCompleted(event_row!(
                WithdrawalCompleted,
                Position::try_from(meta)?,
                { withdrawal_root: withdrawal_root }
            )),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert, or overwrite the row with the same natural key.
    Upsert,
    /// Delete every row of the table, then insert skipping duplicates. Only valid when a stream
    /// restarts from its genesis block.
    Bootstrap,
    /// Insert skipping duplicates, without clearing.
    InsertSkipDuplicates,
}

/// Storage behind the bulk writer.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Delete every row of `table`. Returns the number of deleted rows.
    async fn clear(&self, table: EventTable) -> IndexerResult<u64>;

    /// Write `ops` atomically: either every op is applied or none is.
    async fn write_chunk(&self, ops: &[WriteOp], skip_duplicates: bool) -> IndexerResult<usize>;
}

pub struct BulkWriter {
    sink: Arc<dyn EventSink>,
    chunk_size: usize,
}

impl BulkWriter {
    pub fn new(sink: Arc<dyn EventSink>, chunk_size: usize) -> IndexerResult<Self> {
        if chunk_size == 0 {
            return Err(IndexerError::Config("write chunk size must be positive".into()));
        }
        Ok(Self { sink, chunk_size })
    }

    /// Apply one batch worth of ops to `table`. Chunks commit in order; the first failing chunk
    /// stops the write and is returned as [IndexerError::Write]. Earlier chunks stay committed,
    /// which is safe since every op is idempotent on its natural key.
    pub async fn apply(
        &self,
        table: EventTable,
        ops: &[WriteOp],
        mode: WriteMode,
    ) -> IndexerResult<usize> {
        if let Some(stray) = ops.iter().find(|op| op.table() != table) {
            return Err(IndexerError::Validation(format!(
                "{} op cannot be written to {}",
                stray.table(),
                table
            )));
        }

        if mode == WriteMode::Bootstrap {
            let deleted = self.sink.clear(table).await.map_err(into_write_error)?;
            info!("Bootstrap: cleared {} rows from {}", deleted, table);
        }

        let skip_duplicates = mode != WriteMode::Upsert;
        let mut written = 0;
        for (i, chunk) in ops.chunks(self.chunk_size).enumerate() {
            written += self
                .sink
                .write_chunk(chunk, skip_duplicates)
                .await
                .map_err(|e| {
                    IndexerError::Write(format!("chunk {} of {} failed: {}", i, table, e))
                })?;
            debug!("Wrote chunk {} of {} ({} ops)", i, table, chunk.len());
        }
        Ok(written)
    }
}

fn into_write_error(err: IndexerError) -> IndexerError {
    match err {
        IndexerError::Write(_) => err,
        other => IndexerError::Write(other.to_string()),
    }
}

/// [EventSink] on the Postgres event tables.
#[derive(Clone)]
pub struct PgEventSink {
    db: Db,
}

impl PgEventSink {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

// Insert `$rows` into `$table`. Upserts overwrite the listed columns from the excluded row.
macro_rules! write_rows {
    ($conn:expr, $table:ident, $rows:expr, $skip:expr, [$($col:ident),+ $(,)?]) => {{
        use restake_indexer_schema::schema::$table::dsl;
        let rows = $rows;
        if rows.is_empty() {
            0
        } else if $skip {
            diesel::insert_into(dsl::$table)
                .values(&rows)
                .on_conflict_do_nothing()
                .execute($conn)
                .await?
        } else {
            diesel::insert_into(dsl::$table)
                .values(&rows)
                .on_conflict((dsl::transaction_hash, dsl::log_index))
                .do_update()
                .set(($(dsl::$col.eq(excluded(dsl::$col)),)+))
                .execute($conn)
                .await?
        }
    }};
}

#[derive(Default)]
struct Partitioned {
    pods: Vec<models::Pod>,
    operator_shares: Vec<models::OperatorShareEvent>,
    deposits: Vec<models::Deposit>,
    staker_delegations: Vec<models::StakerDelegationEvent>,
    avs_operators: Vec<models::AvsOperatorEvent>,
    withdrawals: Vec<models::WithdrawalCompleted>,
}

impl Partitioned {
    fn new(ops: &[WriteOp]) -> Self {
        let mut p = Partitioned::default();
        for op in ops.iter().cloned() {
            match op {
                WriteOp::Pod(r) => p.pods.push(r),
                WriteOp::OperatorShare(r) => p.operator_shares.push(r),
                WriteOp::Deposit(r) => p.deposits.push(r),
                WriteOp::StakerDelegation(r) => p.staker_delegations.push(r),
                WriteOp::AvsOperator(r) => p.avs_operators.push(r),
                WriteOp::WithdrawalCompleted(r) => p.withdrawals.push(r),
            }
        }
        p
    }
}

#[async_trait::async_trait]
impl EventSink for PgEventSink {
    async fn clear(&self, table: EventTable) -> IndexerResult<u64> {
        use restake_indexer_schema::schema::{
            avs_operator_events, deposits, operator_share_events, pods, staker_delegation_events,
            withdrawals_completed,
        };

        let mut conn = self
            .db
            .connect()
            .await
            .map_err(|e| IndexerError::Store(e.to_string()))?;
        let deleted = match table {
            EventTable::Pods => diesel::delete(pods::table).execute(&mut conn).await?,
            EventTable::OperatorShareEvents => {
                diesel::delete(operator_share_events::table)
                    .execute(&mut conn)
                    .await?
            }
            EventTable::Deposits => diesel::delete(deposits::table).execute(&mut conn).await?,
            EventTable::StakerDelegationEvents => {
                diesel::delete(staker_delegation_events::table)
                    .execute(&mut conn)
                    .await?
            }
            EventTable::AvsOperatorEvents => {
                diesel::delete(avs_operator_events::table)
                    .execute(&mut conn)
                    .await?
            }
            EventTable::WithdrawalsCompleted => {
                diesel::delete(withdrawals_completed::table)
                    .execute(&mut conn)
                    .await?
            }
        };
        Ok(deleted as u64)
    }

    async fn write_chunk(&self, ops: &[WriteOp], skip_duplicates: bool) -> IndexerResult<usize> {
        let partitioned = Partitioned::new(ops);
        let mut conn = self
            .db
            .connect()
            .await
            .map_err(|e| IndexerError::Write(e.to_string()))?;
        let conn: &mut AsyncPgConnection = &mut conn;

        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                let p = partitioned;
                let mut written = 0;
                written += write_rows!(conn, pods, p.pods, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    pod_address, pod_owner,
                ]);
                written += write_rows!(conn, operator_share_events, p.operator_shares, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    kind, operator, staker, strategy, shares,
                ]);
                written += write_rows!(conn, deposits, p.deposits, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    staker, token, strategy, shares,
                ]);
                written += write_rows!(conn, staker_delegation_events, p.staker_delegations, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    kind, staker, operator,
                ]);
                written += write_rows!(conn, avs_operator_events, p.avs_operators, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    operator, avs, status,
                ]);
                written += write_rows!(conn, withdrawals_completed, p.withdrawals, skip_duplicates, [
                    address, transaction_index, block_number, block_hash, block_time_ms,
                    withdrawal_root,
                ]);
                Ok(written)
            }
            .scope_boxed()
        })
        .await
        .map_err(|e| IndexerError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{TokenAmount, ETH_SCALE};
    use crate::test_utils::MemoryEventSink;
    use ethers::types::U256;
    use restake_indexer_schema::models::ShareEventKind;

    fn meta(block: u64, log_index: u64) -> EventMeta {
        EventMeta {
            address: "0x39053d51b77dc0d36036fc1fcc8cb819df8ef37a".into(),
            transaction_hash: format!("0x{:064x}", block),
            transaction_index: 0,
            log_index,
            block_number: block,
            block_hash: format!("0x{:064x}", block + 1),
            block_time_ms: 1_700_000_000_000,
        }
    }

    fn share_op(block: u64, log_index: u64, shares: u64) -> WriteOp {
        WriteOp::try_from(DomainEvent::OperatorShares {
            meta: meta(block, log_index),
            kind: ShareEventKind::Increased,
            operator: "0x01".into(),
            staker: "0x02".into(),
            strategy: "0x03".into(),
            shares: TokenAmount::from_u256(U256::from(shares), ETH_SCALE).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn test_event_to_row() {
        match share_op(10, 2, 42) {
            WriteOp::OperatorShare(row) => {
                assert_eq!(row.kind, "increased");
                assert_eq!(row.shares, "42");
                assert_eq!(row.block_number, 10);
                assert_eq!(row.log_index, 2);
            }
            other => panic!("unexpected op {:?}", other),
        }

        let err = WriteOp::try_from(DomainEvent::WithdrawalCompleted {
            meta: meta(1, u64::MAX),
            withdrawal_root: "0x00".into(),
        })
        .unwrap_err();
        assert!(matches!(err, IndexerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let sink = Arc::new(MemoryEventSink::default());
        let writer = BulkWriter::new(sink.clone(), 2).unwrap();
        let ops: Vec<_> = (0..5).map(|i| share_op(100, i, 1)).collect();

        writer
            .apply(EventTable::OperatorShareEvents, &ops, WriteMode::Upsert)
            .await
            .unwrap();
        writer
            .apply(EventTable::OperatorShareEvents, &ops, WriteMode::Upsert)
            .await
            .unwrap();
        assert_eq!(sink.rows(EventTable::OperatorShareEvents).len(), 5);
        assert_eq!(sink.chunks_written(), 6);

        // upsert overwrites the existing row
        writer
            .apply(
                EventTable::OperatorShareEvents,
                &[share_op(100, 0, 7)],
                WriteMode::Upsert,
            )
            .await
            .unwrap();
        let rows = sink.rows(EventTable::OperatorShareEvents);
        assert!(rows.contains(&share_op(100, 0, 7)));
        assert!(!rows.contains(&share_op(100, 0, 1)));
    }

    #[tokio::test]
    async fn test_bootstrap_clears_and_skips_duplicates() {
        let sink = Arc::new(MemoryEventSink::default());
        let writer = BulkWriter::new(sink.clone(), 10).unwrap();
        writer
            .apply(
                EventTable::OperatorShareEvents,
                &[share_op(1, 0, 1), share_op(1, 1, 1)],
                WriteMode::Upsert,
            )
            .await
            .unwrap();

        writer
            .apply(
                EventTable::OperatorShareEvents,
                &[share_op(2, 0, 5)],
                WriteMode::Bootstrap,
            )
            .await
            .unwrap();
        assert_eq!(
            sink.rows(EventTable::OperatorShareEvents),
            vec![share_op(2, 0, 5)]
        );

        // skip duplicates keeps the first write
        writer
            .apply(
                EventTable::OperatorShareEvents,
                &[share_op(2, 0, 9), share_op(3, 0, 1)],
                WriteMode::InsertSkipDuplicates,
            )
            .await
            .unwrap();
        let rows = sink.rows(EventTable::OperatorShareEvents);
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&share_op(2, 0, 5)));
    }

    #[tokio::test]
    async fn test_failed_chunk_is_write_error() {
        let sink = Arc::new(MemoryEventSink::default());
        sink.fail_on_chunk(1);
        let writer = BulkWriter::new(sink.clone(), 2).unwrap();
        let ops: Vec<_> = (0..5).map(|i| share_op(100, i, 1)).collect();
        let err = writer
            .apply(EventTable::OperatorShareEvents, &ops, WriteMode::Upsert)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Write(_)));
        // the first chunk committed, the failed one left nothing behind
        assert_eq!(sink.rows(EventTable::OperatorShareEvents).len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_ops_for_another_table() {
        let writer = BulkWriter::new(Arc::new(MemoryEventSink::default()), 2).unwrap();
        let err = writer
            .apply(EventTable::Deposits, &[share_op(1, 0, 1)], WriteMode::Upsert)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Validation(_)));
        assert!(BulkWriter::new(Arc::new(MemoryEventSink::default()), 0).is_err());
    }
}
