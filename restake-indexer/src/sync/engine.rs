// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::IndexerResult;
use crate::eth_client::ChainReader;
use crate::events::{BatchDecode, DecodePolicy};
use crate::metrics::IndexerMetrics;
use crate::network::ContractAddresses;
use crate::sync::cursor::SyncCursors;
use crate::sync::scheduler::{loop_through_blocks, DEFAULT_BATCH_SIZE};
use crate::sync::streams::StreamKind;
use crate::sync::timestamps::BlockTimestampCache;
use crate::sync::writer::{BulkWriter, WriteMode, WriteOp};
use crate::types::LogFilter;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub batch_size: u64,
    pub decode_policy: DecodePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            decode_policy: DecodePolicy::default(),
        }
    }
}

/// Outcome of one `sync_stream` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub stream: StreamKind,
    pub from: u64,
    pub to: u64,
    pub batches: u64,
    pub logs: u64,
    pub written: u64,
    pub skipped: u64,
}

impl SyncReport {
    fn new(stream: StreamKind, from: u64, to: u64) -> Self {
        Self {
            stream,
            from,
            to,
            batches: 0,
            logs: 0,
            written: 0,
            skipped: 0,
        }
    }
}

struct BatchStats {
    logs: usize,
    written: usize,
    skipped: usize,
}

pub struct SyncEngine {
    reader: Arc<dyn ChainReader>,
    cursors: Arc<SyncCursors>,
    writer: Arc<BulkWriter>,
    timestamps: Arc<BlockTimestampCache>,
    contracts: ContractAddresses,
    config: SyncConfig,
    metrics: Option<Arc<IndexerMetrics>>,
}

impl SyncEngine {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        cursors: Arc<SyncCursors>,
        writer: Arc<BulkWriter>,
        timestamps: Arc<BlockTimestampCache>,
        contracts: ContractAddresses,
        config: SyncConfig,
    ) -> Self {
        Self {
            reader,
            cursors,
            writer,
            timestamps,
            contracts,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<IndexerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn reader(&self) -> &Arc<dyn ChainReader> {
        &self.reader
    }

    /// Sync `kind` from its cursor up to `head`. The cursor advances after every committed batch,
    /// so an error leaves it at the end of the last batch that made it to the database.
    pub async fn sync_stream(&self, kind: StreamKind, head: u64) -> IndexerResult<SyncReport> {
        let from = self.cursors.get(kind).await?;
        if from >= head {
            debug!("[{}] Up to date at block {}, head {}", kind, from, head);
            return Ok(SyncReport::new(kind, from, from));
        }

        // Destructive clearing only ever happens on a sync from genesis
        let bootstrap = from == self.cursors.genesis_block();
        info!(
            "[{}] Syncing blocks [{}, {}]{}",
            kind,
            from,
            head,
            if bootstrap { " from genesis" } else { "" }
        );

        let filter = kind.filter(&self.contracts);
        let report = Mutex::new(SyncReport::new(kind, from, head));
        let (filter, report_ref) = (&filter, &report);
        loop_through_blocks(from, head, self.config.batch_size, move |batch_from, batch_to| {
            let mode = match (bootstrap, batch_from == from) {
                (true, true) => WriteMode::Bootstrap,
                (true, false) => WriteMode::InsertSkipDuplicates,
                (false, _) => WriteMode::Upsert,
            };
            async move {
                let stats = self
                    .process_batch(kind, filter, batch_from, batch_to, mode)
                    .await?;
                let mut report = report_ref.lock().await;
                report.batches += 1;
                report.logs += stats.logs as u64;
                report.written += stats.written as u64;
                report.skipped += stats.skipped as u64;
                Ok(())
            }
        })
        .await?;

        let report = report.into_inner();
        info!(
            "[{}] Synced to block {}: {} batches, {} logs, {} written, {} skipped",
            kind, report.to, report.batches, report.logs, report.written, report.skipped
        );
        Ok(report)
    }

    async fn process_batch(
        &self,
        kind: StreamKind,
        filter: &LogFilter,
        from: u64,
        to: u64,
        mode: WriteMode,
    ) -> IndexerResult<BatchStats> {
        let logs = self.reader.get_logs(filter, from, to).await?;
        let blocks = logs.iter().map(|log| log.block_number).collect::<Vec<_>>();
        let block_times = self.timestamps.resolve(&blocks).await?;

        let decoded = BatchDecode::decode(kind, &logs, &block_times);
        let failures = decoded.failures.len();
        if let Some(metrics) = &self.metrics {
            metrics
                .decode_failures
                .with_label_values(&[kind.name()])
                .inc_by(failures as u64);
        }
        let (events, skipped) = decoded.resolve(kind, self.config.decode_policy)?;

        let ops = events
            .into_iter()
            .map(WriteOp::try_from)
            .collect::<IndexerResult<Vec<_>>>()?;
        let written = self.writer.apply(kind.table(), &ops, mode).await?;
        self.cursors.advance(kind, to).await?;

        if let Some(metrics) = &self.metrics {
            let stream = kind.name();
            metrics.batches_processed.with_label_values(&[stream]).inc();
            metrics
                .logs_decoded
                .with_label_values(&[stream])
                .inc_by(ops.len() as u64);
            metrics
                .records_written
                .with_label_values(&[stream])
                .inc_by(written as u64);
            metrics
                .last_synced_block
                .with_label_values(&[stream])
                .set(to as i64);
        }
        debug!(
            "[{}] Batch [{}, {}] {:?}: {} logs, {} written",
            kind,
            from,
            to,
            mode,
            logs.len(),
            written
        );

        Ok(BatchStats {
            logs: logs.len(),
            written,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexerError;
    use crate::network::NetworkType;
    use crate::sync::cursor::CursorStore;
    use crate::sync::writer::EventTable;
    use crate::test_utils::{
        deposit_log, MemoryChainReader, MemoryCursorStore, MemoryEventSink, MemoryTimestampStore,
    };
    use ethers::types::{Address, U256};

    const GENESIS: u64 = 1_000;

    struct Harness {
        reader: Arc<MemoryChainReader>,
        store: Arc<MemoryCursorStore>,
        sink: Arc<MemoryEventSink>,
        engine: SyncEngine,
    }

    fn harness(batch_size: u64, decode_policy: DecodePolicy) -> Harness {
        crate::telemetry::init_for_testing();
        let reader = Arc::new(MemoryChainReader::default());
        let store = Arc::new(MemoryCursorStore::default());
        let sink = Arc::new(MemoryEventSink::default());
        let cursors = Arc::new(SyncCursors::new(store.clone(), GENESIS));
        let writer = Arc::new(BulkWriter::new(sink.clone(), 2).unwrap());
        let timestamps = Arc::new(BlockTimestampCache::new(
            reader.clone(),
            Arc::new(MemoryTimestampStore::default()),
        ));
        let engine = SyncEngine::new(
            reader.clone(),
            cursors,
            writer,
            timestamps,
            NetworkType::Mainnet.contracts(),
            SyncConfig {
                batch_size,
                decode_policy,
            },
        )
        .with_metrics(Arc::new(IndexerMetrics::new_for_testing()));
        Harness {
            reader,
            store,
            sink,
            engine,
        }
    }

    fn add_deposit(reader: &MemoryChainReader, block: u64, log_index: u64) {
        let contracts = NetworkType::Mainnet.contracts();
        let mut log = deposit_log(block, log_index, Address::repeat_byte(9), U256::from(1));
        log.address = contracts.strategy_manager;
        reader.add_log(log);
        reader.set_block_time(block, block as i64 * 12_000);
    }

    #[tokio::test]
    async fn test_bootstrap_from_genesis_then_upsert() {
        let h = harness(10, DecodePolicy::Abort);
        // rows left by a previous run are cleared by the genesis sync
        h.sink.seed(
            EventTable::Deposits,
            WriteOp::Deposit(restake_indexer_schema::models::Deposit {
                address: "0x00".into(),
                transaction_hash: "0xstale".into(),
                transaction_index: 0,
                log_index: 0,
                block_number: 1,
                block_hash: "0x00".into(),
                block_time_ms: 0,
                staker: "0x00".into(),
                token: "0x00".into(),
                strategy: "0x00".into(),
                shares: "1".into(),
            }),
        );
        for block in [1_001, 1_010, 1_015, 1_025] {
            add_deposit(&h.reader, block, 0);
        }

        let report = h.engine.sync_stream(StreamKind::Deposits, 1_025).await.unwrap();
        assert_eq!(report.from, GENESIS);
        assert_eq!(report.to, 1_025);
        assert_eq!(report.batches, 3);
        // block 1010 sits on a shared boundary and is read twice
        assert_eq!(report.logs, 5);
        assert_eq!(h.sink.rows(EventTable::Deposits).len(), 4);
        assert_eq!(h.sink.clears(), 1);
        assert_eq!(
            h.store.get("lastSyncedBlock_deposits").await.unwrap(),
            Some(1_025)
        );

        // the next run starts past genesis and never clears
        add_deposit(&h.reader, 1_030, 0);
        let report = h.engine.sync_stream(StreamKind::Deposits, 1_030).await.unwrap();
        assert_eq!(report.from, 1_025);
        assert_eq!(report.batches, 1);
        assert_eq!(h.sink.clears(), 1);
        assert_eq!(h.sink.rows(EventTable::Deposits).len(), 5);
    }

    #[tokio::test]
    async fn test_caught_up_stream_does_nothing() {
        let h = harness(10, DecodePolicy::Abort);
        h.store.set("lastSyncedBlock_pods", 2_000).await.unwrap();
        let report = h.engine.sync_stream(StreamKind::Pods, 2_000).await.unwrap();
        assert_eq!(report.batches, 0);
        assert!(h.reader.log_requests().is_empty());
        assert_eq!(h.sink.clears(), 0);
    }

    #[tokio::test]
    async fn test_rpc_failure_keeps_last_committed_cursor() {
        let h = harness(10, DecodePolicy::Abort);
        h.store
            .set("lastSyncedBlock_deposits", 1_100)
            .await
            .unwrap();
        add_deposit(&h.reader, 1_105, 0);
        h.reader.fail_logs_from(1_110, "request timed out");

        let err = h
            .engine
            .sync_stream(StreamKind::Deposits, 1_130)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Rpc { .. }));
        assert_eq!(
            h.store.get("lastSyncedBlock_deposits").await.unwrap(),
            Some(1_110)
        );
        assert_eq!(h.sink.rows(EventTable::Deposits).len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_does_not_advance_cursor() {
        let h = harness(100, DecodePolicy::Abort);
        h.store
            .set("lastSyncedBlock_deposits", 1_100)
            .await
            .unwrap();
        for index in 0..3 {
            add_deposit(&h.reader, 1_150, index);
        }
        h.sink.fail_on_chunk(1);

        let err = h
            .engine
            .sync_stream(StreamKind::Deposits, 1_200)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Write(_)));
        assert_eq!(
            h.store.get("lastSyncedBlock_deposits").await.unwrap(),
            Some(1_100)
        );

        // a retry from the same cursor converges without duplicates
        let report = h.engine.sync_stream(StreamKind::Deposits, 1_200).await.unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(h.sink.rows(EventTable::Deposits).len(), 3);
    }

    #[tokio::test]
    async fn test_decode_policy() {
        for (policy, expect_ok) in [(DecodePolicy::Abort, false), (DecodePolicy::Skip, true)] {
            let h = harness(100, policy);
            h.store
                .set("lastSyncedBlock_deposits", 1_100)
                .await
                .unwrap();
            add_deposit(&h.reader, 1_110, 0);
            let mut bad = deposit_log(1_111, 0, Address::repeat_byte(9), U256::from(1));
            bad.address = NetworkType::Mainnet.contracts().strategy_manager;
            bad.data = Default::default();
            h.reader.add_log(bad);
            h.reader.set_block_time(1_111, 0);

            let result = h.engine.sync_stream(StreamKind::Deposits, 1_120).await;
            let cursor = h.store.get("lastSyncedBlock_deposits").await.unwrap();
            if expect_ok {
                let report = result.unwrap();
                assert_eq!(report.skipped, 1);
                assert_eq!(report.written, 1);
                assert_eq!(cursor, Some(1_120));
            } else {
                assert!(matches!(result, Err(IndexerError::Decode(_))));
                assert_eq!(cursor, Some(1_100));
                assert!(h.sink.rows(EventTable::Deposits).is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let h = harness(10, DecodePolicy::Abort);
        add_deposit(&h.reader, 1_005, 0);
        h.engine.sync_stream(StreamKind::Deposits, 1_020).await.unwrap();
        assert_eq!(
            h.store.get("lastSyncedBlock_pods").await.unwrap(),
            None
        );
        // a stream filter only sees its own contract
        let strategy_manager = NetworkType::Mainnet.contracts().strategy_manager;
        let requests = h.reader.log_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|(filter, _, _)| filter.addresses == vec![strategy_manager]));
        assert!(h.sink.rows(EventTable::Pods).is_empty());
    }
}
