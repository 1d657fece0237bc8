// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory fakes of the chain and store seams, and log builders for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use ethers::abi::{encode, Token};
use ethers::contract::EthEvent;
use ethers::types::{Address, Bytes, H256, U256};

use crate::abi;
use crate::aggregator::snapshots::{MetricEntity, MetricField, SnapshotRow, SnapshotSource};
use crate::error::{IndexerError, IndexerResult};
use crate::eth_client::ChainReader;
use crate::sync::cursor::CursorStore;
use crate::sync::timestamps::BlockTimestampStore;
use crate::sync::writer::{EventSink, EventTable, WriteOp};
use crate::types::{LogEntry, LogFilter};

fn base_log(block: u64, log_index: u64, topics: Vec<H256>, data: Vec<u8>) -> LogEntry {
    LogEntry {
        address: Address::repeat_byte(0x11),
        topics,
        data: Bytes::from(data),
        block_number: block,
        block_hash: H256::from_low_u64_be(block + 1),
        transaction_hash: H256::from_low_u64_be(block),
        transaction_index: 0,
        log_index,
    }
}

pub fn pod_deployed_log(block: u64, log_index: u64, pod: Address, owner: Address) -> LogEntry {
    base_log(
        block,
        log_index,
        vec![abi::PodDeployed::signature(), pod.into(), owner.into()],
        vec![],
    )
}

pub fn share_log(
    block: u64,
    log_index: u64,
    increased: bool,
    operator: Address,
    shares: U256,
) -> LogEntry {
    let signature = if increased {
        abi::OperatorSharesIncreased::signature()
    } else {
        abi::OperatorSharesDecreased::signature()
    };
    base_log(
        block,
        log_index,
        vec![signature, operator.into()],
        encode(&[
            Token::Address(Address::repeat_byte(0x22)),
            Token::Address(Address::repeat_byte(0x33)),
            Token::Uint(shares),
        ]),
    )
}

pub fn deposit_log(block: u64, log_index: u64, staker: Address, shares: U256) -> LogEntry {
    base_log(
        block,
        log_index,
        vec![abi::Deposit::signature()],
        encode(&[
            Token::Address(staker),
            Token::Address(Address::repeat_byte(0x44)),
            Token::Address(Address::repeat_byte(0x33)),
            Token::Uint(shares),
        ]),
    )
}

#[derive(Default)]
struct ChainState {
    head: u64,
    logs: Vec<LogEntry>,
    block_times: HashMap<u64, i64>,
    fail_logs_from: Option<(u64, String)>,
    log_requests: Vec<(LogFilter, u64, u64)>,
    timestamp_requests: Vec<u64>,
}

#[derive(Default)]
pub struct MemoryChainReader {
    state: Mutex<ChainState>,
}

impl MemoryChainReader {
    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn add_log(&self, log: LogEntry) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn set_block_time(&self, block: u64, timestamp_ms: i64) {
        self.state
            .lock()
            .unwrap()
            .block_times
            .insert(block, timestamp_ms);
    }

    /// Fail every `get_logs` whose range starts at or after `block`.
    pub fn fail_logs_from(&self, block: u64, message: &str) {
        self.state.lock().unwrap().fail_logs_from = Some((block, message.to_string()));
    }

    pub fn log_requests(&self) -> Vec<(LogFilter, u64, u64)> {
        self.state.lock().unwrap().log_requests.clone()
    }

    pub fn timestamp_requests(&self) -> Vec<u64> {
        self.state.lock().unwrap().timestamp_requests.clone()
    }
}

#[async_trait::async_trait]
impl ChainReader for MemoryChainReader {
    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> IndexerResult<Vec<LogEntry>> {
        let mut state = self.state.lock().unwrap();
        state
            .log_requests
            .push((filter.clone(), from_block, to_block));
        if let Some((block, message)) = &state.fail_logs_from {
            if from_block >= *block {
                return Err(IndexerError::rpc(message.clone()));
            }
        }
        let mut logs = state
            .logs
            .iter()
            .filter(|log| {
                (from_block..=to_block).contains(&log.block_number) && filter.matches(log)
            })
            .cloned()
            .collect::<Vec<_>>();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn get_block_timestamp(&self, block_number: u64) -> IndexerResult<i64> {
        let mut state = self.state.lock().unwrap();
        state.timestamp_requests.push(block_number);
        state
            .block_times
            .get(&block_number)
            .copied()
            .ok_or_else(|| IndexerError::rpc(format!("Block {} not found", block_number)))
    }

    async fn get_block_number(&self) -> IndexerResult<u64> {
        Ok(self.state.lock().unwrap().head)
    }
}

#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, u64>>,
}

#[async_trait::async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, key: &str) -> IndexerResult<Option<u64>> {
        Ok(self.cursors.lock().unwrap().get(key).copied())
    }

    async fn set(&self, key: &str, block: u64) -> IndexerResult<()> {
        self.cursors.lock().unwrap().insert(key.to_string(), block);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTimestampStore {
    blocks: Mutex<HashMap<u64, i64>>,
}

impl MemoryTimestampStore {
    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl BlockTimestampStore for MemoryTimestampStore {
    async fn get_many(&self, blocks: &[u64]) -> IndexerResult<HashMap<u64, i64>> {
        let stored = self.blocks.lock().unwrap();
        Ok(blocks
            .iter()
            .filter_map(|b| stored.get(b).map(|ts| (*b, *ts)))
            .collect())
    }

    async fn put_many(&self, entries: &[(u64, i64)]) -> IndexerResult<()> {
        let mut stored = self.blocks.lock().unwrap();
        for (block, ts) in entries {
            stored.entry(*block).or_insert(*ts);
        }
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    tables: HashMap<EventTable, Vec<WriteOp>>,
    attempts: usize,
    chunks_written: usize,
    clears: usize,
    fail_on_chunk: Option<usize>,
}

/// Event tables keyed by natural key, with one transaction per chunk.
#[derive(Default)]
pub struct MemoryEventSink {
    state: Mutex<SinkState>,
}

impl MemoryEventSink {
    /// Fail the `n`th chunk write attempt (zero based), once.
    pub fn fail_on_chunk(&self, n: usize) {
        self.state.lock().unwrap().fail_on_chunk = Some(n);
    }

    pub fn seed(&self, table: EventTable, op: WriteOp) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table)
            .or_default()
            .push(op);
    }

    pub fn rows(&self, table: EventTable) -> Vec<WriteOp> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chunks_written(&self) -> usize {
        self.state.lock().unwrap().chunks_written
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }
}

#[async_trait::async_trait]
impl EventSink for MemoryEventSink {
    async fn clear(&self, table: EventTable) -> IndexerResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.clears += 1;
        Ok(state
            .tables
            .remove(&table)
            .map_or(0, |rows| rows.len() as u64))
    }

    async fn write_chunk(&self, ops: &[WriteOp], skip_duplicates: bool) -> IndexerResult<usize> {
        let mut state = self.state.lock().unwrap();
        let attempt = state.attempts;
        state.attempts += 1;
        if state.fail_on_chunk == Some(attempt) {
            state.fail_on_chunk = None;
            return Err(IndexerError::Write(format!("injected failure on chunk {}", attempt)));
        }

        let mut written = 0;
        for op in ops {
            let rows = state.tables.entry(op.table()).or_default();
            match rows.iter().position(|row| row.key() == op.key()) {
                Some(_) if skip_duplicates => {}
                Some(i) => {
                    rows[i] = op.clone();
                    written += 1;
                }
                None => {
                    rows.push(op.clone());
                    written += 1;
                }
            }
        }
        state.chunks_written += 1;
        Ok(written)
    }
}

#[derive(Default)]
pub struct MemorySnapshotSource {
    rows: Mutex<HashMap<(MetricEntity, MetricField), Vec<SnapshotRow>>>,
}

impl MemorySnapshotSource {
    pub fn insert(&self, entity: &MetricEntity, field: MetricField, mut rows: Vec<SnapshotRow>) {
        rows.sort_by_key(|row| row.timestamp_ms);
        self.rows
            .lock()
            .unwrap()
            .insert((entity.clone(), field), rows);
    }

    fn matching(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        predicate: impl Fn(&SnapshotRow) -> bool,
    ) -> IndexerResult<Vec<SnapshotRow>> {
        entity.columns(field)?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(entity.clone(), field))
            .map(|rows| rows.iter().filter(|r| predicate(r)).copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl SnapshotSource for MemorySnapshotSource {
    async fn range(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        start_ms: i64,
        end_ms: i64,
    ) -> IndexerResult<Vec<SnapshotRow>> {
        self.matching(entity, field, |r| {
            r.timestamp_ms >= start_ms && r.timestamp_ms <= end_ms
        })
    }

    async fn latest_at_or_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>> {
        Ok(self
            .matching(entity, field, |r| r.timestamp_ms <= ts_ms)?
            .last()
            .copied())
    }

    async fn latest_before(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<Option<SnapshotRow>> {
        Ok(self
            .matching(entity, field, |r| r.timestamp_ms < ts_ms)?
            .last()
            .copied())
    }
}
