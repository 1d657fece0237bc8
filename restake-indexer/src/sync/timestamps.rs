// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use futures::{stream, StreamExt, TryStreamExt};
use restake_indexer_pg_db::Db;
use restake_indexer_schema::models::EvmBlock;
use restake_indexer_schema::schema::evm_blocks;
use tracing::debug;

use crate::error::{IndexerError, IndexerResult};
use crate::eth_client::ChainReader;

/// Persistent block number to timestamp index.
#[async_trait::async_trait]
pub trait BlockTimestampStore: Send + Sync {
    async fn get_many(&self, blocks: &[u64]) -> IndexerResult<HashMap<u64, i64>>;

    async fn put_many(&self, entries: &[(u64, i64)]) -> IndexerResult<()>;
}

#[derive(Clone)]
pub struct PgBlockTimestampStore {
    db: Db,
}

impl PgBlockTimestampStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl BlockTimestampStore for PgBlockTimestampStore {
    async fn get_many(&self, blocks: &[u64]) -> IndexerResult<HashMap<u64, i64>> {
        use evm_blocks::dsl;

        let numbers = blocks.iter().map(|b| *b as i64).collect::<Vec<_>>();
        let mut conn = self
            .db
            .connect()
            .await
            .map_err(|e| IndexerError::Store(e.to_string()))?;
        let rows: Vec<EvmBlock> = dsl::evm_blocks
            .filter(dsl::number.eq_any(numbers))
            .load(&mut conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.number as u64, row.timestamp_ms))
            .collect())
    }

    async fn put_many(&self, entries: &[(u64, i64)]) -> IndexerResult<()> {
        use evm_blocks::dsl;

        if entries.is_empty() {
            return Ok(());
        }
        let rows = entries
            .iter()
            .map(|(number, timestamp_ms)| EvmBlock {
                number: *number as i64,
                timestamp_ms: *timestamp_ms,
            })
            .collect::<Vec<_>>();
        let mut conn = self
            .db
            .connect()
            .await
            .map_err(|e| IndexerError::Store(e.to_string()))?;
        diesel::insert_into(dsl::evm_blocks)
            .values(&rows)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

/// Block header requests in flight at once per batch.
pub const DEFAULT_RPC_CONCURRENCY: usize = 8;

/// Resolves block timestamps, asking the node only for blocks the index does not know yet.
pub struct BlockTimestampCache {
    reader: Arc<dyn ChainReader>,
    store: Arc<dyn BlockTimestampStore>,
    concurrency: usize,
}

impl BlockTimestampCache {
    pub fn new(reader: Arc<dyn ChainReader>, store: Arc<dyn BlockTimestampStore>) -> Self {
        Self {
            reader,
            store,
            concurrency: DEFAULT_RPC_CONCURRENCY,
        }
    }

    /// Cap on concurrent header requests. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Timestamps in unix milliseconds for every distinct block in `blocks`.
    pub async fn resolve(&self, blocks: &[u64]) -> IndexerResult<HashMap<u64, i64>> {
        let distinct = blocks.iter().copied().collect::<BTreeSet<_>>();
        if distinct.is_empty() {
            return Ok(HashMap::new());
        }
        let distinct = distinct.into_iter().collect::<Vec<_>>();

        let mut resolved = self.store.get_many(&distinct).await?;
        let missing = distinct
            .into_iter()
            .filter(|b| !resolved.contains_key(b))
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(resolved);
        }

        debug!("Fetching timestamps of {} blocks", missing.len());
        let fetched: Vec<(u64, i64)> = stream::iter(missing)
            .map(|block| async move {
                let ts = self.reader.get_block_timestamp(block).await?;
                Ok::<_, IndexerError>((block, ts))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        self.store.put_many(&fetched).await?;
        resolved.extend(fetched);
        Ok(resolved)
    }
}
