// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{JsonRpcClient, Middleware, Provider, ProviderError};
use ethers::types::U256;
use tap::TapFallible;

use crate::error::{IndexerError, IndexerResult, RpcErrorKind};
use crate::metered_eth_provider::{new_metered_eth_provider, MeteredEthHttpProvider};
use crate::metrics::IndexerMetrics;
use crate::types::{LogEntry, LogFilter};

/// Read access to the chain, injected into the sync engine.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    /// Logs matching `filter` in the inclusive range `[from_block, to_block]`, ordered by block
    /// number then log index. Oversized ranges fail with [RpcErrorKind::RangeTooLarge]; callers
    /// size their batches accordingly.
    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> IndexerResult<Vec<LogEntry>>;

    /// Block timestamp in unix milliseconds.
    async fn get_block_timestamp(&self, block_number: u64) -> IndexerResult<i64>;

    async fn get_block_number(&self) -> IndexerResult<u64>;
}

pub struct EthChainReader<P> {
    provider: Provider<P>,
}

impl EthChainReader<MeteredEthHttpProvider> {
    /// Connect to `provider_url` and verify it serves `expected_chain_id`.
    pub async fn new(
        provider_url: &str,
        request_timeout: Duration,
        expected_chain_id: u64,
        metrics: Arc<IndexerMetrics>,
    ) -> anyhow::Result<Self> {
        let provider = new_metered_eth_provider(provider_url, request_timeout, metrics)?;
        let self_ = Self { provider };
        self_.describe(expected_chain_id).await?;
        Ok(self_)
    }
}

impl<P> EthChainReader<P>
where
    P: JsonRpcClient + 'static,
{
    pub fn from_provider(provider: Provider<P>) -> Self {
        Self { provider }
    }

    // Validate chain identifier and log connection info
    async fn describe(&self, expected_chain_id: u64) -> anyhow::Result<()> {
        let chain_id = self.provider.get_chainid().await?.as_u64();
        let block_number = self.provider.get_block_number().await?;
        if chain_id != expected_chain_id {
            return Err(anyhow::anyhow!(
                "Chain ID mismatch: expected {}, got {}",
                expected_chain_id,
                chain_id
            ));
        }
        tracing::info!(
            "EthChainReader connected to chain {}, current block: {}",
            chain_id,
            block_number
        );
        Ok(())
    }
}

fn rpc_error(err: ProviderError) -> IndexerError {
    IndexerError::rpc(err.to_string())
}

#[async_trait::async_trait]
impl<P> ChainReader for EthChainReader<P>
where
    P: JsonRpcClient + 'static,
{
    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> IndexerResult<Vec<LogEntry>> {
        let eth_filter = filter.to_filter(from_block, to_block);
        let logs = self
            .provider
            .get_logs(&eth_filter)
            .await
            .map_err(rpc_error)
            .tap_err(|e| {
                tracing::error!(
                    "get_logs failed. Range: [{}, {}]. Error {:?}",
                    from_block,
                    to_block,
                    e
                )
            })?;

        let mut entries = logs
            .into_iter()
            .map(LogEntry::try_from)
            .collect::<IndexerResult<Vec<_>>>()?;

        // Safeguard check that all logs come from the requested contracts and events
        if let Some(stray) = entries.iter().find(|log| !filter.matches(log)) {
            return Err(IndexerError::Rpc {
                kind: RpcErrorKind::Other,
                message: format!(
                    "Provider returns log outside the filter: address {:?}, topic0 {:?}",
                    stray.address,
                    stray.topic0()
                ),
            });
        }

        entries.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(entries)
    }

    async fn get_block_timestamp(&self, block_number: u64) -> IndexerResult<i64> {
        let block = self
            .provider
            .get_block(block_number)
            .await
            .map_err(rpc_error)?
            .ok_or_else(|| IndexerError::Rpc {
                kind: RpcErrorKind::Other,
                message: format!("Block {} not found", block_number),
            })?;
        if block.timestamp > U256::from(i64::MAX / 1000) {
            return Err(IndexerError::Rpc {
                kind: RpcErrorKind::Other,
                message: format!("Block {} has out of range timestamp", block_number),
            });
        }
        Ok(block.timestamp.as_u64() as i64 * 1000)
    }

    async fn get_block_number(&self) -> IndexerResult<u64> {
        Ok(self
            .provider
            .get_block_number()
            .await
            .map_err(rpc_error)?
            .as_u64())
    }
}
