// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::metrics::IndexerMetrics;
use ethers::providers::{Http, HttpClientError, JsonRpcClient, Provider};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::{ParseError, Url};

/// HTTP transport that counts and times every JSON-RPC call. Requests are bounded by a client
/// timeout so a stalled node surfaces as an RPC timeout instead of hanging a stream forever.
#[derive(Debug, Clone)]
pub struct MeteredEthHttpProvider {
    inner: Http,
    metrics: Arc<IndexerMetrics>,
}

#[async_trait::async_trait]
impl JsonRpcClient for MeteredEthHttpProvider {
    type Error = HttpClientError;

    async fn request<T: Serialize + Send + Sync + Debug, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: T,
    ) -> Result<R, HttpClientError> {
        self.metrics.rpc_queries.with_label_values(&[method]).inc();
        let _guard = self
            .metrics
            .rpc_queries_latency
            .with_label_values(&[method])
            .start_timer();

        let result = self.inner.request(method, params).await;
        if result.is_err() {
            self.metrics.rpc_errors.with_label_values(&[method]).inc();
        }
        result
    }
}

impl MeteredEthHttpProvider {
    pub fn new(url: Url, request_timeout: Duration, metrics: Arc<IndexerMetrics>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            inner: Http::new_with_client(url, client),
            metrics,
        }
    }
}

pub fn new_metered_eth_provider(
    url: &str,
    request_timeout: Duration,
    metrics: Arc<IndexerMetrics>,
) -> Result<Provider<MeteredEthHttpProvider>, ParseError> {
    let http_provider = MeteredEthHttpProvider::new(Url::parse(url)?, request_timeout, metrics);
    Ok(Provider::new(http_provider))
}
