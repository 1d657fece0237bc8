// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, Encoder, HistogramVec, IntCounterVec, IntGaugeVec,
    Registry, TextEncoder,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const METRICS_PATH: &str = "/metrics";

const FINE_GRAINED_LATENCY_SEC_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0, 7.5, 10., 15., 20.,
    30., 45., 60., 90., 120.,
];

#[derive(Clone, Debug)]
pub struct IndexerMetrics {
    pub(crate) rpc_queries: IntCounterVec,
    pub(crate) rpc_queries_latency: HistogramVec,
    pub(crate) rpc_errors: IntCounterVec,

    pub(crate) batches_processed: IntCounterVec,
    pub(crate) logs_decoded: IntCounterVec,
    pub(crate) decode_failures: IntCounterVec,
    pub(crate) records_written: IntCounterVec,
    pub(crate) sync_errors: IntCounterVec,
    pub(crate) last_synced_block: IntGaugeVec,
}

impl IndexerMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            rpc_queries: register_int_counter_vec_with_registry!(
                "restake_indexer_rpc_queries",
                "Total number of JSON-RPC queries sent to the node, by method",
                &["method"],
                registry,
            )
            .unwrap(),
            rpc_queries_latency: register_histogram_vec_with_registry!(
                "restake_indexer_rpc_queries_latency",
                "Latency of JSON-RPC queries, by method",
                &["method"],
                FINE_GRAINED_LATENCY_SEC_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            rpc_errors: register_int_counter_vec_with_registry!(
                "restake_indexer_rpc_errors",
                "Total number of failed JSON-RPC queries, by method",
                &["method"],
                registry,
            )
            .unwrap(),
            batches_processed: register_int_counter_vec_with_registry!(
                "restake_indexer_batches_processed",
                "Total number of block batches committed, by stream",
                &["stream"],
                registry,
            )
            .unwrap(),
            logs_decoded: register_int_counter_vec_with_registry!(
                "restake_indexer_logs_decoded",
                "Total number of logs decoded into events, by stream",
                &["stream"],
                registry,
            )
            .unwrap(),
            decode_failures: register_int_counter_vec_with_registry!(
                "restake_indexer_decode_failures",
                "Total number of logs that failed to decode, by stream",
                &["stream"],
                registry,
            )
            .unwrap(),
            records_written: register_int_counter_vec_with_registry!(
                "restake_indexer_records_written",
                "Total number of rows inserted or updated, by stream",
                &["stream"],
                registry,
            )
            .unwrap(),
            sync_errors: register_int_counter_vec_with_registry!(
                "restake_indexer_sync_errors",
                "Total number of aborted sync runs, by stream and error type",
                &["stream", "error_type"],
                registry,
            )
            .unwrap(),
            last_synced_block: register_int_gauge_vec_with_registry!(
                "restake_indexer_last_synced_block",
                "Cursor of each stream after its last committed batch",
                &["stream"],
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}

async fn metrics_handler(State(registry): State<Registry>) -> (StatusCode, String) {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&registry.gather(), &mut buffer) {
        Ok(()) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .with_state(registry)
}

/// Serve the registry on `address` until `cancel` fires.
pub async fn start_metrics_server(
    address: SocketAddr,
    registry: Registry,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Metrics server listening on {}", address);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, metrics_router(registry))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            error!("Metrics server error: {:?}", e);
        }
    }))
}
