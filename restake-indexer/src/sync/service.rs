// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{IndexerError, IndexerResult};
use crate::metrics::IndexerMetrics;
use crate::sync::engine::{SyncEngine, SyncReport};
use crate::sync::streams::StreamKind;

/// Runs each configured stream on its own task. Streams never wait on each other; a failing
/// stream retries from its persisted cursor on the next tick.
pub struct SyncService {
    engine: Arc<SyncEngine>,
    streams: Vec<StreamKind>,
    poll_interval: Duration,
    metrics: Option<Arc<IndexerMetrics>>,
}

impl SyncService {
    pub fn new(engine: Arc<SyncEngine>, streams: Vec<StreamKind>, poll_interval: Duration) -> Self {
        Self {
            engine,
            streams,
            poll_interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<IndexerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sync every stream once up to the current head. All streams run to completion; the first
    /// error, if any, is returned afterwards.
    pub async fn run_once(&self) -> IndexerResult<Vec<SyncReport>> {
        let head = self.engine.reader().get_block_number().await?;
        info!("Syncing {} streams to head {}", self.streams.len(), head);
        let results = join_all(
            self.streams
                .iter()
                .map(|kind| self.sync_and_record(*kind, head)),
        )
        .await;
        results.into_iter().collect()
    }

    /// Spawn one polling task per stream. Tasks exit once `cancel` fires; a batch in flight is
    /// allowed to finish first.
    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let service = Arc::new(self);
        service
            .streams
            .clone()
            .into_iter()
            .map(|kind| {
                let service = service.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { service.poll_stream(kind, cancel).await })
            })
            .collect()
    }

    async fn poll_stream(&self, kind: StreamKind, cancel: CancellationToken) {
        info!("[{}] Starting sync task", kind);
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[{}] Sync task cancelled", kind);
                    break;
                }
                _ = interval.tick() => {}
            }

            let head = match self.engine.reader().get_block_number().await {
                Ok(head) => head,
                Err(e) => {
                    self.record_error(kind, &e);
                    continue;
                }
            };
            // errors are recorded inside, the next tick retries from the cursor
            let _ = self.sync_and_record(kind, head).await;
        }
    }

    async fn sync_and_record(&self, kind: StreamKind, head: u64) -> IndexerResult<SyncReport> {
        self.engine
            .sync_stream(kind, head)
            .await
            .inspect_err(|e| self.record_error(kind, e))
    }

    fn record_error(&self, kind: StreamKind, e: &IndexerError) {
        if let Some(metrics) = &self.metrics {
            metrics
                .sync_errors
                .with_label_values(&[kind.name(), e.error_type()])
                .inc();
        }
        if e.is_recoverable() {
            warn!("[{}] Sync failed, retrying on next tick: {}", kind, e);
        } else {
            error!("[{}] Sync failed: {}", kind, e);
        }
    }
}
