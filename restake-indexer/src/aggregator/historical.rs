// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Historical series rebuilt from sparse hourly snapshots.
//!
//! Snapshots are only written when something changes, so a series is reconstructed by walking
//! fixed-width buckets over the window:
//! - cumulative: each bucket takes the absolute value of its last snapshot. Empty buckets carry
//!   the previous value forward. The walk is seeded from the snapshot at the window start, or
//!   else the latest one before it, or else zero.
//! - discrete: each bucket sums the deltas of its snapshots, zero when it has none.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::aggregator::bucket::{BucketWindow, Frequency, Variant, DAY_MS, WEEK_MS};
use crate::aggregator::change::MetricWithChange;
use crate::aggregator::snapshots::{MetricEntity, MetricField, SnapshotRow, SnapshotSource};
use crate::error::{IndexerError, IndexerResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoricalSeriesPoint {
    /// Start of the bucket.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl HistoricalSeriesPoint {
    pub fn at_ms(timestamp_ms: i64, value: f64) -> IndexerResult<Self> {
        let timestamp = DateTime::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            IndexerError::Validation(format!("timestamp {} is out of range", timestamp_ms))
        })?;
        Ok(Self { timestamp, value })
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Render `points` with `label` as the value key, e.g. `{"timestamp": .., "tvlEth": ..}`.
pub fn labelled_series(points: &[HistoricalSeriesPoint], label: &str) -> serde_json::Value {
    points
        .iter()
        .map(|point| {
            let mut object = serde_json::Map::new();
            object.insert(
                "timestamp".to_string(),
                point
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
                    .into(),
            );
            object.insert(label.to_string(), point.value.into());
            serde_json::Value::Object(object)
        })
        .collect::<Vec<_>>()
        .into()
}

#[derive(Clone)]
pub struct HistoricalAggregator {
    source: Arc<dyn SnapshotSource>,
}

impl HistoricalAggregator {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self { source }
    }

    /// One point per bucket of `[start_ms, end_ms]`, both truncated to their hour.
    pub async fn series(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        start_ms: i64,
        end_ms: i64,
        frequency: Frequency,
        variant: Variant,
    ) -> IndexerResult<Vec<HistoricalSeriesPoint>> {
        let window = BucketWindow::new(start_ms, end_ms, frequency)?;
        let rows = self
            .source
            .range(entity, field, window.start_ms, window.end_ms)
            .await?;
        debug!(
            "Building {} {} series of {} over {} rows",
            variant,
            frequency,
            entity,
            rows.len()
        );

        let seed = match variant {
            Variant::Cumulative => match rows.first() {
                Some(first) if first.timestamp_ms == window.start_ms => first.value,
                _ => self
                    .source
                    .latest_before(entity, field, window.start_ms)
                    .await?
                    .map_or(0.0, |row| row.value),
            },
            Variant::Discrete => 0.0,
        };
        walk_buckets(&window, &rows, variant, seed)
    }

    /// Value at `now_ms` with its change against 24 hours and 7 days earlier. Each value is the
    /// latest snapshot at or before its instant, zero when there is none.
    pub async fn metric_with_change(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        now_ms: i64,
    ) -> IndexerResult<MetricWithChange> {
        let (current, offset_24h, offset_7d) = futures::try_join!(
            self.value_at(entity, field, now_ms),
            self.value_at(entity, field, now_ms - DAY_MS),
            self.value_at(entity, field, now_ms - WEEK_MS),
        )?;
        Ok(MetricWithChange::new(current, offset_24h, offset_7d))
    }

    async fn value_at(
        &self,
        entity: &MetricEntity,
        field: MetricField,
        ts_ms: i64,
    ) -> IndexerResult<f64> {
        Ok(self
            .source
            .latest_at_or_before(entity, field, ts_ms)
            .await?
            .map_or(0.0, |row| row.value))
    }
}

/// `rows` must be sorted by timestamp and lie inside the window.
fn walk_buckets(
    window: &BucketWindow,
    rows: &[SnapshotRow],
    variant: Variant,
    seed: f64,
) -> IndexerResult<Vec<HistoricalSeriesPoint>> {
    let offset = window.frequency.offset_ms();
    let mut points = Vec::with_capacity(window.bucket_count());
    let mut running = seed;
    let mut next = 0;

    for bucket_start in window.bucket_starts() {
        let bucket_end = bucket_start + offset;
        // rows before the window start are ignored
        while next < rows.len() && rows[next].timestamp_ms < bucket_start {
            next += 1;
        }
        let first = next;
        while next < rows.len() && rows[next].timestamp_ms < bucket_end {
            next += 1;
        }
        let bucket = &rows[first..next];

        let value = match variant {
            Variant::Cumulative => {
                if let Some(last) = bucket.last() {
                    running = last.value;
                }
                running
            }
            Variant::Discrete => bucket.iter().map(|row| row.delta).sum(),
        };
        points.push(HistoricalSeriesPoint::at_ms(bucket_start, value)?);
    }
    Ok(points)
}
