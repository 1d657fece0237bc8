// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only metric aggregation over the hourly snapshot tables.

pub mod bucket;
pub mod change;
pub mod compose;
pub mod historical;
pub mod snapshots;

pub use bucket::{Frequency, Variant};
pub use change::{Change, MetricWithChange};
pub use compose::{compose, total_tvl_series};
pub use historical::{labelled_series, HistoricalAggregator, HistoricalSeriesPoint};
pub use snapshots::{MetricEntity, MetricField, PgSnapshotSource, SnapshotSource};
