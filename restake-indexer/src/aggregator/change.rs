// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Change {
    pub value: f64,
    /// Fraction of the earlier value, `0.1` for ten percent.
    pub percent: f64,
}

/// Change from `offset` to `current`. The percent is 0 when `offset` is 0.
pub fn change(current: f64, offset: f64) -> Change {
    let value = current - offset;
    let percent = if offset == 0.0 { 0.0 } else { value / offset };
    Change { value, percent }
}

/// A point-in-time metric with its 24 hour and 7 day change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricWithChange {
    pub value: f64,
    #[serde(rename = "change24h")]
    pub change_24h: Change,
    #[serde(rename = "change7d")]
    pub change_7d: Change,
}

impl MetricWithChange {
    pub fn new(current: f64, offset_24h: f64, offset_7d: f64) -> Self {
        Self {
            value: current,
            change_24h: change(current, offset_24h),
            change_7d: change(current, offset_7d),
        }
    }
}
