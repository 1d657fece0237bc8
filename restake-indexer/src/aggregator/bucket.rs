// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{IndexerError, IndexerResult};

pub const HOUR_MS: i64 = 3_600_000;
pub const DAY_MS: i64 = 24 * HOUR_MS;
pub const WEEK_MS: i64 = 7 * DAY_MS;

/// Width of one bucket of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
pub enum Frequency {
    #[strum(serialize = "1h")]
    Hour,
    #[strum(serialize = "1d")]
    Day,
    #[strum(serialize = "7d")]
    Week,
}

impl Frequency {
    pub fn offset_ms(&self) -> i64 {
        match self {
            Frequency::Hour => HOUR_MS,
            Frequency::Day => DAY_MS,
            Frequency::Week => WEEK_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Variant {
    /// Absolute value at each bucket, carried forward over empty buckets.
    Cumulative,
    /// Net change within each bucket.
    Discrete,
}

/// Start of the hour containing `ts_ms`.
pub fn truncate_to_hour(ts_ms: i64) -> i64 {
    ts_ms.div_euclid(HOUR_MS) * HOUR_MS
}

/// An hour-aligned `[start, end]` window walked in steps of one frequency offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub frequency: Frequency,
}

impl BucketWindow {
    /// Both bounds are truncated to the start of their hour.
    pub fn new(start_ms: i64, end_ms: i64, frequency: Frequency) -> IndexerResult<Self> {
        if start_ms > end_ms {
            return Err(IndexerError::Validation(format!(
                "start {} is after end {}",
                start_ms, end_ms
            )));
        }
        Ok(Self {
            start_ms: truncate_to_hour(start_ms),
            end_ms: truncate_to_hour(end_ms),
            frequency,
        })
    }

    /// `ceil((end - start) / offset) + 1`
    pub fn bucket_count(&self) -> usize {
        let offset = self.frequency.offset_ms();
        let span = self.end_ms - self.start_ms;
        ((span + offset - 1) / offset) as usize + 1
    }

    /// Start of every bucket in ascending order. Bucket `i` covers `[start, start + offset)`.
    pub fn bucket_starts(&self) -> impl Iterator<Item = i64> {
        let (start, offset) = (self.start_ms, self.frequency.offset_ms());
        (0..self.bucket_count() as i64).map(move |i| start + i * offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_frequency_and_variant() {
        assert_eq!(Frequency::from_str("1h").unwrap(), Frequency::Hour);
        assert_eq!(Frequency::from_str("1d").unwrap(), Frequency::Day);
        assert_eq!(Frequency::from_str("7d").unwrap(), Frequency::Week);
        assert!(Frequency::from_str("1w").is_err());
        assert_eq!(Frequency::Week.to_string(), "7d");
        assert_eq!(Frequency::Day.offset_ms(), 86_400_000);
        assert_eq!(Frequency::Week.offset_ms(), 604_800_000);

        assert_eq!(Variant::from_str("cumulative").unwrap(), Variant::Cumulative);
        assert_eq!(Variant::from_str("discrete").unwrap(), Variant::Discrete);
    }

    #[test]
    fn test_truncate_to_hour() {
        // 2024-01-01T10:59:59.999Z
        assert_eq!(truncate_to_hour(1_704_106_799_999), 1_704_103_200_000);
        assert_eq!(truncate_to_hour(1_704_103_200_000), 1_704_103_200_000);
    }

    #[test]
    fn test_bucket_count() {
        let t0 = 1_704_067_200_000;
        let window = BucketWindow::new(t0, t0 + 4 * HOUR_MS, Frequency::Hour).unwrap();
        assert_eq!(window.bucket_count(), 5);

        let window = BucketWindow::new(t0, t0, Frequency::Day).unwrap();
        assert_eq!(window.bucket_count(), 1);

        // a partial trailing bucket still counts
        let window = BucketWindow::new(t0, t0 + 25 * HOUR_MS, Frequency::Day).unwrap();
        assert_eq!(window.bucket_count(), 3);
        assert_eq!(
            window.bucket_starts().collect::<Vec<_>>(),
            vec![t0, t0 + DAY_MS, t0 + 2 * DAY_MS]
        );
    }

    #[test]
    fn test_window_is_truncated_and_validated() {
        let t0 = 1_704_067_200_000;
        let window = BucketWindow::new(t0 + 59_000, t0 + HOUR_MS + 1, Frequency::Hour).unwrap();
        assert_eq!(window.start_ms, t0);
        assert_eq!(window.end_ms, t0 + HOUR_MS);

        assert!(matches!(
            BucketWindow::new(t0 + HOUR_MS, t0, Frequency::Hour),
            Err(IndexerError::Validation(_))
        ));
        // checked before truncation
        assert!(BucketWindow::new(t0 + 10, t0 + 5, Frequency::Hour).is_err());
        let window = BucketWindow::new(t0 + 5, t0 + 10, Frequency::Hour).unwrap();
        assert_eq!(window.bucket_count(), 1);
    }
}
