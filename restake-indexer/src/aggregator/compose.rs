// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::aggregator::bucket::{Frequency, Variant};
use crate::aggregator::historical::{HistoricalAggregator, HistoricalSeriesPoint};
use crate::aggregator::snapshots::{MetricEntity, MetricField};
use crate::error::{IndexerError, IndexerResult};

/// Pointwise sum of two series built over the same buckets. Any misalignment is an
/// [IndexerError::AggregationMismatch]; it means one of the series was bucketed differently.
pub fn compose(
    left: &[HistoricalSeriesPoint],
    right: &[HistoricalSeriesPoint],
    names: (&str, &str),
) -> IndexerResult<Vec<HistoricalSeriesPoint>> {
    let mismatch = |reason: String| IndexerError::AggregationMismatch {
        left: names.0.to_string(),
        right: names.1.to_string(),
        reason,
    };
    if left.len() != right.len() {
        return Err(mismatch(format!(
            "{} points vs {} points",
            left.len(),
            right.len()
        )));
    }
    left.iter()
        .zip(right)
        .map(|(l, r)| {
            if l.timestamp != r.timestamp {
                return Err(mismatch(format!(
                    "bucket {} vs {}",
                    l.timestamp, r.timestamp
                )));
            }
            Ok(HistoricalSeriesPoint {
                timestamp: l.timestamp,
                value: l.value + r.value,
            })
        })
        .collect()
}

/// Fold `series` with [compose]. `None` when there is nothing to sum.
pub fn sum_series(
    series: &[(String, Vec<HistoricalSeriesPoint>)],
) -> IndexerResult<Option<Vec<HistoricalSeriesPoint>>> {
    let mut iter = series.iter();
    let Some((first_name, first)) = iter.next() else {
        return Ok(None);
    };
    let mut total = first.clone();
    let mut total_name = first_name.clone();
    for (name, points) in iter {
        total = compose(&total, points, (&total_name, name))?;
        total_name = format!("{}+{}", total_name, name);
    }
    Ok(Some(total))
}

/// Total TVL in ETH: the restaking TVL of `strategies` plus the beacon chain ETH held in pods.
pub async fn total_tvl_series(
    aggregator: &HistoricalAggregator,
    strategies: &[String],
    start_ms: i64,
    end_ms: i64,
    frequency: Frequency,
    variant: Variant,
) -> IndexerResult<Vec<HistoricalSeriesPoint>> {
    let beacon = aggregator
        .series(
            &MetricEntity::BeaconChain,
            MetricField::TvlEth,
            start_ms,
            end_ms,
            frequency,
            variant,
        )
        .await?;

    let mut restaking = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        let entity = MetricEntity::strategy(strategy);
        let points = aggregator
            .series(&entity, MetricField::TvlEth, start_ms, end_ms, frequency, variant)
            .await?;
        restaking.push((entity.to_string(), points));
    }

    match sum_series(&restaking)? {
        Some(restaking) => compose(&restaking, &beacon, ("restaking", "beacon")),
        None => Ok(beacon),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::bucket::HOUR_MS;
    use crate::aggregator::snapshots::SnapshotRow;
    use crate::test_utils::MemorySnapshotSource;
    use std::sync::Arc;

    const T0: i64 = 1_704_067_200_000;

    fn series(values: &[f64]) -> Vec<HistoricalSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoricalSeriesPoint::at_ms(T0 + i as i64 * HOUR_MS, *v).unwrap())
            .collect()
    }

    fn values(points: &[HistoricalSeriesPoint]) -> Vec<f64> {
        points.iter().map(|p| p.value).collect()
    }

    #[test]
    fn test_compose_sums_pointwise() {
        let total = compose(&series(&[1.0, 2.0]), &series(&[10.0, 20.0]), ("a", "b")).unwrap();
        assert_eq!(values(&total), vec![11.0, 22.0]);
        assert_eq!(total[1].timestamp_ms(), T0 + HOUR_MS);
    }

    #[test]
    fn test_compose_rejects_misaligned_series() {
        let err = compose(&series(&[1.0, 2.0]), &series(&[1.0]), ("a", "b")).unwrap_err();
        assert!(matches!(err, IndexerError::AggregationMismatch { .. }));
        assert!(!err.is_recoverable());

        let mut shifted = series(&[1.0, 2.0]);
        shifted[1] = HistoricalSeriesPoint::at_ms(T0 + 2 * HOUR_MS, 2.0).unwrap();
        match compose(&series(&[1.0, 2.0]), &shifted, ("a", "b")).unwrap_err() {
            IndexerError::AggregationMismatch { left, right, .. } => {
                assert_eq!(left, "a");
                assert_eq!(right, "b");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_sum_series() {
        assert_eq!(sum_series(&[]).unwrap(), None);
        let total = sum_series(&[
            ("a".to_string(), series(&[1.0, 1.0])),
            ("b".to_string(), series(&[2.0, 2.0])),
            ("c".to_string(), series(&[3.0, 4.0])),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(values(&total), vec![6.0, 7.0]);
    }

    #[tokio::test]
    async fn test_total_tvl() {
        let source = MemorySnapshotSource::default();
        let steth = "0x93c4b944d05dfe6df7645a86cd2206016c51564d".to_string();
        let reth = "0x1bee69b7dfffa4e2d53c2a2df135c388ad25dcd2".to_string();
        let row = |ts: i64, value: f64| SnapshotRow {
            timestamp_ms: ts,
            value,
            delta: value,
        };
        source.insert(
            &MetricEntity::strategy(&steth),
            MetricField::TvlEth,
            vec![row(T0, 100.0)],
        );
        source.insert(
            &MetricEntity::strategy(&reth),
            MetricField::TvlEth,
            vec![row(T0 + HOUR_MS, 50.0)],
        );
        source.insert(
            &MetricEntity::BeaconChain,
            MetricField::TvlEth,
            vec![row(T0, 1_000.0)],
        );
        let aggregator = HistoricalAggregator::new(Arc::new(source));

        let total = total_tvl_series(
            &aggregator,
            &[steth, reth],
            T0,
            T0 + 2 * HOUR_MS,
            Frequency::Hour,
            Variant::Cumulative,
        )
        .await
        .unwrap();
        assert_eq!(values(&total), vec![1_100.0, 1_150.0, 1_150.0]);

        // without strategies the total is the beacon chain series
        let total = total_tvl_series(
            &aggregator,
            &[],
            T0,
            T0 + 2 * HOUR_MS,
            Frequency::Hour,
            Variant::Cumulative,
        )
        .await
        .unwrap();
        assert_eq!(values(&total), vec![1_000.0; 3]);
    }
}
