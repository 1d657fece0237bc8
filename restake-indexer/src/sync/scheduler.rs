// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;

use crate::error::{IndexerError, IndexerResult};

/// Default upper bound on blocks per `eth_getLogs` request.
pub const DEFAULT_BATCH_SIZE: u64 = 4999;

/// Batches covering `[first, last]`. Each batch is `[from, min(from + batch_size, last)]` and the
/// next one starts at the previous upper bound, so consecutive batches share their boundary
/// block. Empty when `first >= last`.
pub fn batch_ranges(first: u64, last: u64, batch_size: u64) -> IndexerResult<Vec<(u64, u64)>> {
    if batch_size == 0 {
        return Err(IndexerError::Config("batch size must be positive".into()));
    }
    let mut ranges = Vec::new();
    let mut from = first;
    while from < last {
        let to = from.saturating_add(batch_size).min(last);
        ranges.push((from, to));
        from = to;
    }
    Ok(ranges)
}

/// Drive `callback` over every batch of `[first, last]` in ascending order, awaiting each one
/// before starting the next. Stops at the first error. Returns `last` on completion.
pub async fn loop_through_blocks<F, Fut>(
    first: u64,
    last: u64,
    batch_size: u64,
    mut callback: F,
) -> IndexerResult<u64>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = IndexerResult<()>>,
{
    for (from, to) in batch_ranges(first, last, batch_size)? {
        callback(from, to).await?;
    }
    Ok(last)
}
