// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Restaking protocol indexer.
//!
//! Six event streams are pulled from the Ethereum JSON-RPC endpoint in bounded block batches,
//! decoded into typed domain events and bulk-written to PostgreSQL, each behind its own
//! persisted cursor. The [aggregator] turns the hourly snapshot tables into bucketed
//! historical series and point-in-time metrics with 24h/7d change.

pub mod abi;
pub mod aggregator;
pub mod decimal;
pub mod error;
pub mod eth_client;
pub mod events;
pub mod metered_eth_provider;
pub mod metrics;
pub mod network;
pub mod sync;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;
