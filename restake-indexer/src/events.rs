// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoding of raw logs into typed restaking events.

use std::collections::HashMap;

use ethers::contract::EthEvent;
use restake_indexer_schema::models::{DelegationKind, ShareEventKind};
use tracing::warn;

use crate::abi;
use crate::decimal::{TokenAmount, ETH_SCALE};
use crate::error::DecodeError;
use crate::sync::streams::StreamKind;
use crate::types::{to_hex, LogEntry};

/// What to do with a log that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DecodePolicy {
    /// Fail the batch on the first failure. The cursor stays put.
    #[default]
    Abort,
    /// Log and count each failure, write the rest of the batch.
    Skip,
}

/// Position and origin of a decoded log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub block_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    PodDeployed {
        meta: EventMeta,
        pod: String,
        owner: String,
    },
    OperatorShares {
        meta: EventMeta,
        kind: ShareEventKind,
        operator: String,
        staker: String,
        strategy: String,
        shares: TokenAmount,
    },
    Deposit {
        meta: EventMeta,
        staker: String,
        token: String,
        strategy: String,
        shares: TokenAmount,
    },
    StakerDelegation {
        meta: EventMeta,
        kind: DelegationKind,
        staker: String,
        operator: String,
    },
    AvsOperatorStatus {
        meta: EventMeta,
        operator: String,
        avs: String,
        status: u8,
    },
    WithdrawalCompleted {
        meta: EventMeta,
        withdrawal_root: String,
    },
}

fn decode_as<E: EthEvent>(log: &LogEntry) -> Result<E, DecodeError> {
    E::decode_log(&log.raw_log()).map_err(|e| decode_error(log, format!("{} {}", E::name(), e)))
}

fn decode_error(log: &LogEntry, reason: impl Into<String>) -> DecodeError {
    DecodeError {
        transaction_hash: to_hex(log.transaction_hash),
        log_index: log.log_index,
        reason: reason.into(),
    }
}

fn shares(log: &LogEntry, value: ethers::types::U256) -> Result<TokenAmount, DecodeError> {
    TokenAmount::from_u256(value, ETH_SCALE).map_err(|e| decode_error(log, e.to_string()))
}

/// Map one log of `kind`'s stream to its event. Every address comes out lowercase.
pub fn decode_log(
    kind: StreamKind,
    log: &LogEntry,
    block_time_ms: i64,
) -> Result<DomainEvent, DecodeError> {
    let topic0 = log
        .topic0()
        .ok_or_else(|| decode_error(log, "log has no topics"))?;
    if !kind.signatures().contains(&topic0) {
        return Err(decode_error(
            log,
            format!("topic0 {} is not an event of stream {}", to_hex(topic0), kind),
        ));
    }

    let meta = EventMeta {
        address: to_hex(log.address),
        transaction_hash: to_hex(log.transaction_hash),
        transaction_index: log.transaction_index,
        log_index: log.log_index,
        block_number: log.block_number,
        block_hash: to_hex(log.block_hash),
        block_time_ms,
    };

    let event = match kind {
        StreamKind::Pods => {
            let e: abi::PodDeployed = decode_as(log)?;
            DomainEvent::PodDeployed {
                meta,
                pod: to_hex(e.eigen_pod),
                owner: to_hex(e.pod_owner),
            }
        }
        StreamKind::OperatorShares => {
            if topic0 == abi::OperatorSharesIncreased::signature() {
                let e: abi::OperatorSharesIncreased = decode_as(log)?;
                DomainEvent::OperatorShares {
                    meta,
                    kind: ShareEventKind::Increased,
                    operator: to_hex(e.operator),
                    staker: to_hex(e.staker),
                    strategy: to_hex(e.strategy),
                    shares: shares(log, e.shares)?,
                }
            } else {
                let e: abi::OperatorSharesDecreased = decode_as(log)?;
                DomainEvent::OperatorShares {
                    meta,
                    kind: ShareEventKind::Decreased,
                    operator: to_hex(e.operator),
                    staker: to_hex(e.staker),
                    strategy: to_hex(e.strategy),
                    shares: shares(log, e.shares)?,
                }
            }
        }
        StreamKind::Deposits => {
            let e: abi::Deposit = decode_as(log)?;
            DomainEvent::Deposit {
                meta,
                staker: to_hex(e.staker),
                token: to_hex(e.token),
                strategy: to_hex(e.strategy),
                shares: shares(log, e.shares)?,
            }
        }
        StreamKind::StakerDelegation => {
            if topic0 == abi::StakerDelegated::signature() {
                let e: abi::StakerDelegated = decode_as(log)?;
                DomainEvent::StakerDelegation {
                    meta,
                    kind: DelegationKind::Delegated,
                    staker: to_hex(e.staker),
                    operator: to_hex(e.operator),
                }
            } else {
                let e: abi::StakerUndelegated = decode_as(log)?;
                DomainEvent::StakerDelegation {
                    meta,
                    kind: DelegationKind::Undelegated,
                    staker: to_hex(e.staker),
                    operator: to_hex(e.operator),
                }
            }
        }
        StreamKind::AvsOperatorRegistration => {
            let e: abi::OperatorAvsRegistrationStatusUpdated = decode_as(log)?;
            DomainEvent::AvsOperatorStatus {
                meta,
                operator: to_hex(e.operator),
                avs: to_hex(e.avs),
                status: e.status,
            }
        }
        StreamKind::WithdrawalsCompleted => {
            let e: abi::WithdrawalCompleted = decode_as(log)?;
            DomainEvent::WithdrawalCompleted {
                meta,
                withdrawal_root: to_hex(e.withdrawal_root),
            }
        }
    };
    Ok(event)
}

/// Per-log outcome of decoding one batch.
#[derive(Debug, Default)]
pub struct BatchDecode {
    pub decoded: Vec<DomainEvent>,
    pub failures: Vec<DecodeError>,
}

impl BatchDecode {
    /// Decode every log. `block_times` must hold the timestamp of each log's block; a missing
    /// entry is recorded as a failure.
    pub fn decode(kind: StreamKind, logs: &[LogEntry], block_times: &HashMap<u64, i64>) -> Self {
        let mut batch = BatchDecode::default();
        for log in logs {
            let outcome = match block_times.get(&log.block_number) {
                Some(ts) => decode_log(kind, log, *ts),
                None => Err(decode_error(
                    log,
                    format!("no timestamp for block {}", log.block_number),
                )),
            };
            match outcome {
                Ok(event) => batch.decoded.push(event),
                Err(e) => batch.failures.push(e),
            }
        }
        batch
    }

    /// Apply `policy`: the decoded events and the number of skipped logs, or the first failure.
    pub fn resolve(
        self,
        kind: StreamKind,
        policy: DecodePolicy,
    ) -> Result<(Vec<DomainEvent>, usize), DecodeError> {
        let skipped = self.failures.len();
        match policy {
            DecodePolicy::Abort => match self.failures.into_iter().next() {
                Some(first) => Err(first),
                None => Ok((self.decoded, 0)),
            },
            DecodePolicy::Skip => {
                for failure in &self.failures {
                    warn!("[{}] Skipping undecodable log: {}", kind, failure);
                }
                Ok((self.decoded, skipped))
            }
        }
    }
}
