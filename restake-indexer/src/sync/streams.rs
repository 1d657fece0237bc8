// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use ethers::contract::EthEvent;
use ethers::types::H256;

use crate::abi;
use crate::error::{IndexerError, IndexerResult};
use crate::network::ContractAddresses;
use crate::sync::writer::EventTable;
use crate::types::LogFilter;

/// One independently synced event stream. Each variant owns a cursor key, the contract and
/// events it reads, and the table it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamKind {
    Pods,
    OperatorShares,
    Deposits,
    StakerDelegation,
    AvsOperatorRegistration,
    WithdrawalsCompleted,
}

impl StreamKind {
    pub const ALL: [StreamKind; 6] = [
        StreamKind::Pods,
        StreamKind::OperatorShares,
        StreamKind::Deposits,
        StreamKind::StakerDelegation,
        StreamKind::AvsOperatorRegistration,
        StreamKind::WithdrawalsCompleted,
    ];

    /// Key of the stream's cursor in the settings table.
    pub fn cursor_key(&self) -> &'static str {
        match self {
            StreamKind::Pods => "lastSyncedBlock_pods",
            StreamKind::OperatorShares => "lastSyncedBlock_operatorShares",
            StreamKind::Deposits => "lastSyncedBlock_deposits",
            StreamKind::StakerDelegation => "lastSyncedBlock_stakerDelegation",
            StreamKind::AvsOperatorRegistration => "lastSyncedBlock_avsOperators",
            StreamKind::WithdrawalsCompleted => "lastSyncedBlock_completedWithdrawals",
        }
    }

    pub fn from_key(key: &str) -> IndexerResult<Self> {
        StreamKind::ALL
            .into_iter()
            .find(|kind| kind.cursor_key() == key || kind.name() == key)
            .ok_or_else(|| IndexerError::Config(format!("Unknown sync stream: {}", key)))
    }

    /// Short name used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Pods => "pods",
            StreamKind::OperatorShares => "operator_shares",
            StreamKind::Deposits => "deposits",
            StreamKind::StakerDelegation => "staker_delegation",
            StreamKind::AvsOperatorRegistration => "avs_operators",
            StreamKind::WithdrawalsCompleted => "completed_withdrawals",
        }
    }

    pub fn table(&self) -> EventTable {
        match self {
            StreamKind::Pods => EventTable::Pods,
            StreamKind::OperatorShares => EventTable::OperatorShareEvents,
            StreamKind::Deposits => EventTable::Deposits,
            StreamKind::StakerDelegation => EventTable::StakerDelegationEvents,
            StreamKind::AvsOperatorRegistration => EventTable::AvsOperatorEvents,
            StreamKind::WithdrawalsCompleted => EventTable::WithdrawalsCompleted,
        }
    }

    pub fn signatures(&self) -> Vec<H256> {
        match self {
            StreamKind::Pods => vec![abi::PodDeployed::signature()],
            StreamKind::OperatorShares => vec![
                abi::OperatorSharesIncreased::signature(),
                abi::OperatorSharesDecreased::signature(),
            ],
            StreamKind::Deposits => vec![abi::Deposit::signature()],
            StreamKind::StakerDelegation => vec![
                abi::StakerDelegated::signature(),
                abi::StakerUndelegated::signature(),
            ],
            StreamKind::AvsOperatorRegistration => {
                vec![abi::OperatorAvsRegistrationStatusUpdated::signature()]
            }
            StreamKind::WithdrawalsCompleted => vec![abi::WithdrawalCompleted::signature()],
        }
    }

    pub fn filter(&self, contracts: &ContractAddresses) -> LogFilter {
        let address = match self {
            StreamKind::Pods => contracts.eigen_pod_manager,
            StreamKind::Deposits => contracts.strategy_manager,
            StreamKind::AvsOperatorRegistration => contracts.avs_directory,
            StreamKind::OperatorShares
            | StreamKind::StakerDelegation
            | StreamKind::WithdrawalsCompleted => contracts.delegation_manager,
        };
        LogFilter {
            addresses: vec![address],
            topics0: self.signatures(),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a comma separated list of stream keys or names. Empty input selects every stream.
pub fn parse_streams(list: &str) -> IndexerResult<Vec<StreamKind>> {
    let mut streams = Vec::new();
    for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let kind = StreamKind::from_key(key)?;
        if !streams.contains(&kind) {
            streams.push(kind);
        }
    }
    if streams.is_empty() {
        return Ok(StreamKind::ALL.to_vec());
    }
    Ok(streams)
}
