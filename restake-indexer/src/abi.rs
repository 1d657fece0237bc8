// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event bindings for the core restaking contracts. Only the events the indexer consumes are
//! declared.

use ethers::contract::EthEvent;
use ethers::types::{Address, U256};

// EigenPodManager

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "PodDeployed", abi = "PodDeployed(address,address)")]
pub struct PodDeployed {
    #[ethevent(indexed)]
    pub eigen_pod: Address,
    #[ethevent(indexed)]
    pub pod_owner: Address,
}

// DelegationManager

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(
    name = "OperatorSharesIncreased",
    abi = "OperatorSharesIncreased(address,address,address,uint256)"
)]
pub struct OperatorSharesIncreased {
    #[ethevent(indexed)]
    pub operator: Address,
    pub staker: Address,
    pub strategy: Address,
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(
    name = "OperatorSharesDecreased",
    abi = "OperatorSharesDecreased(address,address,address,uint256)"
)]
pub struct OperatorSharesDecreased {
    #[ethevent(indexed)]
    pub operator: Address,
    pub staker: Address,
    pub strategy: Address,
    pub shares: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "StakerDelegated", abi = "StakerDelegated(address,address)")]
pub struct StakerDelegated {
    #[ethevent(indexed)]
    pub staker: Address,
    #[ethevent(indexed)]
    pub operator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "StakerUndelegated", abi = "StakerUndelegated(address,address)")]
pub struct StakerUndelegated {
    #[ethevent(indexed)]
    pub staker: Address,
    #[ethevent(indexed)]
    pub operator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "WithdrawalCompleted", abi = "WithdrawalCompleted(bytes32)")]
pub struct WithdrawalCompleted {
    pub withdrawal_root: [u8; 32],
}

// StrategyManager

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "Deposit", abi = "Deposit(address,address,address,uint256)")]
pub struct Deposit {
    pub staker: Address,
    pub token: Address,
    pub strategy: Address,
    pub shares: U256,
}

// AVSDirectory

#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(
    name = "OperatorAVSRegistrationStatusUpdated",
    abi = "OperatorAVSRegistrationStatusUpdated(address,address,uint8)"
)]
pub struct OperatorAvsRegistrationStatusUpdated {
    #[ethevent(indexed)]
    pub operator: Address,
    #[ethevent(indexed)]
    pub avs: Address,
    pub status: u8,
}
