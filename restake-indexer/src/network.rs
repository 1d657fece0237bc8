// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-network constants: chain id, genesis checkpoint and core contract deployments.

use ethers::types::{Address, H160};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum NetworkType {
    Mainnet,
    Holesky,
}

/// Addresses of the core restaking contracts on one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub strategy_manager: Address,
    pub delegation_manager: Address,
    pub eigen_pod_manager: Address,
    pub avs_directory: Address,
}

const MAINNET_STRATEGY_MANAGER: Address = H160([
    0x85, 0x86, 0x46, 0x37, 0x2c, 0xc4, 0x2e, 0x1a, 0x62, 0x7f, 0xce, 0x94, 0xaa, 0x7a, 0x70, 0x33,
    0xe7, 0xcf, 0x07, 0x5a,
]);
const MAINNET_DELEGATION_MANAGER: Address = H160([
    0x39, 0x05, 0x3d, 0x51, 0xb7, 0x7d, 0xc0, 0xd3, 0x60, 0x36, 0xfc, 0x1f, 0xcc, 0x8c, 0xb8, 0x19,
    0xdf, 0x8e, 0xf3, 0x7a,
]);
const MAINNET_EIGEN_POD_MANAGER: Address = H160([
    0x91, 0xe6, 0x77, 0xb0, 0x7f, 0x7a, 0xf9, 0x07, 0xec, 0x9a, 0x42, 0x8a, 0xaf, 0xa9, 0xfc, 0x14,
    0xa0, 0xd3, 0xa3, 0x38,
]);
const MAINNET_AVS_DIRECTORY: Address = H160([
    0x13, 0x5d, 0xda, 0x56, 0x0e, 0x94, 0x66, 0x95, 0xd6, 0xf1, 0x55, 0xda, 0xca, 0xfc, 0x6f, 0x1f,
    0x25, 0xc1, 0xf5, 0xaf,
]);
const HOLESKY_STRATEGY_MANAGER: Address = H160([
    0xdf, 0xb5, 0xf6, 0xce, 0x42, 0xaa, 0xa7, 0x83, 0x0e, 0x94, 0xec, 0xfc, 0xca, 0xd4, 0x11, 0xbe,
    0xf4, 0xd4, 0xd5, 0xb6,
]);
const HOLESKY_DELEGATION_MANAGER: Address = H160([
    0xa4, 0x41, 0x51, 0x48, 0x98, 0x61, 0xfe, 0x9e, 0x30, 0x55, 0xd9, 0x5a, 0xdc, 0x98, 0xfb, 0xd4,
    0x62, 0xb9, 0x48, 0xe7,
]);
const HOLESKY_EIGEN_POD_MANAGER: Address = H160([
    0x30, 0x77, 0x0d, 0x7e, 0x3e, 0x71, 0x11, 0x2d, 0x7a, 0x6b, 0x72, 0x59, 0x54, 0x2d, 0x1f, 0x68,
    0x0a, 0x70, 0xe3, 0x15,
]);
const HOLESKY_AVS_DIRECTORY: Address = H160([
    0x05, 0x57, 0x33, 0x00, 0x00, 0x64, 0x33, 0x3c, 0xad, 0xdb, 0xc9, 0x27, 0x63, 0xc5, 0x8b, 0xf0,
    0x19, 0x2f, 0xfe, 0xbf,
]);

impl NetworkType {
    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkType::Mainnet => 1,
            NetworkType::Holesky => 17000,
        }
    }

    /// First block any stream needs to scan, just before the core contracts were deployed.
    pub fn genesis_block(&self) -> u64 {
        match self {
            NetworkType::Mainnet => 17_445_563,
            NetworkType::Holesky => 1_159_609,
        }
    }

    /// Start of the metric history, in unix milliseconds.
    pub fn genesis_time_ms(&self) -> i64 {
        match self {
            NetworkType::Mainnet => 1_686_268_800_000,
            NetworkType::Holesky => 1_706_745_600_000,
        }
    }

    pub fn contracts(&self) -> ContractAddresses {
        match self {
            NetworkType::Mainnet => ContractAddresses {
                strategy_manager: MAINNET_STRATEGY_MANAGER,
                delegation_manager: MAINNET_DELEGATION_MANAGER,
                eigen_pod_manager: MAINNET_EIGEN_POD_MANAGER,
                avs_directory: MAINNET_AVS_DIRECTORY,
            },
            NetworkType::Holesky => ContractAddresses {
                strategy_manager: HOLESKY_STRATEGY_MANAGER,
                delegation_manager: HOLESKY_DELEGATION_MANAGER,
                eigen_pod_manager: HOLESKY_EIGEN_POD_MANAGER,
                avs_directory: HOLESKY_AVS_DIRECTORY,
            },
        }
    }
}
