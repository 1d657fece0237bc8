// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::abi::RawLog;
use ethers::types::{Address, Bytes, Filter, Log, ValueOrArray, H256, U256};

use crate::error::{IndexerError, RpcErrorKind};

/// A mined log with every positional field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: H256,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub log_index: u64,
}

impl LogEntry {
    pub fn topic0(&self) -> Option<H256> {
        self.topics.first().copied()
    }

    pub fn raw_log(&self) -> RawLog {
        RawLog {
            topics: self.topics.clone(),
            data: self.data.to_vec(),
        }
    }
}

impl TryFrom<Log> for LogEntry {
    type Error = IndexerError;

    fn try_from(log: Log) -> Result<Self, Self::Error> {
        let missing = |field: &str| IndexerError::Rpc {
            kind: RpcErrorKind::Other,
            message: format!("Provider returns log without {}", field),
        };
        Ok(Self {
            block_number: log.block_number.ok_or_else(|| missing("block_number"))?.as_u64(),
            block_hash: log.block_hash.ok_or_else(|| missing("block_hash"))?,
            transaction_hash: log
                .transaction_hash
                .ok_or_else(|| missing("transaction_hash"))?,
            transaction_index: log
                .transaction_index
                .ok_or_else(|| missing("transaction_index"))?
                .as_u64(),
            log_index: log_index(log.log_index.ok_or_else(|| missing("log_index"))?)?,
            address: log.address,
            topics: log.topics,
            data: log.data,
        })
    }
}

fn log_index(value: U256) -> Result<u64, IndexerError> {
    if value.bits() > 64 {
        return Err(IndexerError::Rpc {
            kind: RpcErrorKind::Other,
            message: format!("Provider returns log_index {} out of range", value),
        });
    }
    Ok(value.low_u64())
}

/// Contracts and event signatures one stream listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<Address>,
    pub topics0: Vec<H256>,
}

impl LogFilter {
    pub fn to_filter(&self, from_block: u64, to_block: u64) -> Filter {
        Filter::new()
            .from_block(from_block)
            .to_block(to_block)
            .address(ValueOrArray::Array(self.addresses.clone()))
            .topic0(ValueOrArray::Array(
                self.topics0.iter().copied().map(Some).collect::<Vec<_>>(),
            ))
    }

    pub fn matches(&self, log: &LogEntry) -> bool {
        self.addresses.contains(&log.address)
            && log.topic0().is_some_and(|t| self.topics0.contains(&t))
    }
}

/// Lowercase `0x` hex, the canonical form for every stored address and hash.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}
