// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use diesel::{Identifiable, Insertable, Queryable, Selectable};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::schema::{
    avs_operator_events, deposits, evm_blocks, operator_share_events, pods, settings,
    staker_delegation_events, withdrawals_completed,
};

/// Direction of an operator share delta, stored in `operator_share_events.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ShareEventKind {
    Increased,
    Decreased,
}

/// Stored in `staker_delegation_events.kind`
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DelegationKind {
    Delegated,
    Undelegated,
}

#[derive(Queryable, Selectable, Insertable, Identifiable, Debug, Clone)]
#[diesel(table_name = settings, primary_key(key))]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at_ms: i64,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = evm_blocks)]
pub struct EvmBlock {
    pub number: i64,
    pub timestamp_ms: i64,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = pods)]
pub struct Pod {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub pod_address: String,
    pub pod_owner: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = operator_share_events)]
pub struct OperatorShareEvent {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub kind: String,
    pub operator: String,
    pub staker: String,
    pub strategy: String,
    pub shares: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = deposits)]
pub struct Deposit {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub staker: String,
    pub token: String,
    pub strategy: String,
    pub shares: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = staker_delegation_events)]
pub struct StakerDelegationEvent {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub kind: String,
    pub staker: String,
    pub operator: String,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = avs_operator_events)]
pub struct AvsOperatorEvent {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub operator: String,
    pub avs: String,
    pub status: i16,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = withdrawals_completed)]
pub struct WithdrawalCompleted {
    pub address: String,
    pub transaction_hash: String,
    pub transaction_index: i32,
    pub log_index: i32,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time_ms: i64,
    pub withdrawal_root: String,
}
