// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use strum_macros::{AsRefStr, Display};

/// Coarse classification of a failed chain RPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RpcErrorKind {
    /// Request timed out or was aborted before a response arrived.
    Timeout,
    Connection,
    /// The node refused the block range (too many blocks or too many results).
    RangeTooLarge,
    Other,
}

impl RpcErrorKind {
    /// Classify a provider error from its rendered message.
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("timed out")
            || msg.contains("timeout")
            || msg.contains("aborted")
            || msg.contains("cancel")
        {
            RpcErrorKind::Timeout
        } else if msg.contains("block range")
            || msg.contains("range too large")
            || msg.contains("query returned more than")
            || msg.contains("exceed maximum block range")
            || msg.contains("too many blocks")
            || msg.contains("log response size exceeded")
        {
            RpcErrorKind::RangeTooLarge
        } else if msg.contains("connection")
            || msg.contains("connect")
            || msg.contains("dns error")
            || msg.contains("broken pipe")
            || msg.contains("unreachable")
        {
            RpcErrorKind::Connection
        } else {
            RpcErrorKind::Other
        }
    }
}

/// A raw log that could not be mapped to its event shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot decode log {transaction_hash}#{log_index}: {reason}")]
pub struct DecodeError {
    pub transaction_hash: String,
    pub log_index: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexerError {
    #[error("RPC error ({kind}): {message}")]
    Rpc { kind: RpcErrorKind, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    // A chunk of the bulk writer failed and was rolled back
    #[error("Write error: {0}")]
    Write(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Aggregation mismatch between {left} and {right}: {reason}")]
    AggregationMismatch {
        left: String,
        right: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl IndexerError {
    pub fn rpc(message: impl Into<String>) -> Self {
        let message = message.into();
        IndexerError::Rpc {
            kind: RpcErrorKind::classify(&message),
            message,
        }
    }

    /// Whether the next poll may succeed by retrying from the persisted cursor.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IndexerError::Rpc { .. } | IndexerError::Write(_) | IndexerError::Store(_)
        )
    }

    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            IndexerError::Rpc { kind, .. } => match kind {
                RpcErrorKind::Timeout => "rpc_timeout",
                RpcErrorKind::Connection => "rpc_connection",
                RpcErrorKind::RangeTooLarge => "rpc_range_too_large",
                RpcErrorKind::Other => "rpc_other",
            },
            IndexerError::Decode(_) => "decode_error",
            IndexerError::Write(_) => "write_error",
            IndexerError::Store(_) => "store_error",
            IndexerError::AggregationMismatch { .. } => "aggregation_mismatch",
            IndexerError::Validation(_) => "validation_error",
            IndexerError::Config(_) => "config_error",
        }
    }
}

impl From<diesel::result::Error> for IndexerError {
    fn from(err: diesel::result::Error) -> Self {
        IndexerError::Store(err.to_string())
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;
