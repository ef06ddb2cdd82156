// Copyright (c) 2024 Botho Foundation

//! Read-only access to the NFT collection on an EVM chain.
//!
//! The reader is a stateless relay: every call is one round trip to the
//! node, with no retry and no caching.

mod json_rpc;

pub use json_rpc::{balance_of_calldata, parse_quantity, JsonRpcChainReader, BALANCE_OF_SELECTOR};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Node unreachable, timed out, or answered with garbage. Retryable.
    #[error("Chain node unavailable: {0}")]
    Unavailable(String),

    /// Node answered but refused the call. Not retryable as-is.
    #[error("Chain query rejected: {0}")]
    Rejected(String),
}

impl ChainError {
    /// Whether retrying the same query later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainError::Unavailable(_))
    }
}

/// Token balance lookups against a chain node.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Number of tokens of `contract` held by `holder`.
    ///
    /// `holder` is passed through as given; implementations report an
    /// argument the node cannot accept as [`ChainError::Rejected`].
    async fn token_balance(&self, contract: &str, holder: &str) -> Result<u64, ChainError>;
}
