// Copyright (c) 2024 Botho Foundation

//! Ledger service: the request-level rules on top of the store and chain.
//!
//! A submission moves `Received -> Validated -> Persisted -> Acknowledged`,
//! or stops at `Rejected` before the store is touched. Ownership checks are
//! a timed pass-through to the chain reader.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chain::{ChainError, ChainReader};
use crate::identity::is_valid_identity;
use crate::store::{PlayerScore, ScoreStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Caller error; never retried by the service
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence failed; the write must be assumed not to have happened
    #[error("Score store unavailable: {0}")]
    StoreUnavailable(String),

    /// Chain node unreachable or timed out; safe to retry
    #[error("Chain node unavailable: {0}")]
    ChainUnavailable(String),

    /// Chain node refused the query
    #[error("Chain query rejected: {0}")]
    ChainQueryRejected(String),
}

impl LedgerError {
    /// Whether the fault lies with the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(self, LedgerError::InvalidInput(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Overflow { .. } => LedgerError::InvalidInput(e.to_string()),
            other => LedgerError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<ChainError> for LedgerError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Unavailable(msg) => LedgerError::ChainUnavailable(msg),
            ChainError::Rejected(msg) => LedgerError::ChainQueryRejected(msg),
        }
    }
}

/// Orchestrates score submissions and ownership checks
pub struct LedgerService {
    store: Arc<dyn ScoreStore>,
    chain: Arc<dyn ChainReader>,
    /// NFT collection queried by ownership checks
    nft_contract: String,
    /// Bound on one ownership check
    chain_timeout: Duration,
    /// Largest amount accepted per submission
    max_submission: Option<u64>,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn ScoreStore>,
        chain: Arc<dyn ChainReader>,
        nft_contract: impl Into<String>,
        chain_timeout: Duration,
    ) -> Self {
        Self {
            store,
            chain,
            nft_contract: nft_contract.into(),
            chain_timeout,
            max_submission: None,
        }
    }

    /// Cap the amount of a single submission
    pub fn with_max_submission(mut self, max: Option<u64>) -> Self {
        self.max_submission = max;
        self
    }

    pub fn nft_contract(&self) -> &str {
        &self.nft_contract
    }

    fn validate_submission(&self, identity: &str, amount: i64) -> Result<u64, LedgerError> {
        if !is_valid_identity(identity) {
            return Err(LedgerError::InvalidInput(format!(
                "{:?} is not a 0x-prefixed 20-byte hex address",
                identity
            )));
        }

        let amount = u64::try_from(amount).map_err(|_| {
            LedgerError::InvalidInput(format!("score must not be negative, got {}", amount))
        })?;

        if let Some(max) = self.max_submission {
            if amount > max {
                return Err(LedgerError::InvalidInput(format!(
                    "score {} exceeds the per-submission maximum of {}",
                    amount, max
                )));
            }
        }

        Ok(amount)
    }

    /// Add `amount` to the player's total, creating the record if needed.
    ///
    /// Not idempotent: submitting the same delta twice adds it twice.
    pub async fn submit_score(&self, identity: &str, amount: i64) -> Result<PlayerScore, LedgerError> {
        let amount = match self.validate_submission(identity, amount) {
            Ok(amount) => amount,
            Err(e) => {
                debug!(identity, amount, "Rejected score submission: {}", e);
                return Err(e);
            }
        };

        let record = self.store.upsert_accumulate(identity, amount).await.map_err(|e| {
            warn!(identity, amount, "Score submission failed: {}", e);
            LedgerError::from(e)
        })?;

        info!(identity, amount, total = record.score, "Score accepted");
        Ok(record)
    }

    /// Every stored score, unsorted
    pub async fn list_scores(&self) -> Result<Vec<PlayerScore>, LedgerError> {
        Ok(self.store.list_all().await?)
    }

    /// Look up a single player
    pub async fn find_score(&self, identity: &str) -> Result<Option<PlayerScore>, LedgerError> {
        Ok(self.store.find_by_identity(identity).await?)
    }

    /// Number of NFT tokens `address` holds right now.
    pub async fn check_ownership(&self, address: &str) -> Result<u64, LedgerError> {
        let query = self.chain.token_balance(&self.nft_contract, address);

        match tokio::time::timeout(self.chain_timeout, query).await {
            Ok(Ok(balance)) => {
                debug!(address, balance, "Ownership check");
                Ok(balance)
            }
            Ok(Err(e)) => {
                warn!(address, retryable = e.is_retryable(), "Ownership check failed: {}", e);
                Err(e.into())
            }
            Err(_) => {
                warn!(address, timeout_ms = self.chain_timeout.as_millis() as u64, "Ownership check timed out");
                Err(LedgerError::ChainUnavailable(format!(
                    "no answer from chain node within {:?}",
                    self.chain_timeout
                )))
            }
        }
    }
}
