// Copyright (c) 2024 Botho Foundation

//! Persistent score storage.
//!
//! A [`ScoreStore`] owns the collection of [`PlayerScore`] records, one per
//! identity. The accumulate operation is atomic per key inside the store
//! itself; callers never read-modify-write.

mod lmdb;
mod memory;

pub use lmdb::LmdbScoreStore;
pub use memory::MemoryScoreStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Score for {identity} would overflow ({current} + {amount})")]
    Overflow {
        identity: String,
        current: u64,
        amount: u64,
    },
}

impl From<heed::Error> for StoreError {
    fn from(e: heed::Error) -> Self {
        match e {
            heed::Error::Encoding(e) | heed::Error::Decoding(e) => {
                StoreError::Serialization(e.to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Accumulated score of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    /// Account address the score belongs to (unique key)
    pub identity: String,
    /// Running total of every accepted submission
    pub score: u64,
}

impl PlayerScore {
    pub fn new(identity: impl Into<String>, score: u64) -> Self {
        Self {
            identity: identity.into(),
            score,
        }
    }

    /// Add `amount` to this record, refusing to wrap.
    pub(crate) fn accumulate(&mut self, amount: u64) -> Result<(), StoreError> {
        self.score = self
            .score
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow {
                identity: self.identity.clone(),
                current: self.score,
                amount,
            })?;
        Ok(())
    }
}

/// Storage of player scores keyed by identity.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Look up one record. A missing key is `Ok(None)`, not an error.
    async fn find_by_identity(&self, identity: &str) -> Result<Option<PlayerScore>, StoreError>;

    /// Add `amount` to the record for `identity`, creating it when absent.
    ///
    /// Concurrent calls for the same identity are serialized: every
    /// successful call is applied exactly once. On error nothing is written.
    async fn upsert_accumulate(
        &self,
        identity: &str,
        amount: u64,
    ) -> Result<PlayerScore, StoreError>;

    /// Every stored record, in no particular order.
    async fn list_all(&self) -> Result<Vec<PlayerScore>, StoreError>;
}

/// Open the store selected by configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ScoreStore>, StoreError> {
    match config.backend {
        StoreBackend::Lmdb => {
            let store = LmdbScoreStore::open(&config.path, config.map_size_mb)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryScoreStore::new())),
    }
}
