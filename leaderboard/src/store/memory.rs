// Copyright (c) 2024 Botho Foundation

//! In-process score store.
//!
//! Not durable. Used by tests and by deployments that accept losing the
//! leaderboard on restart. The accumulate runs inside one map-entry guard,
//! which locks the key's shard for the whole read-modify-write.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{PlayerScore, ScoreStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    scores: DashMap<String, u64>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<PlayerScore>, StoreError> {
        Ok(self
            .scores
            .get(identity)
            .map(|score| PlayerScore::new(identity, *score)))
    }

    async fn upsert_accumulate(
        &self,
        identity: &str,
        amount: u64,
    ) -> Result<PlayerScore, StoreError> {
        match self.scores.entry(identity.to_owned()) {
            Entry::Occupied(mut entry) => {
                let mut record = PlayerScore::new(identity, *entry.get());
                record.accumulate(amount)?;
                *entry.get_mut() = record.score;
                Ok(record)
            }
            Entry::Vacant(entry) => {
                entry.insert(amount);
                Ok(PlayerScore::new(identity, amount))
            }
        }
    }

    async fn list_all(&self) -> Result<Vec<PlayerScore>, StoreError> {
        Ok(self
            .scores
            .iter()
            .map(|entry| PlayerScore::new(entry.key().clone(), *entry.value()))
            .collect())
    }
}
