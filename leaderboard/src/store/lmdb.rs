// Copyright (c) 2024 Botho Foundation

//! LMDB-backed score store.
//!
//! LMDB allows a single write transaction at a time, so the read and the
//! write of an accumulate share one exclusive transaction and cannot
//! interleave with another submission. Transactions block, so every call
//! is moved onto the tokio blocking pool.

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{PlayerScore, ScoreStore, StoreError};

/// Name of the LMDB database holding the scores
const SCORES_DB: &str = "scores";

/// identity -> bincode(PlayerScore)
type ScoresDb = Database<Str, Bytes>;

struct Inner {
    env: Env,
    scores: ScoresDb,
    path: PathBuf,
}

/// Durable score store in an LMDB environment directory
#[derive(Clone)]
pub struct LmdbScoreStore {
    inner: Arc<Inner>,
}

impl LmdbScoreStore {
    /// Open or create the store under `path` (a directory).
    pub fn open(path: &Path, map_size_mb: usize) -> Result<Self, StoreError> {
        fs::create_dir_all(path).map_err(|e| {
            StoreError::Database(format!("Failed to create {}: {}", path.display(), e))
        })?;

        // SAFETY: the environment is opened once per path by this process and
        // the files are not modified by anything else while it is open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let scores: ScoresDb = env.create_database(&mut wtxn, Some(SCORES_DB))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size_mb, "Opened score store");

        Ok(Self {
            inner: Arc::new(Inner {
                env,
                scores,
                path: path.to_path_buf(),
            }),
        })
    }

    /// Directory holding the LMDB files
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T, StoreError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StoreError::Database(format!("Store task failed: {}", e)))?
    }
}

impl Inner {
    fn find(&self, identity: &str) -> Result<Option<PlayerScore>, StoreError> {
        let rtxn = self.env.read_txn()?;
        self.scores.get(&rtxn, identity)?.map(decode).transpose()
    }

    fn accumulate(&self, identity: &str, amount: u64) -> Result<PlayerScore, StoreError> {
        let mut wtxn = self.env.write_txn()?;

        let record = match self.scores.get(&wtxn, identity)? {
            Some(bytes) => {
                let mut existing = decode(bytes)?;
                existing.accumulate(amount)?;
                existing
            }
            None => PlayerScore::new(identity, amount),
        };

        let bytes = bincode::serialize(&record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.scores.put(&mut wtxn, identity, &bytes)?;
        wtxn.commit()?;

        debug!(identity, amount, score = record.score, "Accumulated score");
        Ok(record)
    }

    fn list(&self) -> Result<Vec<PlayerScore>, StoreError> {
        let rtxn = self.env.read_txn()?;
        let mut records = Vec::new();
        for entry in self.scores.iter(&rtxn)? {
            let (_, bytes) = entry?;
            records.push(decode(bytes)?);
        }
        Ok(records)
    }
}

fn decode(bytes: &[u8]) -> Result<PlayerScore, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl ScoreStore for LmdbScoreStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<PlayerScore>, StoreError> {
        let identity = identity.to_owned();
        self.blocking(move |inner| inner.find(&identity)).await
    }

    async fn upsert_accumulate(
        &self,
        identity: &str,
        amount: u64,
    ) -> Result<PlayerScore, StoreError> {
        let identity = identity.to_owned();
        self.blocking(move |inner| inner.accumulate(&identity, amount))
            .await
    }

    async fn list_all(&self) -> Result<Vec<PlayerScore>, StoreError> {
        self.blocking(|inner| inner.list()).await
    }
}
