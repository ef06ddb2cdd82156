// Copyright (c) 2024 Botho Foundation
//
//! Shared helpers for the gateway integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use leaderboard::{
    chain::{ChainError, ChainReader},
    rpc::{self, GatewayState},
    service::LedgerService,
    store::{MemoryScoreStore, PlayerScore, ScoreStore, StoreError},
};

pub const PLAYER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";
pub const OTHER_PLAYER: &str = "0xde709f2102306220921060314715629080e2fb77";
pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

/// How the stub chain answers every query
pub enum ChainBehaviour {
    Balances(HashMap<String, u64>),
    Unavailable,
    Rejected,
    Hang,
}

pub struct StubChain {
    behaviour: ChainBehaviour,
}

impl StubChain {
    pub fn with_balances(balances: &[(&str, u64)]) -> Self {
        Self {
            behaviour: ChainBehaviour::Balances(
                balances.iter().map(|(a, b)| (a.to_string(), *b)).collect(),
            ),
        }
    }

    pub fn new(behaviour: ChainBehaviour) -> Self {
        Self { behaviour }
    }
}

#[async_trait]
impl ChainReader for StubChain {
    async fn token_balance(&self, _contract: &str, holder: &str) -> Result<u64, ChainError> {
        match &self.behaviour {
            ChainBehaviour::Balances(balances) => Ok(balances.get(holder).copied().unwrap_or(0)),
            ChainBehaviour::Unavailable => {
                Err(ChainError::Unavailable("connection refused".to_string()))
            }
            ChainBehaviour::Rejected => Err(ChainError::Rejected("execution reverted".to_string())),
            ChainBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            }
        }
    }
}

/// Store whose every operation fails
pub struct DownStore;

#[async_trait]
impl ScoreStore for DownStore {
    async fn find_by_identity(&self, _identity: &str) -> Result<Option<PlayerScore>, StoreError> {
        Err(StoreError::Database("disk on fire".to_string()))
    }

    async fn upsert_accumulate(&self, _identity: &str, _amount: u64) -> Result<PlayerScore, StoreError> {
        Err(StoreError::Database("disk on fire".to_string()))
    }

    async fn list_all(&self) -> Result<Vec<PlayerScore>, StoreError> {
        Err(StoreError::Database("disk on fire".to_string()))
    }
}

/// A gateway running on a random local port
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: Arc<GatewayState>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Stop accepting and wait for open connections to close
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

/// Builder for test gateways
pub struct GatewayBuilder {
    store: Arc<dyn ScoreStore>,
    chain: Arc<dyn ChainReader>,
    cors_origins: Vec<String>,
    rate_limit_per_minute: u32,
    chain_timeout: Duration,
    max_submission: Option<u64>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryScoreStore::new()),
            chain: Arc::new(StubChain::with_balances(&[])),
            cors_origins: vec!["http://localhost".to_string()],
            rate_limit_per_minute: 0,
            chain_timeout: Duration::from_secs(5),
            max_submission: None,
        }
    }
}

impl GatewayBuilder {
    pub fn store(mut self, store: Arc<dyn ScoreStore>) -> Self {
        self.store = store;
        self
    }

    pub fn chain(mut self, chain: impl ChainReader + 'static) -> Self {
        self.chain = Arc::new(chain);
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    pub fn chain_timeout(mut self, timeout: Duration) -> Self {
        self.chain_timeout = timeout;
        self
    }

    pub fn max_submission(mut self, max: u64) -> Self {
        self.max_submission = Some(max);
        self
    }

    pub async fn spawn(self) -> TestGateway {
        let service = LedgerService::new(self.store, self.chain, CONTRACT, self.chain_timeout)
            .with_max_submission(self.max_submission);
        let state = Arc::new(GatewayState::new(
            Arc::new(service),
            self.cors_origins,
            self.rate_limit_per_minute,
        ));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            let stop = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = rpc::serve(listener, server_state, stop).await {
                tracing::debug!("Gateway stopped: {}", e);
            }
        });

        TestGateway {
            addr,
            state,
            shutdown,
            handle,
        }
    }
}
