// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::chain::JsonRpcChainReader;
use crate::config::{Config, Overrides};
use crate::rpc::{start_gateway, GatewayState};
use crate::service::LedgerService;
use crate::store::open_store;
use crate::telemetry;

/// Run the gateway until Ctrl+C
pub fn run(config_path: &Path, overrides: Overrides, verbose: bool) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply(overrides);
    config.validate().context("Invalid configuration")?;

    // Create tokio runtime for the server and the OTLP exporter
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { run_async(config, verbose).await })
}

async fn run_async(config: Config, verbose: bool) -> Result<()> {
    let _telemetry = telemetry::init_tracing(&config.telemetry, verbose)?;

    // Set up shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    let store = open_store(&config.store).context("Failed to open score store")?;
    info!(backend = ?config.store.backend, "Score store ready");

    let chain = JsonRpcChainReader::new(&config.chain.rpc_url, config.chain.timeout())
        .context("Failed to build chain client")?;
    info!(
        rpc_url = %config.chain.rpc_url,
        contract = %config.chain.nft_contract,
        "Chain reader ready"
    );

    let service = LedgerService::new(
        store,
        Arc::new(chain),
        config.chain.nft_contract.clone(),
        config.chain.timeout(),
    )
    .with_max_submission(config.scores.max_submission);

    let state = Arc::new(GatewayState::new(
        Arc::new(service),
        config.server.cors_origins.clone(),
        config.server.rate_limit_per_minute,
    ));

    let addr = config.server.socket_addr();
    println!("Leaderboard gateway starting on {}. Press Ctrl+C to stop.", addr);

    start_gateway(addr, state, async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    })
    .await?;

    info!("Leaderboard gateway stopped");
    Ok(())
}
