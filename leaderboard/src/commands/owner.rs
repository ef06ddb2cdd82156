use anyhow::{Context, Result};
use std::path::Path;

use crate::chain::{ChainReader, JsonRpcChainReader};
use crate::config::{Config, Overrides};

/// One-shot ownership check against the configured collection
pub fn run(config_path: &Path, address: &str, overrides: Overrides) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    config.apply(overrides);
    config.chain.validate().context("Invalid chain configuration")?;

    let rt = tokio::runtime::Runtime::new()?;
    let balance = rt.block_on(async {
        let chain = JsonRpcChainReader::new(&config.chain.rpc_url, config.chain.timeout())?;
        chain.token_balance(&config.chain.nft_contract, address).await
    })
    .with_context(|| format!("Balance query to {} failed", config.chain.rpc_url))?;

    println!("Address:  {}", address);
    println!("Contract: {}", config.chain.nft_contract);
    println!("Tokens:   {}", balance);
    println!("Owner:    {}", if balance > 0 { "yes" } else { "no" });

    Ok(())
}
