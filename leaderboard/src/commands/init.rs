use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Write a default config file
pub fn run(config_path: &Path, nft_contract: Option<String>) -> Result<()> {
    // Check if config already exists
    if Config::exists(config_path) {
        bail!(
            "Config already exists at {}\nUse a different --config path or delete the existing config.",
            config_path.display()
        );
    }

    let mut config = Config::default();
    if let Some(contract) = nft_contract {
        config.chain.nft_contract = contract;
        config.chain.validate()?;
    }
    config.save(config_path)?;

    info!("Config initialized at {}", config_path.display());
    println!("Config saved to: {}", config_path.display());
    println!("Scores will be stored in: {}", config.store.path.display());
    println!("\nNext steps:");
    if config.chain.nft_contract.is_empty() {
        println!("  1. Set chain.nft_contract in the config (or export NFT_CONTRACT)");
        println!("  2. Run 'leaderboard run' to start the gateway");
    } else {
        println!("  1. Run 'leaderboard run' to start the gateway");
    }

    Ok(())
}
