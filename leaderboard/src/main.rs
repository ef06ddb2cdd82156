use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use leaderboard::config::{self, Overrides};
use leaderboard::telemetry::{self, TelemetryConfig};
use leaderboard::commands;

#[derive(Parser)]
#[command(name = "leaderboard")]
#[command(about = "Score ledger and NFT ownership gateway", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.leaderboard/config.toml)
    #[arg(short, long, global = true, env = "LEADERBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Chain settings that may override the config file
#[derive(Args)]
struct ChainArgs {
    /// JSON-RPC endpoint of the chain node
    #[arg(long, env = "CHAIN_RPC_URL")]
    rpc_url: Option<String>,

    /// Address of the NFT collection
    #[arg(long, env = "NFT_CONTRACT")]
    nft_contract: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Address of the NFT collection
        #[arg(long)]
        nft_contract: Option<String>,
    },

    /// Run the HTTP gateway
    Run {
        /// Port for the HTTP API
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        /// Directory of the score database
        #[arg(long, env = "DB_PATH")]
        db_path: Option<PathBuf>,

        #[command(flatten)]
        chain: ChainArgs,
    },

    /// Print the stored leaderboard, highest score first
    Scores {
        /// Directory of the score database
        #[arg(long, env = "DB_PATH")]
        db_path: Option<PathBuf>,

        /// Show only the top N players
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Check how many tokens of the collection an address holds
    Owner {
        /// Address to check
        address: String,

        #[command(flatten)]
        chain: ChainArgs,
    },
}

impl ChainArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            rpc_url: self.rpc_url,
            nft_contract: self.nft_contract,
            ..Overrides::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    // `run` sets up its own subscriber once its config (and telemetry section) is loaded
    if !matches!(cli.command, Commands::Run { .. }) {
        telemetry::init_tracing(&TelemetryConfig::default(), cli.verbose)?;
    }

    match cli.command {
        Commands::Init { nft_contract } => commands::init::run(&config_path, nft_contract),
        Commands::Run { port, db_path, chain } => {
            let overrides = Overrides {
                port,
                db_path,
                ..chain.into_overrides()
            };
            commands::run::run(&config_path, overrides, cli.verbose)
        }
        Commands::Scores { db_path, limit } => {
            let overrides = Overrides {
                db_path,
                ..Overrides::default()
            };
            commands::scores::run(&config_path, overrides, limit)
        }
        Commands::Owner { address, chain } => {
            commands::owner::run(&config_path, &address, chain.into_overrides())
        }
    }
}
