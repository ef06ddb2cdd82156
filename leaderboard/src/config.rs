use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::identity::is_valid_identity;
use crate::telemetry::TelemetryConfig;

/// Main configuration for the leaderboard gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub scores: ScoresConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port for the HTTP API
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins for the HTTP API.
    /// Default is ["*"], so a dashboard hosted anywhere can poll the scores.
    /// List origins (e.g. "https://dashboard.example") to restrict it;
    /// "http://localhost" and "http://127.0.0.1" match any port.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Requests per minute allowed per client IP (0 disables limiting)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_rate_limit() -> u32 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Which [`crate::store::ScoreStore`] implementation to open
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded LMDB environment on disk
    #[default]
    Lmdb,
    /// Process memory, lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory of the LMDB environment
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Maximum size of the memory map in MiB
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,
}

fn default_store_path() -> PathBuf {
    default_data_dir().join("scores")
}

fn default_map_size_mb() -> usize {
    64
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            map_size_mb: default_map_size_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the chain node
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Address of the NFT collection contract
    #[serde(default)]
    pub nft_contract: String,

    /// Upper bound on a single balance query
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_rpc_url() -> String {
    // BNB Smart Chain testnet
    "https://data-seed-prebsc-1-s1.binance.org:8545/".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            nft_contract: String::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ChainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the settings needed before any ownership query can run
    pub fn validate(&self) -> Result<()> {
        if self.nft_contract.is_empty() {
            bail!("chain.nft_contract is not set (config file or NFT_CONTRACT)");
        }
        if !is_valid_identity(&self.nft_contract) {
            bail!(
                "chain.nft_contract {:?} is not a 0x-prefixed 20-byte address",
                self.nft_contract
            );
        }
        if self.timeout_ms == 0 {
            bail!("chain.timeout_ms must be greater than zero");
        }
        if self.rpc_url.is_empty() {
            bail!("chain.rpc_url is not set");
        }
        Ok(())
    }
}

/// Rules applied to incoming score submissions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoresConfig {
    /// Largest amount accepted in one submission (unbounded when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_submission: Option<u64>,
}

/// Values supplied on the command line or through the environment.
/// They take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub rpc_url: Option<String>,
    pub nft_contract: Option<String>,
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load config from a file, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if Self::exists(path) {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(path) = overrides.db_path {
            self.store.path = path;
        }
        if let Some(url) = overrides.rpc_url {
            self.chain.rpc_url = url;
        }
        if let Some(contract) = overrides.nft_contract {
            self.chain.nft_contract = contract;
        }
    }

    /// Check the whole config before serving
    pub fn validate(&self) -> Result<()> {
        self.chain.validate()?;
        if self.store.backend == StoreBackend::Lmdb && self.store.map_size_mb == 0 {
            return Err(anyhow!("store.map_size_mb must be greater than zero"));
        }
        if self.scores.max_submission == Some(0) {
            return Err(anyhow!(
                "scores.max_submission of 0 would reject every submission; remove it to disable the cap"
            ));
        }
        Ok(())
    }
}

/// Get the default data directory path
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leaderboard")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
