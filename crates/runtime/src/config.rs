//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. Every section is
//! optional; an empty file yields a testnet runtime with default limits.
//!
//! ```toml
//! [network]
//! name = "custom"
//! lcd_url = "https://lcd.example.org"
//! chain_id = "secret-4"
//!
//! [pool]
//! max_connections = 10
//!
//! [[rate_limits]]
//! operation = "send_tokens"
//! max_calls = 5
//! window_secs = 60
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use client_pool::{NetworkConfig, PoolConfig};
use credential_vault::VaultParams;
use security_policy::{RateLimiter, RateLimiterSet, SpendingLimits};
use serde::{Deserialize, Serialize};

pub const MAINNET_URL: &str = "https://secret-4.api.trivium.network:1317";
pub const MAINNET_CHAIN_ID: &str = "secret-4";
pub const TESTNET_URL: &str = "https://pulsar.lcd.secretnodes.com";
pub const TESTNET_CHAIN_ID: &str = "pulsar-3";

/// Rate-limit entry name that applies to every operation without its own entry.
pub const DEFAULT_RATE_LIMIT_OPERATION: &str = "*";

const DEFAULT_CONFIG_FILE: &str = "scrt-runtime.toml";

/// Which Secret Network deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Mainnet,
    #[default]
    Testnet,
    Custom,
}

impl NetworkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkKind::Mainnet => "mainnet",
            NetworkKind::Testnet => "testnet",
            NetworkKind::Custom => "custom",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkKind {
    type Err = common::Error;

    fn from_str(s: &str) -> common::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(NetworkKind::Mainnet),
            "testnet" => Ok(NetworkKind::Testnet),
            "custom" => Ok(NetworkKind::Custom),
            other => Err(common::Error::Config(format!(
                "unknown network '{other}', expected mainnet, testnet or custom"
            ))),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub network: NetworkSection,
    pub pool: PoolSection,
    pub security: SecuritySection,
    pub vault: VaultSection,
    pub wallet_storage: WalletStorageSection,
    pub rate_limits: Vec<RateLimitEntry>,
}

/// Network selection. `lcd_url` and `chain_id` override the preset for
/// mainnet and testnet and are required for custom.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub name: NetworkKind,
    pub lcd_url: Option<String>,
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub max_connections: usize,
    /// Longest an acquire waits for a free client.
    pub idle_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            max_connections: client_pool::DEFAULT_MAX_CONNECTIONS,
            idle_timeout_secs: client_pool::DEFAULT_ACQUIRE_TIMEOUT.as_secs(),
            request_timeout_secs: 30,
        }
    }
}

/// Spending policy, in uscrt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub spending_limit: i64,
    pub confirmation_threshold: i64,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            spending_limit: security_policy::DEFAULT_SPENDING_LIMIT,
            confirmation_threshold: security_policy::DEFAULT_CONFIRMATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    pub kdf_iterations: u32,
    pub salt_len: usize,
}

impl Default for VaultSection {
    fn default() -> Self {
        let params = VaultParams::default();
        Self {
            kdf_iterations: params.kdf_iterations,
            salt_len: params.salt_len,
        }
    }
}

/// Encrypted wallet persistence. `~` expands to `$HOME`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletStorageSection {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for WalletStorageSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("~/.secret-mcp/wallets"),
        }
    }
}

/// One `[[rate_limits]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitEntry {
    pub operation: String,
    pub max_calls: usize,
    pub window_secs: f64,
}

impl RuntimeConfig {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Env overlays:
    /// - `SECRET_NETWORK` selects mainnet, testnet or custom
    /// - `SECRET_CUSTOM_URL` / `SECRET_CUSTOM_CHAIN_ID` set the endpoint
    /// - `WALLET_STORAGE_PATH` moves the wallet directory
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse, overlay env and validate.
    pub fn from_toml(contents: &str) -> common::Result<Self> {
        let mut config: RuntimeConfig = toml::from_str(contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> common::Result<()> {
        if let Ok(name) = std::env::var("SECRET_NETWORK") {
            self.network.name = name.parse()?;
        }
        if let Ok(url) = std::env::var("SECRET_CUSTOM_URL") {
            self.network.lcd_url = Some(url);
        }
        if let Ok(chain_id) = std::env::var("SECRET_CUSTOM_CHAIN_ID") {
            self.network.chain_id = Some(chain_id);
        }
        if let Ok(path) = std::env::var("WALLET_STORAGE_PATH") {
            self.wallet_storage.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Reject values the runtime cannot start with.
    pub fn validate(&self) -> common::Result<()> {
        self.network_config()?;

        if self.pool.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.pool.idle_timeout_secs == 0 {
            return Err(common::Error::Config(
                "idle_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.pool.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        SpendingLimits::new(
            self.security.spending_limit,
            self.security.confirmation_threshold,
        )
        .map_err(|e| common::Error::Config(e.to_string()))?;

        credential_vault::CredentialVault::new(self.vault_params())
            .map_err(|e| common::Error::Config(e.to_string()))?;

        if self.wallet_storage.enabled && self.wallet_storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config(
                "wallet_storage.path cannot be empty when storage is enabled".into(),
            ));
        }

        self.rate_limiters()?;
        Ok(())
    }

    /// Endpoint and chain id for the selected network.
    pub fn network_config(&self) -> common::Result<NetworkConfig> {
        let (preset_url, preset_chain) = match self.network.name {
            NetworkKind::Mainnet => (Some(MAINNET_URL), Some(MAINNET_CHAIN_ID)),
            NetworkKind::Testnet => (Some(TESTNET_URL), Some(TESTNET_CHAIN_ID)),
            NetworkKind::Custom => (None, None),
        };

        let url = self
            .network
            .lcd_url
            .as_deref()
            .or(preset_url)
            .ok_or_else(|| {
                common::Error::Config("custom network requires network.lcd_url".into())
            })?;
        let chain_id = self
            .network
            .chain_id
            .as_deref()
            .or(preset_chain)
            .ok_or_else(|| {
                common::Error::Config("custom network requires network.chain_id".into())
            })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "lcd_url must start with http:// or https://, got: {url}"
            )));
        }
        if chain_id.trim().is_empty() {
            return Err(common::Error::Config("chain_id cannot be empty".into()));
        }

        Ok(NetworkConfig::new(url, chain_id))
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.pool.max_connections,
            acquire_timeout: Duration::from_secs(self.pool.idle_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.request_timeout_secs)
    }

    pub fn spending_limits(&self) -> common::Result<SpendingLimits> {
        SpendingLimits::new(
            self.security.spending_limit,
            self.security.confirmation_threshold,
        )
        .map_err(|e| common::Error::Config(e.to_string()))
    }

    pub fn vault_params(&self) -> VaultParams {
        VaultParams {
            kdf_iterations: self.vault.kdf_iterations,
            salt_len: self.vault.salt_len,
        }
    }

    /// Build one limiter per `[[rate_limits]]` entry; `operation = "*"`
    /// becomes the fallback for unlisted operations.
    pub fn rate_limiters(&self) -> common::Result<RateLimiterSet> {
        let mut set = RateLimiterSet::new();
        let mut seen = std::collections::HashSet::new();

        for entry in &self.rate_limits {
            let operation = entry.operation.trim();
            if operation.is_empty() {
                return Err(common::Error::Config(
                    "rate_limits.operation cannot be empty".into(),
                ));
            }
            if !seen.insert(operation.to_string()) {
                return Err(common::Error::Config(format!(
                    "duplicate rate limit for operation '{operation}'"
                )));
            }
            let limiter = RateLimiter::from_secs_f64(entry.max_calls, entry.window_secs)
                .map_err(|e| {
                    common::Error::Config(format!("rate limit for '{operation}': {e}"))
                })?;
            if operation == DEFAULT_RATE_LIMIT_OPERATION {
                set = set.with_default(limiter);
            } else {
                set.insert(operation, limiter);
            }
        }
        Ok(set)
    }

    /// Wallet directory with `~` expanded, or `None` when storage is disabled.
    pub fn wallet_storage_dir(&self) -> Option<PathBuf> {
        if !self.wallet_storage.enabled {
            return None;
        }
        Some(expand_home(&self.wallet_storage.path))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
