//! Shared runtime for Secret Network tool invocations
//!
//! `Runtime` wires the pieces every tool call goes through: a rate-limit
//! check for the operation, a pooled LCD client, spending-policy validation
//! for outgoing amounts, and the session's active wallet, unlocked through the
//! credential vault on demand. It is built from an explicit `RuntimeConfig`.

pub mod config;
pub mod error;
pub mod session;

pub use config::{NetworkKind, RuntimeConfig};
pub use error::{Error, Result};
pub use session::{ActiveWallet, Session, SessionInfo, WalletInfo};

use std::path::PathBuf;

use client_pool::{ClientPool, LcdClientFactory, NetworkConfig, PoolStats, PooledClient};
use credential_vault::{CredentialVault, StoredWallet, WalletData, WalletStore};
use security_policy::{
    RateLimitStats, RateLimiterSet, SecurityManager, SpendingLimits, TransactionCheck,
};
use serde::Serialize;
use tracing::info;

/// Pooled client type handed to tool code.
pub type Client = PooledClient<LcdClientFactory>;

/// Snapshot of everything `Runtime` tracks, for health and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub network: NetworkStatus,
    pub session: SessionInfo,
    pub pool: PoolStats,
    pub limits: SpendingLimits,
    pub rate_limits: Vec<RateLimitStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_storage: Option<WalletStorageStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStatus {
    pub name: NetworkKind,
    pub endpoint: String,
    pub chain_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletStorageStatus {
    pub path: PathBuf,
    pub wallets: usize,
}

pub struct Runtime {
    network: NetworkKind,
    pool: ClientPool<LcdClientFactory>,
    rate_limits: RateLimiterSet,
    security: SecurityManager,
    session: Session,
    wallets: Option<WalletStore>,
}

impl Runtime {
    /// Build every component from `config`. Opens the wallet store when
    /// storage is enabled.
    pub async fn new(config: &RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let network = config.network_config()?;
        let pool = ClientPool::new(
            LcdClientFactory::new(config.request_timeout()),
            network,
            config.pool_config(),
        )?;
        let vault = CredentialVault::new(config.vault_params())?;
        let security = SecurityManager::new(config.spending_limits()?, vault);
        let rate_limits = config.rate_limiters()?;

        let wallets = match config.wallet_storage_dir() {
            Some(dir) => Some(WalletStore::open_dir(&dir).await?),
            None => None,
        };

        info!(
            network = %config.network.name,
            rate_limited_operations = config.rate_limits.len(),
            wallet_storage = wallets.is_some(),
            "runtime initialized"
        );

        Ok(Self {
            network: config.network.name,
            pool,
            rate_limits,
            security,
            session: Session::new(config.network.name),
            wallets,
        })
    }

    pub fn pool(&self) -> &ClientPool<LcdClientFactory> {
        &self.pool
    }

    pub fn rate_limits(&self) -> &RateLimiterSet {
        &self.rate_limits
    }

    pub fn security(&self) -> &SecurityManager {
        &self.security
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn wallets(&self) -> Option<&WalletStore> {
        self.wallets.as_ref()
    }

    pub fn network_config(&self) -> &NetworkConfig {
        self.pool.network()
    }

    /// Rate-limit `operation`, then check out a client.
    pub async fn acquire_client(&self, operation: &str) -> Result<Client> {
        self.rate_limits.check(operation)?;
        Ok(self.pool.acquire().await?)
    }

    /// Rate-limit `operation`, then apply spending policy to `amount`.
    pub fn validate_transaction(&self, operation: &str, amount: i64) -> Result<TransactionCheck> {
        self.rate_limits.check(operation)?;
        Ok(self.security.validate_transaction(amount)?)
    }

    /// Encrypt `data` and persist it under `info.wallet_id`.
    pub async fn save_wallet(
        &self,
        info: &WalletInfo,
        data: &WalletData,
        password: &str,
    ) -> Result<()> {
        let store = self.wallets.as_ref().ok_or(Error::StorageDisabled)?;
        let stored = StoredWallet::seal(
            self.security.vault(),
            info.address.clone(),
            info.account,
            info.index,
            data,
            password,
        )?;
        store.put(info.wallet_id.clone(), stored).await?;
        Ok(())
    }

    /// Make a stored wallet the session's active wallet. Nothing is decrypted.
    pub async fn load_stored_wallet(&self, wallet_id: &str) -> Result<WalletInfo> {
        let store = self.wallets.as_ref().ok_or(Error::StorageDisabled)?;
        let stored = store
            .get(wallet_id)
            .await
            .ok_or_else(|| credential_vault::Error::NotFound(wallet_id.to_string()))?;
        let info = WalletInfo {
            wallet_id: wallet_id.to_string(),
            address: stored.address.clone(),
            account: stored.account,
            index: stored.index,
        };
        self.session
            .load_wallet(ActiveWallet::new(info.clone(), stored.encrypted()))?;
        Ok(info)
    }

    /// Decrypt the active wallet's secret payload.
    pub fn unlock_wallet(&self, password: &str) -> Result<WalletData> {
        self.session.unlock_wallet(&self.security, password)
    }

    pub async fn status(&self) -> RuntimeStatus {
        let network = self.pool.network();
        let wallet_storage = match &self.wallets {
            Some(store) => Some(WalletStorageStatus {
                path: store.path().to_path_buf(),
                wallets: store.len().await,
            }),
            None => None,
        };
        RuntimeStatus {
            network: NetworkStatus {
                name: self.network,
                endpoint: network.endpoint.clone(),
                chain_id: network.chain_id.clone(),
            },
            session: self.session.info(),
            pool: self.pool.stats(),
            limits: self.security.limits(),
            rate_limits: self.rate_limits.all_stats(),
            wallet_storage,
        }
    }

    /// Stop the session and close the pool.
    pub fn shutdown(&self) {
        self.session.stop();
        self.pool.close();
        info!("runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ErrorCode, Remediation};
    use config::RateLimitEntry;

    fn test_config(dir: &std::path::Path) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.vault.kdf_iterations = 1_000;
        config.pool.max_connections = 2;
        config.pool.idle_timeout_secs = 1;
        config.wallet_storage.path = dir.to_path_buf();
        config.rate_limits = vec![RateLimitEntry {
            operation: "send_tokens".into(),
            max_calls: 2,
            window_secs: 60.0,
        }];
        config
    }

    fn wallet_info() -> WalletInfo {
        WalletInfo {
            wallet_id: "main".into(),
            address: "secret1qyqszqgpqyqszqgpqyqszqgpqyqszqgp".into(),
            account: 0,
            index: 3,
        }
    }

    #[tokio::test]
    async fn acquire_respects_rate_limit_and_pool() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();

        let a = runtime.acquire_client("query_balance").await.unwrap();
        assert_eq!(a.chain_id(), "pulsar-3");
        drop(a);

        runtime.acquire_client("send_tokens").await.unwrap();
        runtime.acquire_client("send_tokens").await.unwrap();
        let err = runtime.acquire_client("send_tokens").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
        assert_eq!(runtime.pool().stats().requests_served, 3);
    }

    #[tokio::test]
    async fn validate_transaction_combines_rate_limit_and_policy() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();

        let check = runtime.validate_transaction("send_tokens", 5_000_000).unwrap();
        assert!(check.confirmation_required);

        let err = runtime
            .validate_transaction("send_tokens", 20_000_000)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Security);

        let err = runtime.validate_transaction("send_tokens", 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RateLimitExceeded);
    }

    #[tokio::test]
    async fn stored_wallet_roundtrip_through_session() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();

        let mut data = WalletData::new();
        data.insert("mnemonic".into(), "legal winner thank year".into());
        runtime
            .save_wallet(&wallet_info(), &data, "CorrectHorse42")
            .await
            .unwrap();

        let err = runtime.load_stored_wallet("main").await.unwrap_err();
        assert!(matches!(err, Error::SessionInactive));

        runtime.session().start();
        let info = runtime.load_stored_wallet("main").await.unwrap();
        assert_eq!(info, wallet_info());
        assert_eq!(runtime.unlock_wallet("CorrectHorse42").unwrap(), data);

        let err = runtime.load_stored_wallet("ghost").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[tokio::test]
    async fn storage_disabled_rejects_wallet_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.wallet_storage.enabled = false;
        let runtime = Runtime::new(&config).await.unwrap();

        assert!(runtime.wallets().is_none());
        let err = runtime
            .save_wallet(&wallet_info(), &WalletData::new(), "CorrectHorse42")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StorageDisabled));
    }

    #[tokio::test]
    async fn status_serializes_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();
        runtime.session().start();
        runtime.acquire_client("send_tokens").await.unwrap();

        let status = serde_json::to_value(runtime.status().await).unwrap();
        assert_eq!(status["network"]["name"], "testnet");
        assert_eq!(status["network"]["chain_id"], "pulsar-3");
        assert_eq!(status["session"]["is_active"], true);
        assert_eq!(status["pool"]["max"], 2);
        assert_eq!(status["pool"]["idle"], 1);
        assert_eq!(status["limits"]["spending_limit"], 10_000_000);
        assert_eq!(status["rate_limits"][0]["operation"], "send_tokens");
        assert_eq!(status["rate_limits"][0]["calls"], 1);
        assert_eq!(status["wallet_storage"]["wallets"], 0);
    }

    #[tokio::test]
    async fn shutdown_closes_pool_and_stops_session() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();
        runtime.session().start();

        runtime.shutdown();
        assert!(!runtime.session().is_active());
        let err = runtime.acquire_client("query").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PoolClosed);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.pool.max_connections = 0;
        let err = Runtime::new(&config).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::Config);
    }
}
