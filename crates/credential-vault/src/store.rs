//! Encrypted wallet persistence
//!
//! Keeps a JSON file mapping wallet ids to their public metadata and the
//! vault-encrypted secret payload. Plaintext wallet material is never written:
//! `StoredWallet::seal` is the only way to build an entry, and it encrypts
//! before returning. All writes use temp-file + rename so a crash never leaves
//! a half-written file, and a tokio Mutex serializes concurrent writers.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::vault::{CredentialVault, WalletData};

/// File name used inside the configured wallet storage directory.
pub const WALLET_FILE_NAME: &str = "wallets.json";

/// Public wallet metadata plus the encrypted secret payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredWallet {
    pub address: String,
    #[serde(default)]
    pub account: u32,
    #[serde(default)]
    pub index: u32,
    /// Base64 blob produced by `CredentialVault::encrypt_wallet_data`
    encrypted: String,
}

impl StoredWallet {
    /// Encrypt `data` under `password` and wrap it with public metadata.
    pub fn seal(
        vault: &CredentialVault,
        address: impl Into<String>,
        account: u32,
        index: u32,
        data: &WalletData,
        password: &str,
    ) -> Result<Self> {
        Ok(Self {
            address: address.into(),
            account,
            index,
            encrypted: vault.encrypt_wallet_data(data, password)?,
        })
    }

    /// Decrypt the secret payload.
    pub fn open(&self, vault: &CredentialVault, password: &str) -> Result<WalletData> {
        vault.decrypt_wallet_data(&self.encrypted, password)
    }

    /// The encrypted payload as stored on disk.
    pub fn encrypted(&self) -> &str {
        &self.encrypted
    }
}

/// Thread-safe encrypted wallet file.
pub struct WalletStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, StoredWallet>>,
}

impl WalletStore {
    /// Open the wallet file inside `dir`, creating the directory and an empty
    /// file on first use.
    pub async fn open_dir(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Storage(format!("creating wallet directory: {e}")))?;
        Self::load(dir.join(WALLET_FILE_NAME)).await
    }

    /// Load wallets from the given file path.
    ///
    /// A missing file is created as `{}`.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Storage(format!("reading wallet file: {e}")))?;
            let wallets: BTreeMap<String, StoredWallet> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing wallet file: {e}")))?;
            info!(path = %path.display(), wallets = wallets.len(), "loaded wallets");
            wallets
        } else {
            info!(path = %path.display(), "wallet file not found, starting with empty store");
            let wallets = BTreeMap::new();
            write_atomic(&path, &wallets).await?;
            wallets
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, wallet_id: &str) -> Option<StoredWallet> {
        let state = self.state.lock().await;
        state.get(wallet_id).cloned()
    }

    /// Fetch a wallet and decrypt its payload.
    pub async fn unlock(
        &self,
        vault: &CredentialVault,
        wallet_id: &str,
        password: &str,
    ) -> Result<WalletData> {
        let wallet = self
            .get(wallet_id)
            .await
            .ok_or_else(|| Error::NotFound(wallet_id.to_string()))?;
        wallet.open(vault, password)
    }

    /// Wallet ids in sorted order.
    pub async fn wallet_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.keys().cloned().collect()
    }

    /// Add or replace a wallet and persist.
    pub async fn put(&self, wallet_id: String, wallet: StoredWallet) -> Result<()> {
        if wallet_id.trim().is_empty() {
            return Err(Error::validation("wallet_id", "wallet id cannot be empty"));
        }
        let mut state = self.state.lock().await;
        debug!(wallet_id, address = %wallet.address, "storing wallet");
        state.insert(wallet_id, wallet);
        write_atomic(&self.path, &state).await
    }

    /// Remove a wallet and persist. Returns the removed entry if present.
    pub async fn remove(&self, wallet_id: &str) -> Result<Option<StoredWallet>> {
        let mut state = self.state.lock().await;
        let removed = state.remove(wallet_id);
        if removed.is_some() {
            debug!(wallet_id, "removed wallet");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Write the wallet map atomically with 0600 permissions.
async fn write_atomic(path: &Path, data: &BTreeMap<String, StoredWallet>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Storage(format!("serializing wallets: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Storage("wallet path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".wallets.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Storage(format!("writing temp wallet file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Storage(format!("setting wallet file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Storage(format!("renaming temp wallet file: {e}")))?;

    debug!(path = %path.display(), "persisted wallets");
    Ok(())
}
