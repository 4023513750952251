//! Session lifecycle and the active wallet
//!
//! One mutex guards all session state. Wallet material held by the session is
//! the encrypted blob only; `unlock_wallet` decrypts on demand outside the
//! lock and hands the plaintext to the caller.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use credential_vault::WalletData;
use security_policy::SecurityManager;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::NetworkKind;
use crate::error::{Error, Result};

/// Public wallet identity, safe to log and serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub wallet_id: String,
    pub address: String,
    pub account: u32,
    pub index: u32,
}

/// A wallet loaded into the session: public info plus its encrypted payload.
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveWallet {
    pub info: WalletInfo,
    encrypted: String,
}

impl ActiveWallet {
    /// `encrypted` is a blob from `SecurityManager::encrypt_wallet`.
    pub fn new(info: WalletInfo, encrypted: impl Into<String>) -> Self {
        Self {
            info,
            encrypted: encrypted.into(),
        }
    }
}

impl std::fmt::Debug for ActiveWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveWallet")
            .field("info", &self.info)
            .field("encrypted", &"[REDACTED]")
            .finish()
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub is_active: bool,
    pub network: NetworkKind,
    pub has_wallet: bool,
    pub wallet_address: Option<String>,
    /// Unix seconds
    pub started_at: Option<u64>,
    pub duration: f64,
}

#[derive(Debug)]
struct SessionState {
    id: Option<Uuid>,
    active: bool,
    network: NetworkKind,
    wallet: Option<ActiveWallet>,
    started: Option<(Instant, SystemTime)>,
    stopped: Option<Instant>,
}

impl SessionState {
    fn duration(&self) -> Duration {
        match self.started {
            Some((start, _)) => self
                .stopped
                .unwrap_or_else(Instant::now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(network: NetworkKind) -> Self {
        debug!(%network, "session initialized");
        Self {
            state: Mutex::new(SessionState {
                id: None,
                active: false,
                network,
                wallet: None,
                started: None,
                stopped: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session. Starting an active session keeps the current one.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.active {
            warn!(session_id = ?state.id, "session already active, continuing");
            return;
        }
        let id = Uuid::new_v4();
        state.id = Some(id);
        state.started = Some((Instant::now(), SystemTime::now()));
        state.stopped = None;
        state.active = true;
        info!(session_id = %id, network = %state.network, "session started");
    }

    /// Stop the session and unload any wallet. No-op when inactive.
    pub fn stop(&self) {
        stop_locked(&mut self.lock());
    }

    /// Stop and forget the session id and timing.
    pub fn reset(&self) {
        let mut state = self.lock();
        stop_locked(&mut state);
        state.id = None;
        state.started = None;
        state.stopped = None;
        info!("session reset");
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.lock().id
    }

    /// Time since start, frozen at stop. Zero before the first start.
    pub fn duration(&self) -> Duration {
        self.lock().duration()
    }

    pub fn network(&self) -> NetworkKind {
        self.lock().network
    }

    pub fn set_network(&self, network: NetworkKind) {
        let mut state = self.lock();
        if state.network != network {
            info!(from = %state.network, to = %network, "session network changed");
            state.network = network;
        }
    }

    /// Make `wallet` the active wallet, replacing any current one.
    pub fn load_wallet(&self, wallet: ActiveWallet) -> Result<()> {
        let mut state = self.lock();
        if !state.active {
            warn!(address = %wallet.info.address, "cannot load wallet: session not active");
            return Err(Error::SessionInactive);
        }
        if let Some(old) = &state.wallet {
            warn!(
                old_address = %old.info.address,
                new_address = %wallet.info.address,
                "replacing loaded wallet"
            );
        }
        info!(
            wallet_id = %wallet.info.wallet_id,
            address = %wallet.info.address,
            "wallet loaded"
        );
        state.wallet = Some(wallet);
        Ok(())
    }

    pub fn unload_wallet(&self) {
        let mut state = self.lock();
        match state.wallet.take() {
            Some(wallet) => info!(address = %wallet.info.address, "wallet unloaded"),
            None => debug!("no wallet loaded"),
        }
    }

    pub fn has_wallet(&self) -> bool {
        self.lock().wallet.is_some()
    }

    /// Public info of the active wallet.
    pub fn wallet(&self) -> Option<WalletInfo> {
        self.lock().wallet.as_ref().map(|w| w.info.clone())
    }

    /// Decrypt the active wallet's secret payload.
    ///
    /// Decryption runs after the session lock is released.
    pub fn unlock_wallet(&self, security: &SecurityManager, password: &str) -> Result<WalletData> {
        let (address, encrypted) = {
            let state = self.lock();
            if !state.active {
                return Err(Error::SessionInactive);
            }
            let wallet = state.wallet.as_ref().ok_or(Error::NoWallet)?;
            (wallet.info.address.clone(), wallet.encrypted.clone())
        };
        let data = security.decrypt_wallet(&encrypted, password)?;
        debug!(%address, "wallet unlocked");
        Ok(data)
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.lock();
        SessionInfo {
            session_id: state.id.map(|id| id.to_string()),
            is_active: state.active,
            network: state.network,
            has_wallet: state.wallet.is_some(),
            wallet_address: state.wallet.as_ref().map(|w| w.info.address.clone()),
            started_at: state.started.and_then(|(_, wall)| {
                wall.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
            }),
            duration: state.duration().as_secs_f64(),
        }
    }
}

fn stop_locked(state: &mut SessionState) {
    if !state.active {
        debug!("session already inactive");
        return;
    }
    state.stopped = Some(Instant::now());
    if let Some(wallet) = state.wallet.take() {
        debug!(address = %wallet.info.address, "unloading wallet on session stop");
    }
    state.active = false;
    info!(
        session_id = ?state.id,
        duration_secs = state.duration().as_secs_f64(),
        "session stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ErrorCode, Remediation};
    use credential_vault::{CredentialVault, VaultParams};
    use security_policy::SpendingLimits;

    fn security() -> SecurityManager {
        let vault = CredentialVault::new(VaultParams {
            kdf_iterations: 1_000,
            salt_len: 16,
        })
        .unwrap();
        SecurityManager::new(SpendingLimits::default(), vault)
    }

    fn wallet(security: &SecurityManager, address: &str) -> ActiveWallet {
        let mut data = WalletData::new();
        data.insert("mnemonic".into(), "abandon abandon about".into());
        let encrypted = security.encrypt_wallet(&data, "Pw123456789a").unwrap();
        ActiveWallet::new(
            WalletInfo {
                wallet_id: "main".into(),
                address: address.into(),
                account: 0,
                index: 0,
            },
            encrypted,
        )
    }

    #[test]
    fn start_assigns_id_and_stop_clears_wallet() {
        let security = security();
        let session = Session::new(NetworkKind::Testnet);
        assert!(!session.is_active());
        assert!(session.session_id().is_none());

        session.start();
        let id = session.session_id().unwrap();
        session.start();
        assert_eq!(session.session_id(), Some(id), "second start keeps session");

        session.load_wallet(wallet(&security, "secret1a")).unwrap();
        assert!(session.has_wallet());

        session.stop();
        assert!(!session.is_active());
        assert!(!session.has_wallet());
        assert_eq!(session.session_id(), Some(id));
    }

    #[test]
    fn load_wallet_requires_active_session() {
        let security = security();
        let session = Session::new(NetworkKind::Testnet);
        let err = session.load_wallet(wallet(&security, "secret1a")).unwrap_err();
        assert!(matches!(err, Error::SessionInactive));
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn load_replaces_existing_wallet() {
        let security = security();
        let session = Session::new(NetworkKind::Testnet);
        session.start();
        session.load_wallet(wallet(&security, "secret1a")).unwrap();
        session.load_wallet(wallet(&security, "secret1b")).unwrap();
        assert_eq!(session.wallet().unwrap().address, "secret1b");

        session.unload_wallet();
        session.unload_wallet();
        assert!(session.wallet().is_none());
    }

    #[test]
    fn unlock_decrypts_active_wallet() {
        let security = security();
        let session = Session::new(NetworkKind::Testnet);
        session.start();

        assert!(matches!(
            session.unlock_wallet(&security, "Pw123456789a"),
            Err(Error::NoWallet)
        ));

        session.load_wallet(wallet(&security, "secret1a")).unwrap();
        let data = session.unlock_wallet(&security, "Pw123456789a").unwrap();
        assert_eq!(data["mnemonic"], "abandon abandon about");

        let err = session.unlock_wallet(&security, "wrong").unwrap_err();
        assert_eq!(err.code(), ErrorCode::Security);
    }

    #[test]
    fn duration_freezes_on_stop_and_reset_clears() {
        let session = Session::new(NetworkKind::Mainnet);
        assert_eq!(session.duration(), Duration::ZERO);

        session.start();
        std::thread::sleep(Duration::from_millis(20));
        session.stop();
        let frozen = session.duration();
        assert!(frozen >= Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(session.duration(), frozen);

        session.reset();
        assert!(session.session_id().is_none());
        assert_eq!(session.duration(), Duration::ZERO);
    }

    #[test]
    fn info_reflects_state() {
        let security = security();
        let session = Session::new(NetworkKind::Testnet);
        let info = session.info();
        assert!(!info.is_active);
        assert!(info.session_id.is_none());
        assert!(info.started_at.is_none());

        session.start();
        session.set_network(NetworkKind::Mainnet);
        session.load_wallet(wallet(&security, "secret1a")).unwrap();
        let info = session.info();
        assert!(info.is_active);
        assert_eq!(info.network, NetworkKind::Mainnet);
        assert_eq!(info.wallet_address.as_deref(), Some("secret1a"));
        assert!(info.started_at.is_some());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["network"], "mainnet");
    }

    #[test]
    fn debug_output_hides_encrypted_payload() {
        let security = security();
        let active = wallet(&security, "secret1a");
        let rendered = format!("{active:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains(&active.encrypted));
    }
}
