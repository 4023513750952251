//! Credential vault for wallet secrets at rest
//!
//! Password-based authenticated encryption of wallet material plus an
//! encrypted-only wallet file store. Plaintext returned by the vault is
//! wrapped in `common::Secret` and zeroized when dropped.
//!
//! Flow:
//! 1. Tool layer calls `CredentialVault::encrypt_wallet_data()` with a password
//! 2. The sealed wallet is persisted via `WalletStore::put()`
//! 3. Later, `WalletStore::unlock()` re-derives the key and decrypts
//! 4. A wrong password or tampered file fails with a security error

pub mod error;
pub mod password;
pub mod store;
pub mod vault;

pub use error::{Error, Result};
pub use password::{MIN_PASSWORD_LENGTH, is_strong_password};
pub use store::{StoredWallet, WALLET_FILE_NAME, WalletStore};
pub use vault::{
    CredentialVault, DEFAULT_KDF_ITERATIONS, DEFAULT_SALT_LEN, VaultParams, WalletData,
};
