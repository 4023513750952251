//! Password-based encryption of wallet secrets
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 from the caller's password and a
//! per-call random salt, then used for ChaCha20-Poly1305 authenticated
//! encryption. The encrypted blob is self-describing given the vault
//! parameters:
//!
//! ```text
//! salt (salt_len bytes) || nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! Every call is a pure function of its inputs. The vault holds only immutable
//! parameters, so one instance can be shared across threads without locking.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use common::Secret;
use rand::RngExt;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// PBKDF2 iteration count (OWASP 2023 recommendation for HMAC-SHA256).
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Random salt prepended to every blob.
pub const DEFAULT_SALT_LEN: usize = 16;

/// Shortest salt the vault accepts.
pub const MIN_SALT_LEN: usize = 8;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Associated data binding blobs to this vault format.
const VAULT_AAD: &[u8] = b"scrt-credential-vault-v1";

/// Structured wallet payload (mnemonic, derivation metadata, labels).
///
/// `serde_json::Map` keeps keys sorted, which makes the serialized form
/// canonical for a given payload.
pub type WalletData = serde_json::Map<String, serde_json::Value>;

/// Key-derivation and layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultParams {
    pub kdf_iterations: u32,
    pub salt_len: usize,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            salt_len: DEFAULT_SALT_LEN,
        }
    }
}

/// Stateless password-based encryption of credential material.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    params: VaultParams,
}

impl Default for CredentialVault {
    fn default() -> Self {
        Self {
            params: VaultParams::default(),
        }
    }
}

impl CredentialVault {
    /// Create a vault with explicit parameters.
    ///
    /// Rejects a zero iteration count and salts shorter than `MIN_SALT_LEN`.
    pub fn new(params: VaultParams) -> Result<Self> {
        if params.kdf_iterations == 0 {
            return Err(Error::validation(
                "kdf_iterations",
                "must be greater than 0",
            ));
        }
        if params.salt_len < MIN_SALT_LEN {
            return Err(Error::validation(
                "salt_len",
                format!("must be at least {MIN_SALT_LEN} bytes, got {}", params.salt_len),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> VaultParams {
        self.params
    }

    /// Derive a 256-bit key from `password` and `salt`.
    ///
    /// Deterministic for a given `(password, salt)` pair. The iteration count
    /// makes each derivation deliberately slow.
    pub fn derive_key(&self, password: &str, salt: &[u8]) -> Secret<[u8; KEY_LEN]> {
        debug!(
            salt_len = salt.len(),
            iterations = self.params.kdf_iterations,
            "deriving encryption key"
        );
        let mut key = Secret::new([0u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt,
            self.params.kdf_iterations,
            key.expose_mut(),
        );
        key
    }

    /// Encrypt `plaintext` under `password`.
    ///
    /// Salt and nonce are drawn fresh on every call, so encrypting the same
    /// plaintext twice never yields the same blob.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>> {
        let mut salt = vec![0u8; self.params.salt_len];
        let mut nonce = [0u8; NONCE_LEN];
        let mut rng = rand::rng();
        rng.fill(salt.as_mut_slice());
        rng.fill(&mut nonce);

        let key = self.derive_key(password, &salt);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.expose()));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: VAULT_AAD,
                },
            )
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut blob = Vec::with_capacity(salt.len() + NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        info!(
            plaintext_len = plaintext.len(),
            encrypted_len = blob.len(),
            "data encrypted"
        );
        Ok(blob)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// A wrong password, a flipped byte anywhere in the blob, or a truncated
    /// blob all fail authentication and return an error; no partial plaintext
    /// is ever returned.
    pub fn decrypt(&self, blob: &[u8], password: &str) -> Result<Secret<Vec<u8>>> {
        let salt_len = self.params.salt_len;
        let min_len = salt_len + NONCE_LEN + TAG_LEN;
        if blob.len() < min_len {
            warn!(len = blob.len(), min_len, "encrypted blob truncated");
            return Err(Error::Malformed(format!(
                "expected at least {min_len} bytes, got {}",
                blob.len()
            )));
        }

        let (salt, rest) = blob.split_at(salt_len);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(password, salt);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.expose()));
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: VAULT_AAD,
                },
            )
            .map_err(|_| {
                warn!("decryption failed, invalid password or corrupted data");
                Error::DecryptionFailed
            })?;

        info!(decrypted_len = plaintext.len(), "data decrypted");
        Ok(Secret::new(plaintext))
    }

    /// Serialize and encrypt a wallet payload, returning base64 text.
    pub fn encrypt_wallet_data(&self, data: &WalletData, password: &str) -> Result<String> {
        require_password(password)?;
        let bytes = Secret::new(
            serde_json::to_vec(data).map_err(|e| Error::Encryption(e.to_string()))?,
        );
        let blob = self.encrypt(bytes.expose(), password)?;
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt base64 text produced by [`encrypt_wallet_data`](Self::encrypt_wallet_data).
    pub fn decrypt_wallet_data(&self, encoded: &str, password: &str) -> Result<WalletData> {
        require_password(password)?;
        let blob = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Malformed(format!("invalid base64: {e}")))?;
        let plaintext = self.decrypt(&blob, password)?;
        serde_json::from_slice(plaintext.expose())
            .map_err(|e| Error::Malformed(format!("decrypted payload is not a JSON object: {e}")))
    }
}

fn require_password(password: &str) -> Result<()> {
    if password.is_empty() {
        warn!("wallet encryption attempted with empty password");
        return Err(Error::validation("password", "password cannot be empty"));
    }
    Ok(())
}
