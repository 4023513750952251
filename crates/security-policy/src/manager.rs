//! Transaction policy enforcement and wallet encryption
//!
//! `SecurityManager` owns the mutable spending limits behind one lock, so a
//! validation always sees a consistent (limit, threshold) pair even while an
//! operator is updating them.

use std::sync::{Mutex, PoisonError};

use credential_vault::{CredentialVault, WalletData};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::spending::{
    self, DEFAULT_CONFIRMATION_THRESHOLD, DEFAULT_SPENDING_LIMIT, NATIVE_DENOM,
};

const UNSPECIFIED_RECIPIENT: &str = "(to be specified)";

/// Per-transaction spending limit and confirmation threshold, in `uscrt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpendingLimits {
    pub spending_limit: i64,
    pub confirmation_threshold: i64,
}

impl Default for SpendingLimits {
    fn default() -> Self {
        Self {
            spending_limit: DEFAULT_SPENDING_LIMIT,
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
        }
    }
}

impl SpendingLimits {
    /// Build limits, rejecting negative values.
    pub fn new(spending_limit: i64, confirmation_threshold: i64) -> Result<Self> {
        ensure_non_negative("spending_limit", spending_limit)?;
        ensure_non_negative("confirmation_threshold", confirmation_threshold)?;
        Ok(Self {
            spending_limit,
            confirmation_threshold,
        })
    }
}

/// Outcome of [`SecurityManager::validate_transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionCheck {
    pub allowed: bool,
    pub confirmation_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Applies spending policy and encrypts wallet material.
#[derive(Debug)]
pub struct SecurityManager {
    vault: CredentialVault,
    limits: Mutex<SpendingLimits>,
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self::new(SpendingLimits::default(), CredentialVault::default())
    }
}

impl SecurityManager {
    pub fn new(limits: SpendingLimits, vault: CredentialVault) -> Self {
        Self {
            vault,
            limits: Mutex::new(limits),
        }
    }

    /// Vault used for wallet encryption.
    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Snapshot of the current limits.
    pub fn limits(&self) -> SpendingLimits {
        *self.limits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check `amount` against the spending limit and decide whether it needs
    /// confirmation.
    ///
    /// Over-limit and negative amounts are errors rather than a
    /// `TransactionCheck` with `allowed == false`.
    pub fn validate_transaction(&self, amount: i64) -> Result<TransactionCheck> {
        let limits = self.limits.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = spending::check_spending_limit(amount, limits.spending_limit) {
            warn!(amount, limit = limits.spending_limit, error = %e, "transaction rejected");
            metrics::counter!("transaction_validations_total", "outcome" => "rejected")
                .increment(1);
            return Err(e);
        }

        let check = if spending::confirmation_required(amount, limits.confirmation_threshold) {
            metrics::counter!("transaction_validations_total", "outcome" => "confirmation_required")
                .increment(1);
            TransactionCheck {
                allowed: true,
                confirmation_required: true,
                message: Some(spending::confirmation_message(
                    amount,
                    NATIVE_DENOM,
                    UNSPECIFIED_RECIPIENT,
                )),
            }
        } else {
            metrics::counter!("transaction_validations_total", "outcome" => "allowed").increment(1);
            TransactionCheck {
                allowed: true,
                confirmation_required: false,
                message: None,
            }
        };

        debug!(
            amount,
            confirmation_required = check.confirmation_required,
            "transaction validated"
        );
        Ok(check)
    }

    /// Encrypt wallet data into a base64 blob.
    pub fn encrypt_wallet(&self, data: &WalletData, password: &str) -> Result<String> {
        Ok(self.vault.encrypt_wallet_data(data, password)?)
    }

    /// Decrypt a blob produced by [`SecurityManager::encrypt_wallet`].
    pub fn decrypt_wallet(&self, encrypted: &str, password: &str) -> Result<WalletData> {
        Ok(self.vault.decrypt_wallet_data(encrypted, password)?)
    }

    /// Replace the hard per-transaction limit. Negative values are rejected.
    pub fn update_spending_limit(&self, limit: i64) -> Result<()> {
        ensure_non_negative("spending_limit", limit)?;
        let mut limits = self.limits.lock().unwrap_or_else(PoisonError::into_inner);
        info!(old = limits.spending_limit, new = limit, "spending limit updated");
        limits.spending_limit = limit;
        Ok(())
    }

    /// Replace the confirmation threshold. Negative values are rejected.
    pub fn update_confirmation_threshold(&self, threshold: i64) -> Result<()> {
        ensure_non_negative("confirmation_threshold", threshold)?;
        let mut limits = self.limits.lock().unwrap_or_else(PoisonError::into_inner);
        info!(
            old = limits.confirmation_threshold,
            new = threshold,
            "confirmation threshold updated"
        );
        limits.confirmation_threshold = threshold;
        Ok(())
    }

    /// Restore [`DEFAULT_SPENDING_LIMIT`] and [`DEFAULT_CONFIRMATION_THRESHOLD`],
    /// whatever the manager was configured with.
    pub fn reset_to_defaults(&self) {
        let mut limits = self.limits.lock().unwrap_or_else(PoisonError::into_inner);
        *limits = SpendingLimits::default();
        info!(
            spending_limit = limits.spending_limit,
            confirmation_threshold = limits.confirmation_threshold,
            "limits reset"
        );
    }
}

fn ensure_non_negative(field: &'static str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(Error::validation(field, format!("{field} cannot be negative")));
    }
    Ok(())
}
