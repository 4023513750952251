//! Spending limits and confirmation thresholds
//!
//! Amounts are integers in the chain's smallest unit (`uscrt`).

use crate::error::{Error, Result};

/// Default maximum amount per transaction (10 SCRT).
pub const DEFAULT_SPENDING_LIMIT: i64 = 10_000_000;

/// Default amount above which a transaction needs explicit confirmation (1 SCRT).
pub const DEFAULT_CONFIRMATION_THRESHOLD: i64 = 1_000_000;

/// Native denomination used in confirmation prompts.
pub const NATIVE_DENOM: &str = "uscrt";

/// Reject negative amounts and amounts strictly above `limit`.
///
/// An amount exactly equal to the limit is allowed.
pub fn check_spending_limit(amount: i64, limit: i64) -> Result<()> {
    if amount < 0 {
        return Err(Error::validation("amount", "amount cannot be negative"));
    }
    if amount > limit {
        return Err(Error::SpendingLimitExceeded { amount, limit });
    }
    Ok(())
}

/// Whether `amount` is strictly above the confirmation threshold.
pub fn confirmation_required(amount: i64, threshold: i64) -> bool {
    amount > threshold
}

/// Human-readable confirmation prompt for a large transaction.
pub fn confirmation_message(amount: i64, denom: &str, recipient: &str) -> String {
    format!(
        "Please confirm transaction:\n  Amount: {} {denom}\n  Recipient: {recipient}\n\n\
         This transaction exceeds the confirmation threshold.",
        group_thousands(amount)
    )
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
