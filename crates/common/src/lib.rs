//! Common types shared by the runtime substrate crates
//!
//! Holds the error taxonomy every crate reports through (`ErrorCode`,
//! `Remediation`, `ErrorReport`), the configuration error type, and the
//! `Secret` wrapper used for transient plaintext credential material.

mod error;
mod remediation;
mod secret;

pub use error::{Error, Result};
pub use remediation::{ErrorCode, ErrorReport, Remediation};
pub use secret::Secret;
