//! VAT number validation against the external authority (VIES).
//!
//! - [`VatIdentifier`]: shape check and normalization of customer input
//! - [`VatValidationClient`]: failure-isolated SOAP client with bounded retries
//! - [`ValidationResult`]: the answer returned to API callers
//!
//! This module is independent of sessions: it is reached both from
//! session-protected admin requests and from signed storefront proxy requests.

mod client;
pub mod envelope;
mod identifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{VatClientOptions, VatValidationClient, VIES_ENDPOINT};
pub use identifier::VatIdentifier;

/// Errors from VAT validation.
///
/// Reasons describe the failure category only; they never contain response
/// bodies or transport internals beyond the error kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The identifier is malformed or was rejected as invalid input.
    #[error("Invalid VAT number: {reason}")]
    InvalidIdentifier {
        /// What was wrong with it.
        reason: String,
    },

    /// The authority could not be reached or gave no usable answer.
    #[error("VAT validation service unavailable: {reason}")]
    ServiceUnavailable {
        /// Failure category.
        reason: String,
    },
}

impl ValidationError {
    /// HTTP status class for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidIdentifier { .. } => 400,
            Self::ServiceUnavailable { .. } => 503,
        }
    }
}

// Verify ValidationError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ValidationError>();
};

/// Result of a completed VAT check.
///
/// Serialized in camelCase; the full identifier is exposed as `vatNumber`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Normalized identifier, prefix included.
    #[serde(rename = "vatNumber")]
    pub identifier: String,
    /// Jurisdiction prefix.
    pub country_code: String,
    /// National number.
    pub number: String,
    /// Whether the authority reports the number as registered.
    pub is_valid: bool,
    /// When the check completed.
    pub timestamp: DateTime<Utc>,
}
