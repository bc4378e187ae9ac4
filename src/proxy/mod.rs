//! Verification of requests forwarded by the storefront app proxy.
//!
//! The platform signs every proxied request: all query parameters except
//! `signature` are grouped by key (repeated values joined with `,`), sorted,
//! rendered as `key=value` and concatenated without a separator. The
//! lowercase hex HMAC-SHA256 of that string, keyed by the app secret, is sent
//! as `signature`.
//!
//! A verified request yields a [`ProxyContext`], which is deliberately not a
//! [`Session`](crate::Session): proxy requests come from storefront visitors
//! and never carry an access token.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vat_exempt::auth::oauth::hmac::compute_signature;
//! use vat_exempt::proxy::{canonical_string, ProxySignatureVerifier};
//! use vat_exempt::{ApiKey, ApiSecretKey, AppConfig, QueryParams};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("secret").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let query = QueryParams::parse("shop=demo.myshopify.com&timestamp=1700000000");
//! let signature = compute_signature(&canonical_string(&query), "secret");
//! let query = query.with("signature", signature);
//!
//! let verifier = ProxySignatureVerifier::new(Arc::new(config));
//! let context = verifier.verify(&query).unwrap();
//! assert_eq!(context.shop.as_deref(), Some("demo.myshopify.com"));
//! ```

use std::sync::Arc;

use thiserror::Error;

use crate::auth::oauth::hmac::{compute_signature, signed_by_any_secret};
use crate::config::AppConfig;
use crate::query::QueryParams;

/// Query parameter carrying the proxy signature.
pub const SIGNATURE_PARAM: &str = "signature";

/// Errors from proxy signature verification. Both answer 401.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ProxyError {
    /// No `signature` parameter was present.
    #[error("Missing signature")]
    MissingSignature,

    /// The signature does not match the query.
    #[error("Invalid signature")]
    InvalidSignature,
}

impl ProxyError {
    /// HTTP status class for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        401
    }
}

/// Information about a verified proxy request.
///
/// All fields are hints supplied by the platform alongside the signature.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyContext {
    /// `shop` parameter, unvalidated.
    pub shop: Option<String>,
    /// `logged_in_customer_id`, present when a customer is signed in.
    pub logged_in_customer_id: Option<String>,
    /// `path_prefix` the storefront used to reach the proxy.
    pub path_prefix: Option<String>,
}

/// Builds the string the platform signs for a proxied request.
#[must_use]
pub fn canonical_string(query: &QueryParams) -> String {
    query
        .grouped()
        .into_iter()
        .filter(|(key, _)| *key != SIGNATURE_PARAM)
        .map(|(key, values)| format!("{key}={}", values.join(",")))
        .collect()
}

/// Sessionless verifier for app-proxy requests.
#[derive(Debug, Clone)]
pub struct ProxySignatureVerifier {
    config: Arc<AppConfig>,
}

impl ProxySignatureVerifier {
    /// Creates a verifier using the secrets in `config`.
    #[must_use]
    pub const fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// Verifies the query's signature.
    ///
    /// The old secret is tried after the primary one while keys are rotated.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::MissingSignature`] or
    /// [`ProxyError::InvalidSignature`]; the request must not be processed
    /// further in either case.
    pub fn verify(&self, query: &QueryParams) -> Result<ProxyContext, ProxyError> {
        let provided = query
            .get(SIGNATURE_PARAM)
            .filter(|s| !s.is_empty())
            .ok_or(ProxyError::MissingSignature)?;

        let canonical = canonical_string(query);
        if !signed_by_any_secret(&self.config, provided, |secret| {
            compute_signature(&canonical, secret)
        }) {
            tracing::warn!(
                shop = query.get("shop").unwrap_or_default(),
                "Rejected app proxy request with invalid signature"
            );
            return Err(ProxyError::InvalidSignature);
        }

        Ok(ProxyContext {
            shop: query.get("shop").map(str::to_string),
            logged_in_customer_id: query
                .get("logged_in_customer_id")
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            path_prefix: query.get("path_prefix").map(str::to_string),
        })
    }
}
