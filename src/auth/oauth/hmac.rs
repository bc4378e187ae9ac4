//! HMAC-SHA256 signing and constant-time verification.
//!
//! Three signature formats arrive from the platform, all keyed by the app
//! secret:
//!
//! - OAuth callbacks: hex digest of the sorted query pairs joined by `&`
//! - App-proxy requests: hex digest of the sorted pairs joined by nothing
//! - Webhooks: base64 digest of the raw body
//!
//! Every comparison goes through [`constant_time_compare`], and
//! [`signed_by_any_secret`] retries with the old secret during key rotation.
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::auth::oauth::hmac::{compute_signature, compute_signature_base64};
//!
//! let signature = compute_signature("code=abc&shop=demo.myshopify.com", "secret");
//! assert_eq!(signature.len(), 64);
//! assert_eq!(compute_signature_base64(b"payload", "secret").len(), 44);
//! ```

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::auth::oauth::AuthQuery;
use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

fn digest(message: &[u8], secret: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Computes a lowercase hex HMAC-SHA256 signature.
#[must_use]
pub fn compute_signature(message: &str, secret: &str) -> String {
    digest(message.as_bytes(), secret)
        .map(hex::encode)
        .unwrap_or_default()
}

/// Computes a standard base64 HMAC-SHA256 signature over raw bytes.
#[must_use]
pub fn compute_signature_base64(message: &[u8], secret: &str) -> String {
    digest(message, secret)
        .map(|bytes| BASE64_STANDARD.encode(bytes))
        .unwrap_or_default()
}

/// Compares two strings in time independent of where they differ.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Returns `true` if `provided` equals `sign(secret)` for the primary secret
/// or, when configured, the old secret.
///
/// An empty `provided` value never verifies.
pub fn signed_by_any_secret(
    config: &AppConfig,
    provided: &str,
    sign: impl Fn(&str) -> String,
) -> bool {
    !provided.is_empty()
        && config
            .secrets()
            .any(|secret| constant_time_compare(&sign(secret.as_ref()), provided))
}

/// Validates the `hmac` parameter of an OAuth callback.
#[must_use]
pub fn validate_hmac(query: &AuthQuery, config: &AppConfig) -> bool {
    let signable = query.to_signable_string();
    signed_by_any_secret(config, query.hmac().unwrap_or_default(), |secret| {
        compute_signature(&signable, secret)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, ApiSecretKey};

    fn config(old: Option<&str>) -> AppConfig {
        let mut builder = AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("primary").unwrap());
        if let Some(old) = old {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_compute_signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = compute_signature("what do ya want for nothing?", "Jefe");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_signed_by_any_secret_falls_back_to_old_secret() {
        let sign = |secret: &str| compute_signature("msg", secret);
        let by_old = sign("retired");

        assert!(!signed_by_any_secret(&config(None), &by_old, sign));
        assert!(signed_by_any_secret(&config(Some("retired")), &by_old, sign));
    }

    #[test]
    fn test_signed_by_any_secret_rejects_empty_signature() {
        assert!(!signed_by_any_secret(&config(None), "", |_| String::new()));
    }

    #[test]
    fn test_validate_hmac_on_callback_query() {
        let unsigned = AuthQuery::parse("code=c&shop=demo.myshopify.com&state=s&timestamp=1");
        let hmac = compute_signature(&unsigned.to_signable_string(), "primary");
        let signed = AuthQuery::parse(&format!(
            "code=c&shop=demo.myshopify.com&state=s&timestamp=1&hmac={hmac}"
        ));

        assert!(validate_hmac(&signed, &config(None)));

        let tampered = AuthQuery::parse(&format!(
            "code=d&shop=demo.myshopify.com&state=s&timestamp=1&hmac={hmac}"
        ));
        assert!(!validate_hmac(&tampered, &config(None)));
    }
}
