//! Errors raised by the OAuth handshake.
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::auth::oauth::OAuthError;
//!
//! let error = OAuthError::NonceMismatch;
//! assert_eq!(error.status(), 400);
//! assert!(error.requires_restart());
//! ```

use thiserror::Error;

use crate::clients::HttpError;
use crate::error::ConfigError;
use crate::store::StoreError;

/// Errors that can occur while beginning or completing the handshake.
///
/// Messages never contain the authorization code, the nonce or any secret.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// The shop parameter is missing or does not match the shop grammar.
    #[error(transparent)]
    InvalidShop(#[from] ConfigError),

    /// The callback's `hmac` parameter does not verify.
    #[error("HMAC signature validation failed")]
    InvalidHmac,

    /// A required callback parameter is missing or empty.
    #[error("Invalid callback: {reason}")]
    InvalidCallback {
        /// What is wrong with the callback.
        reason: String,
    },

    /// The `state` nonce is unknown, expired, already consumed, or bound to
    /// another shop. The handshake must be restarted.
    #[error("OAuth state is missing, expired or already used; restart authorization")]
    NonceMismatch,

    /// The platform refused the authorization code.
    #[error("Token exchange failed with status {status}: {message}")]
    TokenExchangeFailed {
        /// Status returned by the platform.
        status: u16,
        /// Error body returned by the platform.
        message: String,
    },

    /// The token exchange could not reach the platform.
    #[error("Token exchange request failed: {0}")]
    Upstream(#[source] HttpError),

    /// No public host is configured, so no callback URL can be built.
    #[error("Host URL must be configured in AppConfig for OAuth")]
    MissingHostConfig,

    /// A session token could not be decoded or verified.
    #[error("Invalid session token: {reason}")]
    InvalidJwt {
        /// Why the token was rejected.
        reason: String,
    },

    /// The session or nonce store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OAuthError {
    /// Returns the HTTP status class for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidShop(_)
            | Self::InvalidHmac
            | Self::InvalidCallback { .. }
            | Self::NonceMismatch => 400,
            Self::InvalidJwt { .. } => 401,
            Self::TokenExchangeFailed { .. } | Self::Upstream(_) => 502,
            Self::MissingHostConfig | Self::Store(_) => 500,
        }
    }

    /// Returns `true` if the user should be sent back to the start of the
    /// handshake rather than shown an error.
    #[must_use]
    pub const fn requires_restart(&self) -> bool {
        matches!(self, Self::NonceMismatch)
    }
}

impl From<HttpError> for OAuthError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Response(response) => Self::TokenExchangeFailed {
                status: response.code,
                message: response.message,
            },
            other => Self::Upstream(other),
        }
    }
}

// Verify OAuthError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<OAuthError>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::HttpResponseError;

    #[test]
    fn test_status_classes() {
        assert_eq!(OAuthError::InvalidHmac.status(), 400);
        assert_eq!(OAuthError::MissingHostConfig.status(), 500);
        assert_eq!(
            OAuthError::Store(StoreError::Unavailable {
                reason: "down".to_string()
            })
            .status(),
            500
        );
        assert_eq!(OAuthError::from(HttpError::Timeout).status(), 502);
    }

    #[test]
    fn test_http_response_error_becomes_token_exchange_failure() {
        let err = OAuthError::from(HttpError::Response(HttpResponseError {
            code: 400,
            message: "bad code".to_string(),
            error_reference: None,
        }));

        assert!(matches!(
            err,
            OAuthError::TokenExchangeFailed { status: 400, ref message } if message == "bad code"
        ));
    }

    #[test]
    fn test_invalid_shop_keeps_validation_message() {
        let err = OAuthError::from(ConfigError::InvalidShopDomain {
            domain: "nope".to_string(),
            platform_domain: "myshopify.com".to_string(),
        });
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("nope"));
    }
}
