//! Error types for outbound HTTP calls.
//!
//! - [`HttpResponseError`]: the remote answered with a non-2xx status
//! - [`HttpError`]: every way an outbound call can fail
//!
//! Transport errors from `reqwest` are wrapped here and never cross the
//! crate's public handler boundary unconverted.

use thiserror::Error;

/// A non-2xx response from a remote endpoint.
#[derive(Debug, Error)]
#[error("Request failed with status {code}: {message}")]
pub struct HttpResponseError {
    /// HTTP status code.
    pub code: u16,
    /// Response body, truncated.
    pub message: String,
    /// `X-Request-Id` of the response, if present.
    pub error_reference: Option<String>,
}

impl HttpResponseError {
    const MAX_MESSAGE_LEN: usize = 512;

    pub(crate) fn new(code: u16, body: &str, error_reference: Option<String>) -> Self {
        let message = body.chars().take(Self::MAX_MESSAGE_LEN).collect();
        Self {
            code,
            message,
            error_reference,
        }
    }
}

/// Errors from an outbound HTTP call.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Non-success HTTP response.
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// The call did not complete within its timeout.
    #[error("Request timed out")]
    Timeout,

    /// Connection, TLS or protocol failure.
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Failed to parse response: {reason}")]
    Parse {
        /// Decode error description.
        reason: String,
    },
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.without_url())
        }
    }
}

// Verify HttpError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpError>();
};
