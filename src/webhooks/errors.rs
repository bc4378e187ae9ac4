//! Webhook verification errors.

use thiserror::Error;

/// Errors from verifying an incoming compliance webhook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// The `X-Shopify-Hmac-SHA256` header is missing or does not match the body.
    #[error("Webhook signature verification failed")]
    InvalidHmac,

    /// The signature is valid but the topic is not a compliance topic.
    #[error("Unsupported webhook topic: {topic}")]
    UnsupportedTopic {
        /// Topic as received, empty if the header was absent.
        topic: String,
    },
}

impl WebhookError {
    /// HTTP status class for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::InvalidHmac => 401,
            Self::UnsupportedTopic { .. } => 400,
        }
    }
}

// Verify WebhookError is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<WebhookError>();
};
