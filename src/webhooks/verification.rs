//! Signature verification for incoming webhooks.
//!
//! The platform signs each webhook body with HMAC-SHA256 keyed by the app
//! secret and sends the base64 digest in [`HEADER_HMAC`].

use crate::auth::oauth::hmac::{compute_signature_base64, constant_time_compare, signed_by_any_secret};
use crate::config::AppConfig;
use crate::webhooks::{ComplianceTopic, WebhookError};

/// Header carrying the base64 HMAC-SHA256 of the body.
pub const HEADER_HMAC: &str = "X-Shopify-Hmac-SHA256";

/// Header carrying the topic, e.g. `shop/redact`.
pub const HEADER_TOPIC: &str = "X-Shopify-Topic";

/// Header carrying the shop's platform domain.
pub const HEADER_SHOP_DOMAIN: &str = "X-Shopify-Shop-Domain";

/// Header carrying the delivery id.
pub const HEADER_WEBHOOK_ID: &str = "X-Shopify-Webhook-Id";

/// An incoming webhook: raw body bytes plus the headers used for verification.
///
/// # Example
///
/// ```rust
/// use vat_exempt::webhooks::WebhookRequest;
///
/// let request = WebhookRequest::new(b"{}".to_vec(), "c2lnbmF0dXJl")
///     .with_topic("shop/redact")
///     .with_shop_domain("demo.myshopify.com");
///
/// assert_eq!(request.topic(), Some("shop/redact"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRequest {
    body: Vec<u8>,
    hmac_header: String,
    topic: Option<String>,
    shop_domain: Option<String>,
    webhook_id: Option<String>,
}

impl WebhookRequest {
    /// Creates a request from the raw body and the `X-Shopify-Hmac-SHA256` value.
    #[must_use]
    pub fn new(body: Vec<u8>, hmac_header: impl Into<String>) -> Self {
        Self {
            body,
            hmac_header: hmac_header.into(),
            topic: None,
            shop_domain: None,
            webhook_id: None,
        }
    }

    /// Sets the `X-Shopify-Topic` value.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the `X-Shopify-Shop-Domain` value.
    #[must_use]
    pub fn with_shop_domain(mut self, shop_domain: impl Into<String>) -> Self {
        self.shop_domain = Some(shop_domain.into());
        self
    }

    /// Sets the `X-Shopify-Webhook-Id` value.
    #[must_use]
    pub fn with_webhook_id(mut self, webhook_id: impl Into<String>) -> Self {
        self.webhook_id = Some(webhook_id.into());
        self
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Signature header value.
    #[must_use]
    pub fn hmac_header(&self) -> &str {
        &self.hmac_header
    }

    /// Topic header value.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Shop domain header value.
    #[must_use]
    pub fn shop_domain(&self) -> Option<&str> {
        self.shop_domain.as_deref()
    }

    /// Delivery id header value.
    #[must_use]
    pub fn webhook_id(&self) -> Option<&str> {
        self.webhook_id.as_deref()
    }
}

/// Metadata of a webhook whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookContext {
    /// Compliance topic of the delivery.
    pub topic: ComplianceTopic,
    /// Shop the delivery concerns, as sent by the platform.
    pub shop_domain: Option<String>,
    /// Delivery id, useful for idempotency.
    pub webhook_id: Option<String>,
}

/// Checks a base64 HMAC-SHA256 signature of `raw_body` against one secret.
///
/// ```rust
/// use vat_exempt::auth::oauth::hmac::compute_signature_base64;
/// use vat_exempt::webhooks::verify_hmac;
///
/// let signature = compute_signature_base64(b"payload", "secret");
/// assert!(verify_hmac(b"payload", &signature, "secret"));
/// assert!(!verify_hmac(b"payload!", &signature, "secret"));
/// ```
#[must_use]
pub fn verify_hmac(raw_body: &[u8], hmac_header: &str, secret: &str) -> bool {
    !hmac_header.is_empty()
        && constant_time_compare(&compute_signature_base64(raw_body, secret), hmac_header)
}

/// Verifies a compliance webhook.
///
/// The signature is checked first, with the primary secret and then the old
/// secret while keys are rotated. Only a verified request has its topic
/// inspected.
///
/// # Errors
///
/// - [`WebhookError::InvalidHmac`] if no configured secret produced the signature
/// - [`WebhookError::UnsupportedTopic`] if the topic is not a compliance topic
pub fn verify_webhook(
    config: &AppConfig,
    request: &WebhookRequest,
) -> Result<WebhookContext, WebhookError> {
    let body = request.body();
    if !signed_by_any_secret(config, request.hmac_header(), |secret| {
        compute_signature_base64(body, secret)
    }) {
        tracing::warn!(
            shop = request.shop_domain().unwrap_or_default(),
            topic = request.topic().unwrap_or_default(),
            "Rejected webhook with invalid signature"
        );
        return Err(WebhookError::InvalidHmac);
    }

    let topic = request.topic().unwrap_or_default().parse::<ComplianceTopic>()?;

    Ok(WebhookContext {
        topic,
        shop_domain: request.shop_domain().map(str::to_string),
        webhook_id: request.webhook_id().map(str::to_string),
    })
}
