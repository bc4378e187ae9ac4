//! Mandatory compliance webhooks.
//!
//! The platform delivers three data-protection topics to every app:
//! `customers/data_request`, `customers/redact` and `shop/redact`. This app
//! keeps no customer data, so handling them means verifying the signature
//! and acknowledging with `200`. A bad signature answers `401`.
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::auth::oauth::hmac::compute_signature_base64;
//! use vat_exempt::webhooks::{verify_webhook, ComplianceTopic, WebhookRequest};
//! use vat_exempt::{ApiKey, ApiSecretKey, AppConfig};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("secret").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let body = br#"{"shop_domain":"demo.myshopify.com"}"#;
//! let request = WebhookRequest::new(body.to_vec(), compute_signature_base64(body, "secret"))
//!     .with_topic("shop/redact");
//!
//! let context = verify_webhook(&config, &request).unwrap();
//! assert_eq!(context.topic, ComplianceTopic::ShopRedact);
//! ```

mod errors;
mod topic;
mod verification;

pub use errors::WebhookError;
pub use topic::ComplianceTopic;
pub use verification::{
    verify_hmac, verify_webhook, WebhookContext, WebhookRequest, HEADER_HMAC,
    HEADER_SHOP_DOMAIN, HEADER_TOPIC, HEADER_WEBHOOK_ID,
};
