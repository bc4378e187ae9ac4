//! OAuth authorization-code handshake.
//!
//! 1. [`AuthHandshake::begin`] validates the shop, issues a single-use
//!    [`Nonce`] and returns the platform authorization URL.
//! 2. [`AuthHandshake::callback`] verifies the callback signature, consumes
//!    the nonce, exchanges the code for an access token and persists an
//!    active [`Session`](crate::Session).
//!
//! # Security
//!
//! - Callback parameters are HMAC-verified with constant-time comparison
//! - Nonces are consumed atomically, so a replayed callback cannot complete
//!   a second time
//! - The old API secret is accepted during key rotation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vat_exempt::auth::oauth::{AuthHandshake, AuthQuery};
//! use vat_exempt::clients::PlatformClient;
//! use vat_exempt::store::MemoryStore;
//! use vat_exempt::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(
//!     AppConfig::builder()
//!         .api_key(ApiKey::new("client-id")?)
//!         .api_secret_key(ApiSecretKey::new("secret")?)
//!         .host(HostUrl::new("https://vat.example.com")?)
//!         .build()?,
//! );
//! let store = Arc::new(MemoryStore::new());
//! let platform = PlatformClient::new(config.clone())?;
//! let handshake = AuthHandshake::new(config, store.clone(), store, platform);
//!
//! let begun = handshake.begin("demo.myshopify.com").await?;
//! // redirect the browser to begun.auth_url ...
//!
//! let query = AuthQuery::parse("shop=demo.myshopify.com&code=...&state=...&hmac=...");
//! let session = handshake.callback(&query).await?;
//! # Ok(())
//! # }
//! ```

mod auth_query;
mod error;
mod handshake;
pub mod hmac;
mod nonce;

pub use auth_query::AuthQuery;
pub use error::OAuthError;
pub use handshake::{AuthHandshake, BeginAuthResult};
pub use hmac::validate_hmac;
pub use nonce::Nonce;
