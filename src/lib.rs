//! # vat-exempt
//!
//! Trust layer for a Shopify app that validates EU VAT numbers for
//! VAT-exempt checkouts.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`AppConfig`] and [`AppConfigBuilder`],
//!   loadable from the environment with [`Settings`]
//! - The OAuth begin/callback handshake via [`auth::oauth`]
//! - Durable sessions in Redis, or in memory for tests, via [`store`]
//! - Session verification in front of protected operations via [`auth::verify`]
//! - App-proxy signature verification for storefront requests via [`proxy`]
//! - A failure-isolated client for the VIES VAT service via [`validation`]
//! - Per-shop settings and cart attributes written with the verified
//!   session's token via [`merchant`]
//! - Compliance webhook verification via [`webhooks`]
//! - An [`App`] context that wires everything together behind
//!   framework-agnostic handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use vat_exempt::{ApiKey, ApiSecretKey, AppConfig, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("your-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("your-api-secret").unwrap())
//!     .host(HostUrl::new("https://vat.example.com").unwrap())
//!     .scopes("read_orders,write_orders".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert!(config.scopes().contains("read_orders"));
//! ```
//!
//! ## Running the App
//!
//! ```rust,no_run
//! use vat_exempt::app::App;
//! use vat_exempt::validation::VatClientOptions;
//! use vat_exempt::Settings;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(Some("vat-exempt.toml"))?;
//! let app = App::from_settings(settings, VatClientOptions::default()).await?;
//!
//! // In a route handler:
//! let response = app.handle_begin("shop=demo.myshopify.com").await;
//! assert_eq!(response.status, 302);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: configuration and stores are passed explicitly
//! - **Fail-fast validation**: all newtypes validate on construction
//! - **Thread-safe**: all shared types are `Send + Sync`
//! - **No silent fallback**: an unreachable store fails the request
//! - **Secrets stay secret**: tokens, secrets and nonces are masked in `Debug`
//!   and never appear in logs or error responses

pub mod app;
pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod merchant;
pub mod proxy;
mod query;
pub mod store;
pub mod validation;
pub mod webhooks;

// Re-export public types at crate root for convenience
pub use app::{App, AppError, AppResponse, SESSION_COOKIE};
pub use auth::{AccessMode, AuthScopes, Session, SessionState};
pub use crate::config::{
    ApiKey, ApiSecretKey, ApiVersion, AppConfig, AppConfigBuilder, HostUrl, PlatformDomain,
    Settings, ShopDomain,
};
pub use error::ConfigError;
pub use query::QueryParams;

pub use auth::oauth::{AuthHandshake, AuthQuery, BeginAuthResult, OAuthError};
pub use auth::verify::{
    sign_session_reference, CallerKind, ProtectedRequest, ReauthorizeSignal, SessionVerifier,
    VerifiedRequest, VerifyError,
};
pub use merchant::{CartUpdate, VatSettings};
pub use proxy::{ProxyContext, ProxyError, ProxySignatureVerifier};
pub use store::{MemoryStore, NonceStore, RedisStore, SessionStore, StoreError};
pub use validation::{ValidationError, ValidationResult, VatIdentifier, VatValidationClient};
pub use webhooks::{ComplianceTopic, WebhookError, WebhookRequest};
