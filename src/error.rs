//! Configuration and validation error types.
//!
//! This module contains the error type used by every validated newtype and
//! by the configuration builder.
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. A malformed shop domain is reported here as well,
//! because the shop grammar is enforced by [`ShopDomain`](crate::ShopDomain)
//! on construction.
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::{ApiKey, ConfigError};
//!
//! let result = ApiKey::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
//! ```

use thiserror::Error;

/// Errors that can occur while building configuration or validating input
/// values such as shop domains.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// API key cannot be empty.
    #[error("API key cannot be empty. Please provide a valid Shopify API key.")]
    EmptyApiKey,

    /// API secret key cannot be empty.
    #[error("API secret key cannot be empty. Please provide a valid Shopify API secret key.")]
    EmptyApiSecretKey,

    /// Shop domain does not match the shop grammar.
    #[error("Invalid shop domain '{domain}'. Expected format: 'shop-name.{platform_domain}'.")]
    InvalidShopDomain {
        /// The invalid domain that was provided.
        domain: String,
        /// The platform suffix the domain was checked against.
        platform_domain: String,
    },

    /// Platform domain suffix is invalid.
    #[error("Invalid platform domain '{domain}'. Expected a bare host suffix such as 'myshopify.com'.")]
    InvalidPlatformDomain {
        /// The invalid suffix that was provided.
        domain: String,
    },

    /// API version is invalid.
    #[error("Invalid API version '{version}'. Expected format: 'YYYY-MM' (e.g., '2025-10') or 'unstable'.")]
    InvalidApiVersion {
        /// The invalid version string that was provided.
        version: String,
    },

    /// Scopes are invalid.
    #[error("Invalid scopes: {reason}")]
    InvalidScopes {
        /// The reason the scopes are invalid.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// Host URL is invalid.
    #[error("Invalid host URL '{url}'. Please provide a valid URL with scheme (e.g., 'https://myapp.example.com').")]
    InvalidHostUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A token lifetime cannot be represented as an expiry time.
    #[error("Invalid token lifetime of {seconds} seconds.")]
    InvalidTokenLifetime {
        /// The lifetime that was provided.
        seconds: i64,
    },

    /// Settings could not be loaded from the environment or file.
    #[error("Failed to load settings: {reason}")]
    Load {
        /// What went wrong while loading.
        reason: String,
    },
}
