//! Settings loading from the process environment and an optional file.
//!
//! Variable names follow the deployment conventions of the app server:
//! `SHOPIFY_API_KEY`, `SHOPIFY_API_SECRET`, `SCOPES`, `HOST`, `REDIS_URL`.
//! Environment values override file values.

use std::fmt;

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use super::{ApiKey, ApiSecretKey, ApiVersion, AppConfig, HostUrl, PlatformDomain};
use crate::auth::AccessMode;
use crate::error::ConfigError;

/// Scopes requested when `SCOPES` is not set.
pub const DEFAULT_SCOPES: &str =
    "read_products,write_products,read_orders,write_orders,read_script_tags,write_script_tags";

/// Redis URL used when `REDIS_URL` is not set.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Raw settings as read from the environment or a TOML file.
///
/// Convert into an [`AppConfig`] with [`Settings::into_config`]; that step
/// performs all validation.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// OAuth client id.
    pub shopify_api_key: String,
    /// OAuth client secret.
    pub shopify_api_secret: String,
    /// Previous client secret, accepted during key rotation.
    #[serde(default)]
    pub shopify_api_secret_old: Option<String>,
    /// Comma-separated scopes.
    pub scopes: String,
    /// Public URL of the app.
    #[serde(default)]
    pub host: Option<String>,
    /// Connection URL of the session and nonce store.
    pub redis_url: String,
    /// Platform domain suffix.
    #[serde(default)]
    pub platform_domain: Option<String>,
    /// Admin API version for the liveness query.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Request online (per-user) tokens instead of offline tokens.
    pub online_sessions: bool,
    /// Re-validate stored credentials on protected requests.
    pub liveness_check: bool,
}

impl Settings {
    /// Loads settings from the environment, layered over an optional TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read or a required
    /// value is missing.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = with_defaults(Config::builder())?;
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        builder
            .add_source(Environment::default())
            .build()
            .and_then(Config::try_deserialize)
            .map_err(load_error)
    }

    /// Parses settings from TOML text, without consulting the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the text is malformed or a required
    /// value is missing.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        with_defaults(Config::builder())?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(load_error)
    }

    /// Validates the settings and builds an [`AppConfig`].
    ///
    /// # Errors
    ///
    /// Returns the first validation error among the configured values.
    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let mut builder = AppConfig::builder()
            .api_key(ApiKey::new(self.shopify_api_key)?)
            .api_secret_key(ApiSecretKey::new(self.shopify_api_secret)?)
            .scopes(self.scopes.parse()?)
            .liveness_check(self.liveness_check);

        if let Some(old) = self.shopify_api_secret_old.filter(|s| !s.is_empty()) {
            builder = builder.old_api_secret_key(ApiSecretKey::new(old)?);
        }
        if let Some(host) = self.host.filter(|s| !s.is_empty()) {
            builder = builder.host(HostUrl::new(host)?);
        }
        if let Some(domain) = self.platform_domain {
            builder = builder.platform_domain(PlatformDomain::new(domain)?);
        }
        if let Some(version) = self.api_version {
            builder = builder.api_version(version.parse::<ApiVersion>()?);
        }
        if self.online_sessions {
            builder = builder.access_mode(AccessMode::Online);
        }

        builder.build()
    }
}

fn with_defaults(
    builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
) -> Result<::config::ConfigBuilder<::config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("scopes", DEFAULT_SCOPES)
        .and_then(|b| b.set_default("redis_url", DEFAULT_REDIS_URL))
        .and_then(|b| b.set_default("online_sessions", false))
        .and_then(|b| b.set_default("liveness_check", true))
        .map_err(load_error)
}

#[allow(clippy::needless_pass_by_value)]
fn load_error(err: ::config::ConfigError) -> ConfigError {
    ConfigError::Load {
        reason: err.to_string(),
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("shopify_api_key", &self.shopify_api_key)
            .field("shopify_api_secret", &"*****")
            .field(
                "shopify_api_secret_old",
                &self.shopify_api_secret_old.as_ref().map(|_| "*****"),
            )
            .field("scopes", &self.scopes)
            .field("host", &self.host)
            .field("redis_url", &self.redis_url)
            .field("platform_domain", &self.platform_domain)
            .field("api_version", &self.api_version)
            .field("online_sessions", &self.online_sessions)
            .field("liveness_check", &self.liveness_check)
            .finish()
    }
}
