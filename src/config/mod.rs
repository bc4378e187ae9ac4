//! Configuration types for the app's trust layer.
//!
//! # Overview
//!
//! - [`AppConfig`]: all settings the handshake, verifier and proxy need
//! - [`AppConfigBuilder`]: fluent builder for [`AppConfig`]
//! - [`ApiKey`], [`ApiSecretKey`], [`ShopDomain`], [`PlatformDomain`],
//!   [`HostUrl`]: validated newtypes
//! - [`ApiVersion`]: Admin API version for the liveness query
//! - [`Settings`]: environment/file loading that produces an [`AppConfig`]
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::{AppConfig, ApiKey, ApiSecretKey, HostUrl};
//!
//! let config = AppConfig::builder()
//!     .api_key(ApiKey::new("my-api-key").unwrap())
//!     .api_secret_key(ApiSecretKey::new("my-secret").unwrap())
//!     .host(HostUrl::new("https://vat-exempt.example.com").unwrap())
//!     .scopes("read_products,write_orders".parse().unwrap())
//!     .build()
//!     .unwrap();
//!
//! let shop = config.parse_shop("demo.myshopify.com").unwrap();
//! assert_eq!(config.begin_url(&shop), "/api/auth?shop=demo.myshopify.com");
//! ```

mod newtypes;
mod settings;
mod version;

pub use newtypes::{ApiKey, ApiSecretKey, HostUrl, PlatformDomain, ShopDomain};
pub use settings::Settings;
pub use version::ApiVersion;

use std::time::Duration;

use crate::auth::{AccessMode, AuthScopes};
use crate::error::ConfigError;

/// Default path that starts the OAuth handshake.
pub const DEFAULT_BEGIN_PATH: &str = "/api/auth";

/// Default path the platform redirects back to.
pub const DEFAULT_CALLBACK_PATH: &str = "/api/auth/callback";

/// Default lifetime of a handshake nonce.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(600);

/// Default timeout for outbound platform calls (token exchange, liveness).
pub const DEFAULT_PLATFORM_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the app's trust layer.
///
/// There is no global context: an `AppConfig` is built once and handed to
/// every component that needs it (usually inside an `Arc`).
///
/// # Key Rotation
///
/// `old_api_secret_key` is tried whenever verification with the primary
/// secret fails: OAuth callback HMACs, app-proxy signatures, webhook
/// signatures and session tokens.
#[derive(Clone, Debug)]
pub struct AppConfig {
    api_key: ApiKey,
    api_secret_key: ApiSecretKey,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: AuthScopes,
    host: Option<HostUrl>,
    api_version: ApiVersion,
    platform_domain: PlatformDomain,
    platform_base_url: Option<HostUrl>,
    access_mode: AccessMode,
    begin_path: String,
    callback_path: String,
    nonce_ttl: Duration,
    liveness_check: bool,
    platform_timeout: Duration,
    user_agent_prefix: Option<String>,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::new()
    }

    /// Returns the API key (OAuth client id).
    #[must_use]
    pub const fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Returns the API secret key.
    #[must_use]
    pub const fn api_secret_key(&self) -> &ApiSecretKey {
        &self.api_secret_key
    }

    /// Returns the old API secret key, if configured.
    #[must_use]
    pub const fn old_api_secret_key(&self) -> Option<&ApiSecretKey> {
        self.old_api_secret_key.as_ref()
    }

    /// Returns the primary secret followed by the old secret, if any.
    pub fn secrets(&self) -> impl Iterator<Item = &ApiSecretKey> {
        std::iter::once(&self.api_secret_key).chain(self.old_api_secret_key.as_ref())
    }

    /// Returns the OAuth scopes requested during the handshake.
    #[must_use]
    pub const fn scopes(&self) -> &AuthScopes {
        &self.scopes
    }

    /// Returns the app's public host URL, if configured.
    #[must_use]
    pub const fn host(&self) -> Option<&HostUrl> {
        self.host.as_ref()
    }

    /// Returns the Admin API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the platform domain every shop must belong to.
    #[must_use]
    pub const fn platform_domain(&self) -> &PlatformDomain {
        &self.platform_domain
    }

    /// Returns the base URL override for platform calls, if configured.
    #[must_use]
    pub const fn platform_base_url(&self) -> Option<&HostUrl> {
        self.platform_base_url.as_ref()
    }

    /// Returns the kind of access token requested during the handshake.
    #[must_use]
    pub const fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    /// Returns the path that starts the handshake.
    #[must_use]
    pub fn begin_path(&self) -> &str {
        &self.begin_path
    }

    /// Returns the callback path registered with the platform.
    #[must_use]
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    /// Returns the lifetime of a handshake nonce.
    #[must_use]
    pub const fn nonce_ttl(&self) -> Duration {
        self.nonce_ttl
    }

    /// Returns whether protected requests re-validate the stored credential.
    #[must_use]
    pub const fn liveness_check(&self) -> bool {
        self.liveness_check
    }

    /// Returns the timeout applied to every outbound platform call.
    #[must_use]
    pub const fn platform_timeout(&self) -> Duration {
        self.platform_timeout
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Validates a raw shop value against the configured platform domain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if the value does not match the grammar.
    pub fn parse_shop(&self, raw: &str) -> Result<ShopDomain, ConfigError> {
        ShopDomain::with_platform(raw, &self.platform_domain)
    }

    /// Returns the base URL used to reach a shop's platform endpoints.
    ///
    /// This is `https://<shop>` unless a platform base URL override is configured.
    #[must_use]
    pub fn shop_base_url(&self, shop: &ShopDomain) -> String {
        self.platform_base_url
            .as_ref()
            .map_or_else(|| format!("https://{shop}"), |base| base.as_ref().to_string())
    }

    /// Returns the app-relative URL that restarts the handshake for a shop.
    #[must_use]
    pub fn begin_url(&self, shop: &ShopDomain) -> String {
        format!(
            "{}?shop={}",
            self.begin_path,
            urlencoding::encode(shop.as_ref())
        )
    }
}

// Verify AppConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AppConfig>();
};

/// Builder for constructing [`AppConfig`] instances.
///
/// Required fields are `api_key` and `api_secret_key`.
///
/// # Defaults
///
/// - `scopes`: empty
/// - `host`: `None` (the handshake refuses to start without it)
/// - `api_version`: latest stable version
/// - `platform_domain`: `myshopify.com`
/// - `access_mode`: [`AccessMode::Offline`]
/// - `begin_path` / `callback_path`: `/api/auth` / `/api/auth/callback`
/// - `nonce_ttl`: 10 minutes
/// - `liveness_check`: `true`
/// - `platform_timeout`: 5 seconds
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    api_key: Option<ApiKey>,
    api_secret_key: Option<ApiSecretKey>,
    old_api_secret_key: Option<ApiSecretKey>,
    scopes: Option<AuthScopes>,
    host: Option<HostUrl>,
    api_version: Option<ApiVersion>,
    platform_domain: Option<PlatformDomain>,
    platform_base_url: Option<HostUrl>,
    access_mode: Option<AccessMode>,
    begin_path: Option<String>,
    callback_path: Option<String>,
    nonce_ttl: Option<Duration>,
    liveness_check: Option<bool>,
    platform_timeout: Option<Duration>,
    user_agent_prefix: Option<String>,
}

impl AppConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key (required).
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API secret key (required).
    #[must_use]
    pub fn api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.api_secret_key = Some(key);
        self
    }

    /// Sets the old API secret key for key rotation support.
    #[must_use]
    pub fn old_api_secret_key(mut self, key: ApiSecretKey) -> Self {
        self.old_api_secret_key = Some(key);
        self
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: AuthScopes) -> Self {
        self.scopes = Some(scopes);
        self
    }

    /// Sets the app's public host URL.
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the Admin API version.
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Sets the platform domain shops must belong to.
    #[must_use]
    pub fn platform_domain(mut self, domain: PlatformDomain) -> Self {
        self.platform_domain = Some(domain);
        self
    }

    /// Routes every platform call (authorize redirect, token exchange,
    /// liveness) to a fixed base URL instead of `https://<shop>`.
    ///
    /// Used for local stubs and tests.
    #[must_use]
    pub fn platform_base_url(mut self, url: HostUrl) -> Self {
        self.platform_base_url = Some(url);
        self
    }

    /// Sets the kind of access token requested during the handshake.
    #[must_use]
    pub const fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    /// Sets the path that starts the handshake.
    #[must_use]
    pub fn begin_path(mut self, path: impl Into<String>) -> Self {
        self.begin_path = Some(path.into());
        self
    }

    /// Sets the callback path registered with the platform.
    #[must_use]
    pub fn callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = Some(path.into());
        self
    }

    /// Sets the lifetime of a handshake nonce.
    #[must_use]
    pub const fn nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = Some(ttl);
        self
    }

    /// Enables or disables the liveness check on protected requests.
    #[must_use]
    pub const fn liveness_check(mut self, enabled: bool) -> Self {
        self.liveness_check = Some(enabled);
        self
    }

    /// Sets the timeout applied to outbound platform calls.
    #[must_use]
    pub const fn platform_timeout(mut self, timeout: Duration) -> Self {
        self.platform_timeout = Some(timeout);
        self
    }

    /// Sets the user agent prefix for outbound requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`AppConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `api_key` or
    /// `api_secret_key` are not set.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let api_key = self
            .api_key
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })?;
        let api_secret_key = self
            .api_secret_key
            .ok_or(ConfigError::MissingRequiredField {
                field: "api_secret_key",
            })?;

        Ok(AppConfig {
            api_key,
            api_secret_key,
            old_api_secret_key: self.old_api_secret_key,
            scopes: self.scopes.unwrap_or_default(),
            host: self.host,
            api_version: self.api_version.unwrap_or_default(),
            platform_domain: self.platform_domain.unwrap_or_default(),
            platform_base_url: self.platform_base_url,
            access_mode: self.access_mode.unwrap_or_default(),
            begin_path: self
                .begin_path
                .unwrap_or_else(|| DEFAULT_BEGIN_PATH.to_string()),
            callback_path: self
                .callback_path
                .unwrap_or_else(|| DEFAULT_CALLBACK_PATH.to_string()),
            nonce_ttl: self.nonce_ttl.unwrap_or(DEFAULT_NONCE_TTL),
            liveness_check: self.liveness_check.unwrap_or(true),
            platform_timeout: self.platform_timeout.unwrap_or(DEFAULT_PLATFORM_TIMEOUT),
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_builder() -> AppConfigBuilder {
        AppConfig::builder()
            .api_key(ApiKey::new("key").unwrap())
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
    }

    #[test]
    fn test_builder_requires_api_key() {
        let result = AppConfigBuilder::new()
            .api_secret_key(ApiSecretKey::new("secret").unwrap())
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField { field: "api_key" })
        ));
    }

    #[test]
    fn test_builder_requires_api_secret_key() {
        let result = AppConfigBuilder::new()
            .api_key(ApiKey::new("key").unwrap())
            .build();

        assert!(matches!(
            result,
            Err(ConfigError::MissingRequiredField {
                field: "api_secret_key"
            })
        ));
    }

    #[test]
    fn test_builder_provides_sensible_defaults() {
        let config = minimal_builder().build().unwrap();

        assert_eq!(config.api_version(), &ApiVersion::latest());
        assert_eq!(config.platform_domain().as_ref(), "myshopify.com");
        assert_eq!(config.access_mode(), AccessMode::Offline);
        assert_eq!(config.begin_path(), DEFAULT_BEGIN_PATH);
        assert_eq!(config.callback_path(), DEFAULT_CALLBACK_PATH);
        assert_eq!(config.nonce_ttl(), DEFAULT_NONCE_TTL);
        assert!(config.liveness_check());
        assert!(config.host().is_none());
        assert!(config.scopes().is_empty());
    }

    #[test]
    fn test_secrets_yields_old_key_after_primary() {
        let config = minimal_builder()
            .old_api_secret_key(ApiSecretKey::new("old").unwrap())
            .build()
            .unwrap();

        let secrets: Vec<&str> = config.secrets().map(AsRef::as_ref).collect();
        assert_eq!(secrets, vec!["secret", "old"]);
    }

    #[test]
    fn test_parse_shop_uses_configured_platform_domain() {
        let config = minimal_builder()
            .platform_domain(PlatformDomain::new("example-platform.com").unwrap())
            .build()
            .unwrap();

        assert!(config.parse_shop("foo.example-platform.com").is_ok());
        assert!(config.parse_shop("foo.myshopify.com").is_err());
    }

    #[test]
    fn test_shop_base_url_honors_override() {
        let shop = ShopDomain::new("demo.myshopify.com").unwrap();

        let config = minimal_builder().build().unwrap();
        assert_eq!(config.shop_base_url(&shop), "https://demo.myshopify.com");

        let config = minimal_builder()
            .platform_base_url(HostUrl::new("http://127.0.0.1:9000").unwrap())
            .build()
            .unwrap();
        assert_eq!(config.shop_base_url(&shop), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_begin_url_encodes_shop() {
        let config = minimal_builder().begin_path("/auth/begin").build().unwrap();
        let shop = ShopDomain::new("demo.myshopify.com").unwrap();
        assert_eq!(config.begin_url(&shop), "/auth/begin?shop=demo.myshopify.com");
    }

    #[test]
    fn test_config_debug_masks_secret() {
        let config = minimal_builder().build().unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("ApiSecretKey(*****)"));
        assert!(!debug.contains("\"secret\""));
    }
}
