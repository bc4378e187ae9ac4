//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated Shopify API key (the OAuth client id).
///
/// # Example
///
/// ```rust
/// use vat_exempt::ApiKey;
///
/// let key = ApiKey::new("my-api-key").unwrap();
/// assert_eq!(key.as_ref(), "my-api-key");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Creates a new validated API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated Shopify API secret key.
///
/// The secret keys every HMAC the app computes or checks: OAuth callbacks,
/// app-proxy signatures, webhook signatures and session tokens.
///
/// # Security
///
/// The `Debug` implementation masks the secret value, displaying only
/// `ApiSecretKey(*****)` instead of the actual key.
///
/// ```rust
/// use vat_exempt::ApiSecretKey;
///
/// let secret = ApiSecretKey::new("my-secret").unwrap();
/// assert_eq!(format!("{:?}", secret), "ApiSecretKey(*****)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSecretKey(String);

impl ApiSecretKey {
    /// Creates a new validated API secret key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyApiSecretKey`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiSecretKey);
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for ApiSecretKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecretKey(*****)")
    }
}

/// The host suffix every tenant domain must end with (`myshopify.com` by default).
///
/// # Example
///
/// ```rust
/// use vat_exempt::PlatformDomain;
///
/// let platform = PlatformDomain::new("Example-Platform.com").unwrap();
/// assert_eq!(platform.as_ref(), "example-platform.com");
/// assert_eq!(PlatformDomain::default().as_ref(), "myshopify.com");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlatformDomain(String);

impl PlatformDomain {
    /// The Shopify shop domain suffix.
    pub const SHOPIFY: &'static str = "myshopify.com";

    /// Creates a new validated platform domain.
    ///
    /// The value is lowercased. It must contain at least one dot, consist of
    /// ASCII letters, digits, hyphens and dots, and must not start or end
    /// with a dot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPlatformDomain`] if the suffix is malformed.
    pub fn new(domain: impl Into<String>) -> Result<Self, ConfigError> {
        let domain = domain.into().to_ascii_lowercase();

        let well_formed = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..")
            && domain
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');

        if !well_formed {
            return Err(ConfigError::InvalidPlatformDomain { domain });
        }
        Ok(Self(domain))
    }
}

impl Default for PlatformDomain {
    fn default() -> Self {
        Self(Self::SHOPIFY.to_string())
    }
}

impl AsRef<str> for PlatformDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated tenant (shop) domain.
///
/// A shop domain is accepted if and only if it matches
/// `^[a-z0-9][a-z0-9-]*\.<platform-domain>$`, compared case-insensitively.
/// The value is stored lowercased. Values carrying a scheme
/// (`https://...`), a path, surrounding whitespace, or a missing suffix are
/// rejected; there is no short-name normalization.
///
/// # Serialization
///
/// `ShopDomain` serializes to and deserializes from the full domain string:
///
/// ```rust
/// use vat_exempt::ShopDomain;
///
/// let domain = ShopDomain::new("my-store.myshopify.com").unwrap();
/// let json = serde_json::to_string(&domain).unwrap();
/// assert_eq!(json, r#""my-store.myshopify.com""#);
/// ```
///
/// # Example
///
/// ```rust
/// use vat_exempt::{PlatformDomain, ShopDomain};
///
/// let domain = ShopDomain::new("My-Store.myshopify.com").unwrap();
/// assert_eq!(domain.as_ref(), "my-store.myshopify.com");
/// assert_eq!(domain.shop_name(), "my-store");
///
/// assert!(ShopDomain::new("my-store").is_err());
/// assert!(ShopDomain::new("https://my-store.myshopify.com").is_err());
///
/// let platform = PlatformDomain::new("example-platform.com").unwrap();
/// assert!(ShopDomain::with_platform("foo.example-platform.com", &platform).is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShopDomain {
    full_domain: String,
    shop_name_end: usize,
}

impl ShopDomain {
    /// Creates a new shop domain validated against the default `myshopify.com` suffix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if the domain does not match the grammar.
    pub fn new(domain: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_platform(domain, &PlatformDomain::default())
    }

    /// Creates a new shop domain validated against the given platform suffix.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShopDomain`] if the domain does not match the grammar.
    pub fn with_platform(
        domain: impl Into<String>,
        platform: &PlatformDomain,
    ) -> Result<Self, ConfigError> {
        let domain = domain.into().to_ascii_lowercase();
        let invalid = || ConfigError::InvalidShopDomain {
            domain: domain.clone(),
            platform_domain: platform.as_ref().to_string(),
        };

        let shop_name = domain
            .strip_suffix(platform.as_ref())
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(invalid)?;

        if !Self::is_valid_shop_name(shop_name) {
            return Err(invalid());
        }

        Ok(Self {
            shop_name_end: shop_name.len(),
            full_domain: domain,
        })
    }

    /// Parses a domain that was previously validated and persisted.
    ///
    /// The first label is checked against the shop grammar and the rest is
    /// accepted as the platform suffix it was originally validated with.
    pub(crate) fn from_stored(domain: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidShopDomain {
            domain: domain.to_string(),
            platform_domain: String::new(),
        };
        let (_, suffix) = domain.split_once('.').ok_or_else(invalid)?;
        let platform = PlatformDomain::new(suffix).map_err(|_| invalid())?;
        Self::with_platform(domain, &platform)
    }

    /// Returns the shop name portion of the domain.
    ///
    /// For `my-store.myshopify.com`, this returns `my-store`.
    #[must_use]
    pub fn shop_name(&self) -> &str {
        &self.full_domain[..self.shop_name_end]
    }

    fn is_valid_shop_name(name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };

        (first.is_ascii_lowercase() || first.is_ascii_digit())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.full_domain
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_domain)
    }
}

impl Serialize for ShopDomain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.full_domain)
    }
}

impl<'de> Deserialize<'de> for ShopDomain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_stored(&s).map_err(de::Error::custom)
    }
}

/// A validated host URL for the application.
///
/// This newtype validates that the URL has a proper format with a scheme.
///
/// # Example
///
/// ```rust
/// use vat_exempt::HostUrl;
///
/// let url = HostUrl::new("https://myapp.example.com").unwrap();
/// assert_eq!(url.scheme(), "https");
/// assert_eq!(url.host_name(), Some("myapp.example.com"));
/// assert_eq!(url.join("/api/auth/callback"), "https://myapp.example.com/api/auth/callback");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostUrl {
    url: String,
    scheme_end: usize,
    host_start: usize,
    host_end: usize,
}

impl HostUrl {
    /// Creates a new validated host URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostUrl`] if the URL is invalid.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();

        let scheme_end = url
            .find("://")
            .ok_or_else(|| ConfigError::InvalidHostUrl { url: url.clone() })?;

        let scheme = &url[..scheme_end];
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidHostUrl { url: url.clone() });
        }

        let host_start = scheme_end + 3;
        if host_start >= url.len() {
            return Err(ConfigError::InvalidHostUrl { url: url.clone() });
        }

        // Host ends at port, path, query, or end of string
        let remainder = &url[host_start..];
        let host_end = remainder
            .find([':', '/', '?', '#'])
            .map_or(url.len(), |i| host_start + i);

        if host_start == host_end {
            return Err(ConfigError::InvalidHostUrl { url: url.clone() });
        }

        Ok(Self {
            url,
            scheme_end,
            host_start,
            host_end,
        })
    }

    /// Returns the URL scheme (e.g., "https").
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.url[..self.scheme_end]
    }

    /// Returns the host name portion of the URL.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        let host = &self.url[self.host_start..self.host_end];
        if host.is_empty() {
            None
        } else {
            Some(host)
        }
    }

    /// Appends an absolute path to this URL.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.url)
        } else {
            format!("{}/{path}", self.url)
        }
    }
}

impl AsRef<str> for HostUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_rejects_empty_string() {
        let result = ApiKey::new("");
        assert!(matches!(result, Err(ConfigError::EmptyApiKey)));
    }

    #[test]
    fn test_api_secret_key_masks_value_in_debug() {
        let secret = ApiSecretKey::new("super-secret-key").unwrap();
        let debug_output = format!("{secret:?}");
        assert_eq!(debug_output, "ApiSecretKey(*****)");
        assert!(!debug_output.contains("super-secret-key"));
    }

    #[test]
    fn test_shop_domain_accepts_grammar() {
        let domain = ShopDomain::new("my-store.myshopify.com").unwrap();
        assert_eq!(domain.as_ref(), "my-store.myshopify.com");
        assert_eq!(domain.shop_name(), "my-store");

        assert!(ShopDomain::new("0shop.myshopify.com").is_ok());
        assert!(ShopDomain::new("a.myshopify.com").is_ok());
        // Trailing hyphens are inside the grammar
        assert!(ShopDomain::new("my-store-.myshopify.com").is_ok());
    }

    #[test]
    fn test_shop_domain_is_case_insensitive() {
        let domain = ShopDomain::new("MY-STORE.MyShopify.COM").unwrap();
        assert_eq!(domain.as_ref(), "my-store.myshopify.com");
    }

    #[test]
    fn test_shop_domain_rejects_invalid_domains() {
        assert!(ShopDomain::new("").is_err());
        assert!(ShopDomain::new(".myshopify.com").is_err());
        assert!(ShopDomain::new("my-store").is_err());
        assert!(ShopDomain::new("my store.myshopify.com").is_err());
        assert!(ShopDomain::new("my_store.myshopify.com").is_err());
        assert!(ShopDomain::new("-my-store.myshopify.com").is_err());
        assert!(ShopDomain::new("sub.my-store.myshopify.com").is_err());
        assert!(ShopDomain::new("my-store.otherdomain.com").is_err());
        assert!(ShopDomain::new("my-storemyshopify.com").is_err());
        assert!(ShopDomain::new("https://my-store.myshopify.com").is_err());
        assert!(ShopDomain::new("my-store.myshopify.com/admin").is_err());
        assert!(ShopDomain::new(" my-store.myshopify.com").is_err());
    }

    #[test]
    fn test_shop_domain_with_custom_platform() {
        let platform = PlatformDomain::new("example-platform.com").unwrap();
        let domain = ShopDomain::with_platform("foo.example-platform.com", &platform).unwrap();
        assert_eq!(domain.shop_name(), "foo");

        assert!(ShopDomain::with_platform("foo.myshopify.com", &platform).is_err());
    }

    #[test]
    fn test_platform_domain_validation() {
        assert!(PlatformDomain::new("myshopify.com").is_ok());
        assert!(PlatformDomain::new("localhost").is_err());
        assert!(PlatformDomain::new(".myshopify.com").is_err());
        assert!(PlatformDomain::new("myshopify.com.").is_err());
        assert!(PlatformDomain::new("my shop.com").is_err());
    }

    #[test]
    fn test_host_url_validates_format() {
        let url = HostUrl::new("https://myapp.example.com").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_name(), Some("myapp.example.com"));

        let url = HostUrl::new("http://localhost:3000").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_name(), Some("localhost"));
    }

    #[test]
    fn test_host_url_rejects_invalid() {
        assert!(HostUrl::new("myapp.example.com").is_err());
        assert!(HostUrl::new("https://").is_err());
        assert!(HostUrl::new("://example.com").is_err());
    }

    #[test]
    fn test_host_url_join_strips_trailing_slash() {
        let url = HostUrl::new("https://myapp.example.com/").unwrap();
        assert_eq!(url.join("/callback"), "https://myapp.example.com/callback");
        assert_eq!(url.join("callback"), "https://myapp.example.com/callback");
    }

    #[test]
    fn test_shop_domain_round_trip_serialization() {
        let platform = PlatformDomain::new("example-platform.com").unwrap();
        let original = ShopDomain::with_platform("foo.example-platform.com", &platform).unwrap();
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, r#""foo.example-platform.com""#);
        let restored: ShopDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn test_shop_domain_deserialize_rejects_garbage() {
        let result: Result<ShopDomain, _> = serde_json::from_str(r#""not a domain""#);
        assert!(result.is_err());
    }
}
