//! Session records binding a shop to a platform-issued access token.
//!
//! A [`Session`] is created by the OAuth callback, persisted by a
//! [`SessionStore`](crate::store::SessionStore) and read back by the
//! [`SessionVerifier`](crate::auth::verify::SessionVerifier) on every
//! protected request.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthScopes;
use crate::config::ShopDomain;
use crate::error::ConfigError;

/// Kind of access token a session holds.
///
/// Offline tokens belong to the app installation and do not expire; online
/// tokens belong to a staff member and carry an expiry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Per-user token with an expiry.
    Online,
    /// App-level token without an expiry.
    #[default]
    Offline,
}

impl AccessMode {
    /// Returns the lowercase name used in session ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a session record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Handshake started but no token has been issued.
    Pending,
    /// Token issued and usable.
    Active,
    /// Token lifetime has passed.
    Expired,
    /// Token was rejected by the platform.
    Revoked,
}

/// Response body of the platform's token-exchange endpoint.
#[derive(Clone, Deserialize)]
pub struct AccessTokenResponse {
    /// The issued access token.
    pub access_token: String,
    /// Comma-separated scopes actually granted.
    #[serde(default)]
    pub scope: String,
    /// Lifetime in seconds; present for online tokens.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl fmt::Debug for AccessTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResponse")
            .field("access_token", &"*****")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// A trust relationship with one shop.
///
/// The id is derived from `(shop, mode)`, so storing a new session for the
/// same pair replaces the previous record.
///
/// # Example
///
/// ```rust
/// use vat_exempt::{AccessMode, Session, ShopDomain};
///
/// let shop = ShopDomain::new("demo.myshopify.com").unwrap();
/// let session = Session::new(shop, "token", "read_orders".parse().unwrap(), AccessMode::Offline, None);
///
/// assert_eq!(session.id, "offline_demo.myshopify.com");
/// assert!(session.is_active());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable identifier, `<mode>_<shop>`.
    pub id: String,

    /// The shop this session belongs to.
    pub shop: ShopDomain,

    /// Platform access token.
    pub access_token: String,

    /// Scopes granted by the platform.
    pub scopes: AuthScopes,

    /// Online or offline.
    pub mode: AccessMode,

    /// Lifecycle state.
    pub state: SessionState,

    /// Expiry, for online tokens.
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates an active session for a shop.
    #[must_use]
    pub fn new(
        shop: ShopDomain,
        access_token: impl Into<String>,
        scopes: AuthScopes,
        mode: AccessMode,
        expires: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Self::id_for(&shop, mode),
            shop,
            access_token: access_token.into(),
            scopes,
            mode,
            state: SessionState::Active,
            expires,
        }
    }

    /// Builds an active session from a token-exchange response.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidScopes`] if the granted scope string is
    /// malformed, or [`ConfigError::InvalidTokenLifetime`] if `expires_in` is
    /// negative or too large to form an expiry.
    pub fn from_access_token_response(
        shop: ShopDomain,
        mode: AccessMode,
        response: &AccessTokenResponse,
    ) -> Result<Self, ConfigError> {
        let scopes = response.scope.parse()?;
        let expires = response
            .expires_in
            .map(|seconds| {
                Duration::try_seconds(seconds)
                    .filter(|lifetime| *lifetime >= Duration::zero())
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or(ConfigError::InvalidTokenLifetime { seconds })
            })
            .transpose()?;

        Ok(Self::new(
            shop,
            response.access_token.clone(),
            scopes,
            mode,
            expires,
        ))
    }

    /// Returns the session id for a `(shop, mode)` pair.
    #[must_use]
    pub fn id_for(shop: &ShopDomain, mode: AccessMode) -> String {
        format!("{mode}_{shop}")
    }

    /// Returns the offline session id for a shop.
    #[must_use]
    pub fn offline_id(shop: &ShopDomain) -> String {
        Self::id_for(shop, AccessMode::Offline)
    }

    /// Returns the online session id for a shop.
    #[must_use]
    pub fn online_id(shop: &ShopDomain) -> String {
        Self::id_for(shop, AccessMode::Online)
    }

    /// Returns `true` once the expiry has passed. Sessions without an
    /// expiry never expire.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if the session can authorize requests.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active && !self.access_token.is_empty() && !self.expired()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("shop", &self.shop)
            .field("access_token", &"*****")
            .field("scopes", &self.scopes)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("expires", &self.expires)
            .finish()
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
