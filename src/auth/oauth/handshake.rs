//! The begin/callback exchange that turns a shop into a persisted session.

use std::fmt;
use std::sync::Arc;

use crate::auth::oauth::hmac::validate_hmac;
use crate::auth::oauth::{AuthQuery, Nonce, OAuthError};
use crate::auth::{AccessMode, Session};
use crate::clients::PlatformClient;
use crate::config::{AppConfig, ShopDomain};
use crate::store::{NonceStore, SessionStore};

/// Result of starting a handshake.
#[derive(Clone)]
pub struct BeginAuthResult {
    /// Platform authorization URL to redirect the user to.
    pub auth_url: String,
    /// Validated shop the handshake was started for.
    pub shop: ShopDomain,
    /// Nonce carried as `state` in `auth_url`.
    pub nonce: Nonce,
}

impl fmt::Debug for BeginAuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeginAuthResult")
            .field("shop", &self.shop)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

/// Drives the OAuth handshake.
///
/// ```text
/// none --begin--> pending --callback--> active
///   \                 \
///    `--invalid shop   `--nonce mismatch / exchange failure--> rejected
/// ```
///
/// `begin` validates the shop, issues a nonce and returns the authorization
/// URL. `callback` verifies the platform's signature, consumes the nonce
/// exactly once, exchanges the code for a token and persists an active
/// [`Session`]. No session is written on any failure path.
#[derive(Clone)]
pub struct AuthHandshake {
    config: Arc<AppConfig>,
    nonces: Arc<dyn NonceStore>,
    sessions: Arc<dyn SessionStore>,
    platform: PlatformClient,
}

impl AuthHandshake {
    /// Creates a handshake over the given stores and platform client.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        nonces: Arc<dyn NonceStore>,
        sessions: Arc<dyn SessionStore>,
        platform: PlatformClient,
    ) -> Self {
        Self {
            config,
            nonces,
            sessions,
            platform,
        }
    }

    /// Starts a handshake for `raw_shop`.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::InvalidShop`] if the shop does not match the grammar
    /// - [`OAuthError::MissingHostConfig`] if no public host is configured
    /// - [`OAuthError::Store`] if the nonce cannot be persisted
    ///
    /// The first two fail before any nonce is issued.
    pub async fn begin(&self, raw_shop: &str) -> Result<BeginAuthResult, OAuthError> {
        let shop = self.config.parse_shop(raw_shop)?;
        let host = self.config.host().ok_or(OAuthError::MissingHostConfig)?;
        let redirect_uri = host.join(self.config.callback_path());

        let nonce = self.nonces.issue(&shop, self.config.nonce_ttl()).await?;

        let mut params = vec![
            ("client_id", self.config.api_key().as_ref().to_string()),
            ("scope", self.config.scopes().to_string()),
            ("redirect_uri", redirect_uri),
            ("state", nonce.as_ref().to_string()),
        ];
        if self.config.access_mode() == AccessMode::Online {
            params.push(("grant_options[]", "per-user".to_string()));
        }

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let auth_url = format!(
            "{}/admin/oauth/authorize?{query}",
            self.config.shop_base_url(&shop)
        );

        tracing::info!(shop = %shop, mode = %self.config.access_mode(), "OAuth handshake started");

        Ok(BeginAuthResult {
            auth_url,
            shop,
            nonce,
        })
    }

    /// Completes a handshake from the platform's callback redirect.
    ///
    /// Steps, in order: shop validation, HMAC verification, code presence,
    /// nonce consumption, token exchange, session persistence. The nonce is
    /// consumed before the exchange, so a failed exchange requires a new
    /// `begin`.
    ///
    /// # Errors
    ///
    /// - [`OAuthError::InvalidShop`], [`OAuthError::InvalidHmac`],
    ///   [`OAuthError::InvalidCallback`] for malformed or forged callbacks
    /// - [`OAuthError::NonceMismatch`] if the nonce is unknown, expired,
    ///   already used, or bound to a different shop
    /// - [`OAuthError::TokenExchangeFailed`] / [`OAuthError::Upstream`] if
    ///   the exchange fails
    /// - [`OAuthError::Store`] if either store fails
    pub async fn callback(&self, query: &AuthQuery) -> Result<Session, OAuthError> {
        let shop = self.config.parse_shop(query.shop().unwrap_or_default())?;

        if !validate_hmac(query, &self.config) {
            tracing::warn!(shop = %shop, "OAuth callback rejected: invalid HMAC");
            return Err(OAuthError::InvalidHmac);
        }

        let code = query
            .code()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| OAuthError::InvalidCallback {
                reason: "missing authorization code".to_string(),
            })?;

        let state = query.state().unwrap_or_default();
        let bound_shop = if state.is_empty() {
            None
        } else {
            self.nonces.consume(state).await?
        };
        if bound_shop.as_ref() != Some(&shop) {
            tracing::warn!(shop = %shop, "OAuth callback rejected: nonce missing, expired or reused");
            return Err(OAuthError::NonceMismatch);
        }

        let token = self.platform.exchange_code(&shop, code).await.map_err(|e| {
            tracing::warn!(shop = %shop, error = %e, "Token exchange failed");
            OAuthError::from(e)
        })?;

        let session =
            Session::from_access_token_response(shop, self.config.access_mode(), &token).map_err(
                |e| OAuthError::TokenExchangeFailed {
                    status: 200,
                    message: e.to_string(),
                },
            )?;
        self.sessions.put(&session).await?;

        tracing::info!(
            shop = %session.shop,
            session_id = %session.id,
            scopes = %session.scopes,
            "OAuth handshake completed"
        );
        Ok(session)
    }
}

impl fmt::Debug for AuthHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandshake")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
