//! The application context and its request handlers.
//!
//! [`App`] is built once at startup and holds the configuration and every
//! component. Handlers take plain request data and return an
//! [`AppResponse`], so any web framework can mount them:
//!
//! | Route                                   | Handler                          |
//! |-----------------------------------------|----------------------------------|
//! | `GET /api/auth?shop=`                   | [`App::handle_begin`]            |
//! | `GET /api/auth/callback?...`            | [`App::handle_callback`]         |
//! | `POST /api/vat/validate`                | [`App::handle_validate`]         |
//! | `GET /api/vat/settings`                 | [`App::handle_get_settings`]     |
//! | `POST /api/vat/settings`                | [`App::handle_save_settings`]    |
//! | `POST /api/vat/update-cart`             | [`App::handle_update_cart`]      |
//! | `POST /apps/proxy/validate-vat?...`     | [`App::handle_proxy_validate`]   |
//! | `POST /api/webhooks/<compliance topic>` | [`App::handle_compliance_webhook`] |
//!
//! Other protected routes call [`App::authorize`] and proceed with the
//! returned [`VerifiedRequest`].

mod response;

pub use response::AppResponse;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::oauth::{AuthHandshake, AuthQuery, OAuthError};
use crate::auth::verify::{ProtectedRequest, SessionVerifier, VerifiedRequest, MISSING_SHOP_MESSAGE};
use crate::clients::{HttpError, PlatformClient};
use crate::config::{AppConfig, Settings};
use crate::error::ConfigError;
use crate::merchant::{CartUpdate, VatSettings};
use crate::proxy::ProxySignatureVerifier;
use crate::query::QueryParams;
use crate::store::{MemoryStore, NonceStore, RedisStore, SessionStore, StoreError};
use crate::validation::{ValidationError, VatClientOptions, VatValidationClient};
use crate::webhooks::{verify_webhook, WebhookRequest};

/// Key prefix for records written to Redis.
pub const REDIS_KEY_PREFIX: &str = "vat-exempt";

/// Cookie carrying the signed session reference after a completed handshake.
pub const SESSION_COOKIE: &str = "vat_exempt_session";

/// Errors raised while assembling an [`App`].
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session store could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The platform HTTP client could not be built.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The VAT client could not be built.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Body of a VAT validation request.
#[derive(Deserialize)]
struct ValidateBody {
    #[serde(rename = "vatNumber", alias = "vat_number")]
    vat_number: String,
}

/// Application context shared by all request handlers.
///
/// Cloning is cheap; every component is reference counted.
///
/// # Example
///
/// ```rust
/// use vat_exempt::app::App;
/// use vat_exempt::validation::VatClientOptions;
/// use vat_exempt::{ApiKey, ApiSecretKey, AppConfig, HostUrl};
///
/// let config = AppConfig::builder()
///     .api_key(ApiKey::new("client-id").unwrap())
///     .api_secret_key(ApiSecretKey::new("secret").unwrap())
///     .host(HostUrl::new("https://vat.example.com").unwrap())
///     .build()
///     .unwrap();
///
/// let app = App::in_memory(config, VatClientOptions::default()).unwrap();
/// assert!(app.config().host().is_some());
/// ```
#[derive(Clone)]
pub struct App {
    config: Arc<AppConfig>,
    handshake: AuthHandshake,
    verifier: SessionVerifier,
    proxy: ProxySignatureVerifier,
    vat: VatValidationClient,
    platform: PlatformClient,
}

// Verify App is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<App>();
};

impl App {
    /// Wires an app over the given stores.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if an HTTP client cannot be built.
    pub fn new(
        config: AppConfig,
        sessions: Arc<dyn SessionStore>,
        nonces: Arc<dyn NonceStore>,
        vat_options: VatClientOptions,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let platform = PlatformClient::new(Arc::clone(&config))?;

        Ok(Self {
            handshake: AuthHandshake::new(
                Arc::clone(&config),
                nonces,
                Arc::clone(&sessions),
                platform.clone(),
            ),
            verifier: SessionVerifier::new(Arc::clone(&config), sessions, platform.clone()),
            proxy: ProxySignatureVerifier::new(Arc::clone(&config)),
            vat: VatValidationClient::new(vat_options)?,
            platform,
            config,
        })
    }

    /// Wires an app over a process-local [`MemoryStore`].
    ///
    /// Sessions do not survive a restart; use for tests and local runs.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if an HTTP client cannot be built.
    pub fn in_memory(config: AppConfig, vat_options: VatClientOptions) -> Result<Self, AppError> {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store, vat_options)
    }

    /// Builds an app from loaded settings, connecting to Redis at
    /// `settings.redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for invalid settings and
    /// [`AppError::Store`] if Redis cannot be reached. There is no fallback
    /// to an in-memory store.
    pub async fn from_settings(
        settings: Settings,
        vat_options: VatClientOptions,
    ) -> Result<Self, AppError> {
        let redis_url = settings.redis_url.clone();
        let config = settings.into_config()?;
        let store = Arc::new(RedisStore::connect(&redis_url, REDIS_KEY_PREFIX).await?);
        tracing::info!(api_version = %config.api_version(), mode = %config.access_mode(), "App configured with Redis session store");
        Self::new(config, store.clone(), store, vat_options)
    }

    /// Application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The OAuth handshake.
    #[must_use]
    pub const fn handshake(&self) -> &AuthHandshake {
        &self.handshake
    }

    /// The session verifier.
    #[must_use]
    pub const fn verifier(&self) -> &SessionVerifier {
        &self.verifier
    }

    /// The app-proxy signature verifier.
    #[must_use]
    pub const fn proxy_verifier(&self) -> &ProxySignatureVerifier {
        &self.proxy
    }

    /// The VAT validation client.
    #[must_use]
    pub const fn vat_client(&self) -> &VatValidationClient {
        &self.vat
    }

    /// The platform client used for token exchange and Admin calls.
    #[must_use]
    pub const fn platform(&self) -> &PlatformClient {
        &self.platform
    }

    /// `GET <begin-path>?shop=<shop>`: redirects to the platform's
    /// authorization page.
    pub async fn handle_begin(&self, raw_query: &str) -> AppResponse {
        let query = QueryParams::parse(raw_query);
        let Some(shop) = query.get("shop").filter(|s| !s.is_empty()) else {
            return AppResponse::text(400, MISSING_SHOP_MESSAGE);
        };

        match self.handshake.begin(shop).await {
            Ok(result) => AppResponse::redirect(result.auth_url),
            Err(e) => oauth_error_response(&e),
        }
    }

    /// `GET <callback-path>?...`: completes the handshake, sets the
    /// [`SESSION_COOKIE`] and redirects to the embedded app.
    ///
    /// A stale or replayed `state` sends the user back to the start of the
    /// handshake instead of failing.
    pub async fn handle_callback(&self, raw_query: &str) -> AppResponse {
        let query = AuthQuery::parse(raw_query);

        match self.handshake.callback(&query).await {
            Ok(session) => {
                let mut location = format!("/?shop={}", urlencoding::encode(session.shop.as_ref()));
                if let Some(host) = query.host().filter(|h| !h.is_empty()) {
                    location.push_str("&host=");
                    location.push_str(&urlencoding::encode(host));
                }
                let cookie = format!(
                    "{SESSION_COOKIE}={}; Path=/; HttpOnly; Secure; SameSite=None",
                    self.verifier.session_reference(&session)
                );
                AppResponse::redirect(location).with_header("Set-Cookie", cookie)
            }
            Err(e) if e.requires_restart() => {
                match self.config.parse_shop(query.shop().unwrap_or_default()) {
                    Ok(shop) => AppResponse::redirect(self.config.begin_url(&shop)),
                    Err(_) => oauth_error_response(&e),
                }
            }
            Err(e) => oauth_error_response(&e),
        }
    }

    /// Runs the session verifier for a protected request.
    ///
    /// # Errors
    ///
    /// Returns the response to send instead: a reauthorization redirect or
    /// challenge, or an error status.
    pub async fn authorize(&self, request: &ProtectedRequest) -> Result<VerifiedRequest, AppResponse> {
        self.verifier.verify(request).await.map_err(|e| e.to_response())
    }

    /// `POST /api/vat/validate` with `{"vatNumber": "..."}`, behind session
    /// verification.
    pub async fn handle_validate(&self, request: &ProtectedRequest, body: &str) -> AppResponse {
        let verified = match self.authorize(request).await {
            Ok(verified) => verified,
            Err(response) => return response,
        };
        tracing::debug!(shop = %verified.shop(), "VAT validation requested");
        self.validate_body(body).await
    }

    /// `GET /api/vat/settings`: the shop's settings, or the defaults if it
    /// has not saved any.
    pub async fn handle_get_settings(&self, request: &ProtectedRequest) -> AppResponse {
        let verified = match self.authorize(request).await {
            Ok(verified) => verified,
            Err(response) => return response,
        };

        match self.platform.fetch_settings(&verified.session).await {
            Ok(settings) => AppResponse::json(200, &settings.unwrap_or_default()),
            Err(e) => {
                tracing::warn!(shop = %verified.shop(), error = %e, "Settings fetch failed");
                AppResponse::error(500, "Failed to fetch settings")
            }
        }
    }

    /// `POST /api/vat/settings` with a [`VatSettings`] body. Omitted fields
    /// take their default.
    pub async fn handle_save_settings(&self, request: &ProtectedRequest, body: &str) -> AppResponse {
        let verified = match self.authorize(request).await {
            Ok(verified) => verified,
            Err(response) => return response,
        };
        let Ok(settings) = serde_json::from_str::<VatSettings>(body) else {
            return AppResponse::error(400, "Invalid settings");
        };

        match self.platform.save_settings(&verified.session, &settings).await {
            Ok(()) => {
                tracing::info!(shop = %verified.shop(), "Settings updated");
                success()
            }
            Err(e) => {
                tracing::warn!(shop = %verified.shop(), error = %e, "Settings update failed");
                AppResponse::error(500, "Failed to update settings")
            }
        }
    }

    /// `POST /api/vat/update-cart` with
    /// `{"cartToken": "...", "vatNumber": "...", "isValid": bool}`.
    pub async fn handle_update_cart(&self, request: &ProtectedRequest, body: &str) -> AppResponse {
        let verified = match self.authorize(request).await {
            Ok(verified) => verified,
            Err(response) => return response,
        };
        let update = match serde_json::from_str::<CartUpdate>(body) {
            Ok(update) if !update.cart_token.is_empty() => update,
            _ => return AppResponse::error(400, "Cart token is required"),
        };

        match self.platform.update_cart(&verified.session, &update).await {
            Ok(()) => success(),
            Err(e) => {
                tracing::warn!(shop = %verified.shop(), error = %e, "Cart update failed");
                AppResponse::error(500, "Failed to update cart")
            }
        }
    }

    /// `POST <proxy-path>?...&signature=<hex>` with `{"vatNumber": "..."}`,
    /// behind app-proxy signature verification.
    ///
    /// The body is not looked at unless the signature verifies.
    pub async fn handle_proxy_validate(&self, raw_query: &str, body: &str) -> AppResponse {
        let query = QueryParams::parse(raw_query);
        let context = match self.proxy.verify(&query) {
            Ok(context) => context,
            Err(e) => return AppResponse::error(e.status(), "Invalid signature"),
        };
        tracing::debug!(
            shop = context.shop.as_deref().unwrap_or_default(),
            "Proxy VAT validation requested"
        );
        self.validate_body(body).await
    }

    /// `POST /api/webhooks/<topic>` for the compliance topics: `200` once the
    /// signature verifies, `401` otherwise.
    pub fn handle_compliance_webhook(&self, request: &WebhookRequest) -> AppResponse {
        match verify_webhook(&self.config, request) {
            Ok(context) => {
                tracing::info!(
                    topic = %context.topic,
                    shop = context.shop_domain.as_deref().unwrap_or_default(),
                    webhook_id = context.webhook_id.as_deref().unwrap_or_default(),
                    "Compliance webhook acknowledged"
                );
                AppResponse::new(200)
            }
            Err(e) => AppResponse::error(e.status(), &e.to_string()),
        }
    }

    async fn validate_body(&self, body: &str) -> AppResponse {
        let Ok(ValidateBody { vat_number }) = serde_json::from_str::<ValidateBody>(body) else {
            return AppResponse::error(400, "VAT number is required");
        };

        match self.vat.validate(&vat_number).await {
            Ok(result) => AppResponse::json(200, &result),
            Err(e @ ValidationError::InvalidIdentifier { .. }) => {
                AppResponse::error(e.status(), &e.to_string())
            }
            Err(e @ ValidationError::ServiceUnavailable { .. }) => {
                tracing::warn!(error = %e, "VAT validation failed");
                AppResponse::error(e.status(), "Failed to validate VAT number")
            }
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn success() -> AppResponse {
    AppResponse::json(200, &serde_json::json!({ "success": true }))
}

fn oauth_error_response(error: &OAuthError) -> AppResponse {
    let status = error.status();
    match error {
        OAuthError::InvalidShop(_)
        | OAuthError::InvalidHmac
        | OAuthError::InvalidCallback { .. }
        | OAuthError::NonceMismatch => AppResponse::error(status, &error.to_string()),
        OAuthError::TokenExchangeFailed { .. } | OAuthError::Upstream(_) => {
            AppResponse::error(status, "Could not complete authorization with the platform")
        }
        OAuthError::InvalidJwt { .. } => AppResponse::error(status, "Invalid session token"),
        OAuthError::MissingHostConfig | OAuthError::Store(_) => {
            tracing::warn!(error = %error, "OAuth handshake failed");
            AppResponse::error(status, "Internal error")
        }
    }
}
