//! Session verification in front of protected operations.
//!
//! [`SessionVerifier::verify`] resolves a session for an inbound request and
//! either returns it in a [`VerifiedRequest`] or tells the caller to go back
//! through the handshake with a [`ReauthorizeSignal`].
//!
//! # Resolution order
//!
//! 1. A `Bearer` session token in the `Authorization` header names the shop
//!    and thereby the session id `<mode>_<shop>`.
//! 2. Otherwise a signed session reference (e.g. a cookie) of the form
//!    `<id>.<hex hmac(secret, id)>` names the id. References that are
//!    unsigned or signed with an unknown secret are ignored.
//!
//! A session bound to a shop other than the requested one is never served:
//! the caller is sent to authorize the requested shop instead.

mod reauthorize;
mod session_token;

pub use reauthorize::{CallerKind, ReauthorizeSignal, HEADER_REAUTHORIZE, HEADER_REAUTHORIZE_URL};
pub use session_token::SessionTokenClaims;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::app::AppResponse;
use crate::auth::oauth::hmac::{compute_signature, signed_by_any_secret};
use crate::auth::Session;
use crate::clients::{Liveness, PlatformClient};
use crate::config::{AppConfig, ShopDomain};
use crate::error::ConfigError;
use crate::store::{SessionStore, StoreError};

/// Message returned when no shop can be determined for a request.
pub const MISSING_SHOP_MESSAGE: &str = "Could not find a shop to authenticate with. Make sure \
     the request carries a shop parameter or a valid session token.";

/// The parts of an inbound request the verifier looks at.
///
/// # Example
///
/// ```rust
/// use vat_exempt::auth::verify::{CallerKind, ProtectedRequest};
///
/// let request = ProtectedRequest::new()
///     .shop("demo.myshopify.com")
///     .authorization("Bearer eyJhbGciOi...")
///     .caller(CallerKind::Programmatic);
/// ```
#[derive(Clone, Default)]
pub struct ProtectedRequest {
    shop: Option<String>,
    authorization: Option<String>,
    session_reference: Option<String>,
    caller: CallerKind,
}

impl ProtectedRequest {
    /// Creates an empty request description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested shop (usually the `shop` query parameter).
    #[must_use]
    pub fn shop(mut self, shop: impl Into<String>) -> Self {
        self.shop = Some(shop.into());
        self
    }

    /// Sets the raw `Authorization` header value.
    #[must_use]
    pub fn authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    /// Sets a signed session reference, as issued by
    /// [`SessionVerifier::session_reference`].
    #[must_use]
    pub fn session_reference(mut self, reference: impl Into<String>) -> Self {
        self.session_reference = Some(reference.into());
        self
    }

    /// Sets how a reauthorization should be delivered.
    #[must_use]
    pub const fn caller(mut self, caller: CallerKind) -> Self {
        self.caller = caller;
        self
    }

    fn bearer_token(&self) -> Option<&str> {
        let header = self.authorization.as_deref()?.trim();
        let (scheme, token) = header.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|token| !token.is_empty())
    }
}

impl fmt::Debug for ProtectedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedRequest")
            .field("shop", &self.shop)
            .field("authorization", &self.authorization.as_ref().map(|_| "*****"))
            .field(
                "session_reference",
                &self.session_reference.as_ref().map(|_| "*****"),
            )
            .field("caller", &self.caller)
            .finish()
    }
}

/// A request that passed verification, with its resolved session.
#[derive(Clone, Debug)]
pub struct VerifiedRequest {
    /// The active session for the request's shop.
    pub session: Session,
}

impl VerifiedRequest {
    /// Shop the request is authorized for.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.session.shop
    }
}

/// Reasons a protected request cannot proceed.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// No usable session; the caller must re-run the handshake.
    #[error("Authentication required for {}", .0.shop)]
    Reauthorize(ReauthorizeSignal),

    /// No shop could be determined, so there is nothing to reauthorize.
    #[error("Could not find a shop to authenticate with")]
    MissingShop,

    /// The requested shop does not match the shop grammar.
    #[error(transparent)]
    InvalidShop(#[from] ConfigError),

    /// The session store failed; trust cannot be established.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VerifyError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Reauthorize(signal) => match signal.caller {
                CallerKind::Browser => 302,
                CallerKind::Programmatic => 403,
            },
            Self::MissingShop | Self::InvalidShop(_) => 400,
            Self::Store(_) => 500,
        }
    }

    /// Renders the error as a response. Store failures are reported without
    /// backend details.
    #[must_use]
    pub fn to_response(&self) -> AppResponse {
        match self {
            Self::Reauthorize(signal) => signal.to_response(),
            Self::MissingShop => AppResponse::text(400, MISSING_SHOP_MESSAGE),
            Self::InvalidShop(e) => AppResponse::error(400, &e.to_string()),
            Self::Store(_) => AppResponse::error(500, "Session store unavailable"),
        }
    }
}

/// Signs a session id into a reference a client may hold.
///
/// # Example
///
/// ```rust
/// use vat_exempt::auth::verify::sign_session_reference;
///
/// let reference = sign_session_reference("offline_demo.myshopify.com", "secret");
/// assert!(reference.starts_with("offline_demo.myshopify.com."));
/// ```
#[must_use]
pub fn sign_session_reference(id: &str, secret: &str) -> String {
    format!("{id}.{}", compute_signature(id, secret))
}

/// Gate in front of every protected operation.
#[derive(Clone)]
pub struct SessionVerifier {
    config: Arc<AppConfig>,
    sessions: Arc<dyn SessionStore>,
    platform: PlatformClient,
}

impl SessionVerifier {
    /// Creates a verifier over a session store and platform client.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        sessions: Arc<dyn SessionStore>,
        platform: PlatformClient,
    ) -> Self {
        Self {
            config,
            sessions,
            platform,
        }
    }

    /// Returns a signed reference to `session`, keyed by the primary secret.
    #[must_use]
    pub fn session_reference(&self, session: &Session) -> String {
        sign_session_reference(&session.id, self.config.api_secret_key().as_ref())
    }

    /// Resolves and validates the session for `request`.
    ///
    /// # Errors
    ///
    /// - [`VerifyError::Reauthorize`] when no active session exists for the
    ///   requested shop, the session belongs to another shop, or the
    ///   platform no longer honors its token
    /// - [`VerifyError::MissingShop`] when no shop can be determined
    /// - [`VerifyError::InvalidShop`] when the requested shop is malformed
    /// - [`VerifyError::Store`] when the session store fails
    pub async fn verify(&self, request: &ProtectedRequest) -> Result<VerifiedRequest, VerifyError> {
        let requested = request
            .shop
            .as_deref()
            .filter(|shop| !shop.is_empty())
            .map(|shop| self.config.parse_shop(shop))
            .transpose()?;

        let (candidate, token_shop) = self.resolve_candidate(request);
        let fallback_shop = requested.clone().or(token_shop);

        let Some(id) = candidate else {
            tracing::debug!("No session reference on protected request");
            return Err(self.reauthorize(fallback_shop, request.caller));
        };

        let Some(session) = self.sessions.get(&id).await? else {
            tracing::debug!(session_id = %id, "No stored session");
            return Err(self.reauthorize(fallback_shop, request.caller));
        };

        if let Some(requested) = requested {
            if session.shop != requested {
                tracing::warn!(
                    requested = %requested,
                    session_shop = %session.shop,
                    "Session shop does not match requested shop"
                );
                return Err(self.reauthorize(Some(requested), request.caller));
            }
        }

        if !session.is_active() {
            tracing::info!(shop = %session.shop, state = ?session.state, "Discarding inactive session");
            self.sessions.delete(&session.id).await?;
            return Err(self.reauthorize(Some(session.shop), request.caller));
        }

        if self.config.liveness_check() {
            match self.platform.check_liveness(&session).await {
                Ok(Liveness::Alive) => {}
                Ok(Liveness::Rejected { status }) => {
                    tracing::info!(shop = %session.shop, status, "Platform rejected stored token; deleting session");
                    self.sessions.delete(&session.id).await?;
                    return Err(self.reauthorize(Some(session.shop), request.caller));
                }
                Err(e) => {
                    tracing::warn!(shop = %session.shop, error = %e, "Liveness check failed");
                    return Err(self.reauthorize(Some(session.shop), request.caller));
                }
            }
        }

        Ok(VerifiedRequest { session })
    }

    /// Returns the candidate session id and, if a session token named one,
    /// its shop.
    fn resolve_candidate(&self, request: &ProtectedRequest) -> (Option<String>, Option<ShopDomain>) {
        if let Some(token) = request.bearer_token() {
            match SessionTokenClaims::decode(token, &self.config)
                .and_then(|claims| claims.shop(&self.config))
            {
                Ok(shop) => {
                    let id = Session::id_for(&shop, self.config.access_mode());
                    return (Some(id), Some(shop));
                }
                Err(e) => tracing::debug!(error = %e, "Ignoring unverifiable session token"),
            }
        }

        let id = request
            .session_reference
            .as_deref()
            .filter(|reference| !reference.is_empty())
            .and_then(|reference| self.verified_reference(reference));
        (id, None)
    }

    /// Returns the session id of a reference signed by a known secret.
    fn verified_reference(&self, reference: &str) -> Option<String> {
        let verified = reference.rsplit_once('.').filter(|(id, signature)| {
            signed_by_any_secret(&self.config, signature, |secret| {
                compute_signature(id, secret)
            })
        });
        if verified.is_none() {
            tracing::debug!("Ignoring unsigned or forged session reference");
        }
        verified.map(|(id, _)| id.to_string())
    }

    fn reauthorize(&self, shop: Option<ShopDomain>, caller: CallerKind) -> VerifyError {
        shop.map_or(VerifyError::MissingShop, |shop| {
            VerifyError::Reauthorize(ReauthorizeSignal {
                url: self.config.begin_url(&shop),
                shop,
                caller,
            })
        })
    }
}

impl fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
