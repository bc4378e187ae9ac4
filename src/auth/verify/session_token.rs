//! Bearer session tokens issued by the embedded admin.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::oauth::OAuthError;
use crate::config::{AppConfig, ShopDomain};

/// Leeway for `exp` and `nbf`, in seconds.
const LEEWAY_SECS: u64 = 10;

/// Claims of an HS256 session token signed with the app secret.
///
/// Only the claims the verifier needs are decoded. The token identifies a
/// shop through `dest`; it does not replace the stored access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionTokenClaims {
    /// Issuer, `https://<shop>/admin`.
    pub iss: String,
    /// Destination shop URL, `https://<shop>`.
    pub dest: String,
    /// Audience; must equal the API key.
    pub aud: String,
    /// Staff member id for admin tokens.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry (Unix seconds).
    pub exp: i64,
    /// Not-before (Unix seconds).
    pub nbf: i64,
}

impl SessionTokenClaims {
    /// Decodes and verifies a session token, trying the primary secret first
    /// and then the old secret.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidJwt`] if no configured secret verifies the
    /// signature, a time claim is out of range, or `aud` is not the API key.
    pub fn decode(token: &str, config: &AppConfig) -> Result<Self, OAuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.validate_aud = false;

        let mut last_error = None;
        for secret in config.secrets() {
            let key = DecodingKey::from_secret(secret.as_ref().as_bytes());
            match decode::<Self>(token, &key, &validation) {
                Ok(data) => {
                    if data.claims.aud != config.api_key().as_ref() {
                        return Err(OAuthError::InvalidJwt {
                            reason: "audience does not match the API key".to_string(),
                        });
                    }
                    return Ok(data.claims);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(OAuthError::InvalidJwt {
            reason: last_error.map_or_else(|| "no secret configured".to_string(), |e| e.to_string()),
        })
    }

    /// Returns the shop named by `dest`, validated against the platform domain.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidShop`] if `dest` is not a valid shop URL.
    pub fn shop(&self, config: &AppConfig) -> Result<ShopDomain, OAuthError> {
        let host = self.dest.strip_prefix("https://").unwrap_or(&self.dest);
        Ok(config.parse_shop(host)?)
    }

    /// Returns the staff member id when the token was issued by the admin
    /// and `sub` is numeric.
    #[must_use]
    pub fn user_id(&self) -> Option<u64> {
        if !self.iss.ends_with("/admin") {
            return None;
        }
        self.sub.as_deref().and_then(|sub| sub.parse().ok())
    }
}
