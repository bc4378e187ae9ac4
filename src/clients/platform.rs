//! Outbound client for the platform's OAuth and Admin endpoints.
//!
//! Admin calls always authenticate with the access token of the
//! [`Session`] they are given, which the caller obtains from a verified
//! request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AccessTokenResponse, Session};
use crate::clients::errors::{HttpError, HttpResponseError};
use crate::config::{AppConfig, ShopDomain};
use crate::merchant::{CartUpdate, VatSettings, SETTINGS_KEY, SETTINGS_NAMESPACE};

/// Crate version, reported in the `User-Agent` header.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the shop access token on Admin API calls.
pub const HEADER_ACCESS_TOKEN: &str = "X-Shopify-Access-Token";

const LIVENESS_QUERY: &str = "{ shop { name } }";

/// Outcome of a liveness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    /// The platform accepted the stored token.
    Alive,
    /// The platform rejected the stored token (401 or 403).
    Rejected {
        /// Status returned by the platform.
        status: u16,
    },
}

#[derive(Deserialize)]
struct MetafieldList {
    #[serde(default)]
    metafields: Vec<Metafield>,
}

#[derive(Deserialize)]
struct Metafield {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// HTTP client for token exchange, liveness queries and the Admin calls
/// made on a shop's behalf.
///
/// Every request is bounded by the configured platform timeout, so a slow
/// or unreachable platform surfaces as [`HttpError::Timeout`] instead of
/// stalling the caller.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: reqwest::Client,
    config: Arc<AppConfig>,
}

// Verify PlatformClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PlatformClient>();
};

impl PlatformClient {
    /// Builds a client from the app configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Network`] if the TLS backend cannot be initialized.
    pub fn new(config: Arc<AppConfig>) -> Result<Self, HttpError> {
        let prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let user_agent = format!("{prefix}vat-exempt v{LIBRARY_VERSION}");

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.platform_timeout())
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, config })
    }

    /// Exchanges an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Response`] for a non-2xx answer,
    /// [`HttpError::Parse`] for an undecodable body, and
    /// [`HttpError::Timeout`] / [`HttpError::Network`] for transport failures.
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessTokenResponse, HttpError> {
        let url = format!("{}/admin/oauth/access_token", self.config.shop_base_url(shop));
        let body = TokenExchangeRequest {
            client_id: self.config.api_key().as_ref(),
            client_secret: self.config.api_secret_key().as_ref(),
            code,
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        response
            .json::<AccessTokenResponse>()
            .await
            .map_err(parse_error)
    }

    /// Issues a minimal authenticated Admin API query with the session's token.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and for non-2xx statuses other
    /// than 401 and 403, which are reported as [`Liveness::Rejected`].
    pub async fn check_liveness(&self, session: &Session) -> Result<Liveness, HttpError> {
        let response = self
            .client
            .post(self.admin_url(&session.shop, "graphql"))
            .header(HEADER_ACCESS_TOKEN, &session.access_token)
            .json(&json!({ "query": LIVENESS_QUERY }))
            .send()
            .await?;

        match response.status().as_u16() {
            status @ (401 | 403) => Ok(Liveness::Rejected { status }),
            _ => Self::ensure_success(response).await.map(|_| Liveness::Alive),
        }
    }

    /// Reads the shop's settings metafield. `None` when the shop has not
    /// saved any.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for transport failures, non-2xx statuses and a
    /// stored value that is not valid settings JSON.
    pub async fn fetch_settings(&self, session: &Session) -> Result<Option<VatSettings>, HttpError> {
        let response = self
            .client
            .get(self.admin_url(&session.shop, "metafields"))
            .header(HEADER_ACCESS_TOKEN, &session.access_token)
            .query(&[("namespace", SETTINGS_NAMESPACE), ("key", SETTINGS_KEY)])
            .send()
            .await?;

        let list: MetafieldList = Self::ensure_success(response)
            .await?
            .json()
            .await
            .map_err(parse_error)?;

        list.metafields
            .into_iter()
            .next()
            .and_then(|metafield| metafield.value)
            .filter(|value| !value.is_empty())
            .map(|value| {
                serde_json::from_str(&value).map_err(|e| HttpError::Parse {
                    reason: format!("stored settings: {e}"),
                })
            })
            .transpose()
    }

    /// Writes the shop's settings metafield.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for transport failures and non-2xx statuses.
    pub async fn save_settings(
        &self,
        session: &Session,
        settings: &VatSettings,
    ) -> Result<(), HttpError> {
        let value = serde_json::to_string(settings).map_err(|e| HttpError::Parse {
            reason: e.to_string(),
        })?;
        let body = json!({
            "metafield": {
                "namespace": SETTINGS_NAMESPACE,
                "key": SETTINGS_KEY,
                "value": value,
                "type": "json",
            }
        });

        let response = self
            .client
            .post(self.admin_url(&session.shop, "metafields"))
            .header(HEADER_ACCESS_TOKEN, &session.access_token)
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await.map(|_| ())
    }

    /// Records VAT attributes on a cart.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] for transport failures and non-2xx statuses.
    pub async fn update_cart(&self, session: &Session, update: &CartUpdate) -> Result<(), HttpError> {
        let body = json!({
            "token": update.cart_token,
            "attributes": update.attributes(),
        });

        let response = self
            .client
            .post(self.admin_url(&session.shop, "cart/update"))
            .header(HEADER_ACCESS_TOKEN, &session.access_token)
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await.map(|_| ())
    }

    fn admin_url(&self, shop: &ShopDomain, resource: &str) -> String {
        format!(
            "{}/admin/api/{}/{resource}.json",
            self.config.shop_base_url(shop),
            self.config.api_version()
        )
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, HttpError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let code = response.status().as_u16();
        let reference = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.unwrap_or_default();

        Err(HttpResponseError::new(code, &body, reference).into())
    }
}

fn parse_error(err: reqwest::Error) -> HttpError {
    HttpError::Parse {
        reason: err.without_url().to_string(),
    }
}
