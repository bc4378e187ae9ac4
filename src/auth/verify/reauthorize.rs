use serde_json::json;

use crate::app::AppResponse;
use crate::config::ShopDomain;

/// Header flagging a programmatic request whose session must be re-established.
pub const HEADER_REAUTHORIZE: &str = "X-Shopify-API-Request-Failure-Reauthorize";

/// Header carrying the URL that restarts the handshake.
pub const HEADER_REAUTHORIZE_URL: &str = "X-Shopify-API-Request-Failure-Reauthorize-Url";

/// Who issued a protected request, which decides how a reauthorization is
/// delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CallerKind {
    /// Top-level browser navigation; can follow a redirect.
    #[default]
    Browser,
    /// `fetch`/XHR from the embedded front-end or another service; cannot
    /// follow a cross-origin redirect and gets a structured challenge.
    Programmatic,
}

/// Instruction to send the caller back through the handshake for `shop`.
///
/// This is not a hard failure: it carries no internals, only the shop and
/// the app-relative URL that begins authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReauthorizeSignal {
    /// Shop the caller must authorize.
    pub shop: ShopDomain,
    /// URL that restarts the handshake, `<begin-path>?shop=<shop>`.
    pub url: String,
    /// How to deliver the signal.
    pub caller: CallerKind,
}

impl ReauthorizeSignal {
    /// Renders the signal as a response.
    ///
    /// Browser callers get `302 Location: <url>`. Programmatic callers get
    /// `403` with the reauthorize headers and a
    /// `{"reauthorize": true, "url": <url>}` body.
    #[must_use]
    pub fn to_response(&self) -> AppResponse {
        match self.caller {
            CallerKind::Browser => AppResponse::redirect(&self.url),
            CallerKind::Programmatic => AppResponse::json(
                403,
                &json!({ "reauthorize": true, "url": self.url }),
            )
            .with_header(HEADER_REAUTHORIZE, "1")
            .with_header(HEADER_REAUTHORIZE_URL, &self.url),
        }
    }
}
