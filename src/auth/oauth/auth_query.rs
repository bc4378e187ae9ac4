use crate::query::QueryParams;

/// Query parameters of the OAuth callback redirect.
///
/// The platform signs every parameter except `hmac` (and the legacy
/// `signature`), so the full parameter list is kept rather than a fixed set
/// of fields.
///
/// # Example
///
/// ```rust
/// use vat_exempt::auth::oauth::AuthQuery;
///
/// let query = AuthQuery::parse("shop=demo.myshopify.com&state=n&code=c&timestamp=1&hmac=ff");
/// assert_eq!(query.shop(), Some("demo.myshopify.com"));
/// assert_eq!(query.to_signable_string(), "code=c&shop=demo.myshopify.com&state=n&timestamp=1");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AuthQuery {
    params: QueryParams,
}

impl AuthQuery {
    /// Parses a raw callback query string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self::from(QueryParams::parse(raw))
    }

    /// Authorization code.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.params.get("code")
    }

    /// Shop the handshake was started for.
    #[must_use]
    pub fn shop(&self) -> Option<&str> {
        self.params.get("shop")
    }

    /// Nonce echoed back as `state`.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.params.get("state")
    }

    /// Base64 host of the embedded admin, if present.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.params.get("host")
    }

    /// Signature over the other parameters.
    #[must_use]
    pub fn hmac(&self) -> Option<&str> {
        self.params.get("hmac")
    }

    /// Returns the canonical string the `hmac` parameter signs: every other
    /// pair, sorted by key then value, as `key=value` joined by `&`.
    #[must_use]
    pub fn to_signable_string(&self) -> String {
        let mut pairs: Vec<(&str, &str)> = self
            .params
            .iter()
            .filter(|(key, _)| *key != "hmac" && *key != "signature")
            .collect();
        pairs.sort_unstable();
        pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl From<QueryParams> for AuthQuery {
    fn from(params: QueryParams) -> Self {
        Self { params }
    }
}

impl std::fmt::Debug for AuthQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthQuery")
            .field("shop", &self.shop())
            .field("code", &self.code().map(|_| "*****"))
            .field("state", &self.state().map(|_| "*****"))
            .field("host", &self.host())
            .finish_non_exhaustive()
    }
}
