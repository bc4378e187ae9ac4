//! Decoded query-string parameters.

use std::collections::BTreeMap;

/// Ordered list of decoded `key=value` pairs from a URL query string.
///
/// Repeated keys are kept. `+` decodes to a space and `%XX` escapes are
/// percent-decoded; a value that does not decode to UTF-8 is kept verbatim.
///
/// # Example
///
/// ```rust
/// use vat_exempt::QueryParams;
///
/// let params = QueryParams::parse("?shop=demo.myshopify.com&ids=1&ids=2&q=a+b%21");
/// assert_eq!(params.get("shop"), Some("demo.myshopify.com"));
/// assert_eq!(params.get("q"), Some("a b!"));
/// assert_eq!(params.get_all("ids"), vec!["1", "2"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a raw query string, with or without the leading `?`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let pairs = raw
            .split('&')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { pairs }
    }

    /// Builds parameters from already-decoded pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the first value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `key`, in order of appearance.
    #[must_use]
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Iterates over all pairs in order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Groups values by key, with keys in lexicographic order.
    #[must_use]
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (key, value) in self.iter() {
            grouped.entry(key).or_default().push(value);
        }
        grouped
    }

    /// Returns a copy with the pair for `key` replaced or appended.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.pairs.retain(|(k, _)| k != key);
        self.pairs.push((key.to_string(), value.into()));
        self
    }

    /// Re-encodes the pairs as a query string without the leading `?`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), |decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handles_missing_values_and_empty_segments() {
        let params = QueryParams::parse("a=1&&flag&b=");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("b"), Some(""));
        assert_eq!(params.iter().count(), 3);
    }

    #[test]
    fn test_parse_keeps_invalid_utf8_escapes_verbatim() {
        let params = QueryParams::parse("x=%FF");
        assert_eq!(params.get("x"), Some("%FF"));
    }

    #[test]
    fn test_grouped_sorts_keys_and_keeps_repeats() {
        let params = QueryParams::parse("z=1&a=2&z=3");
        let grouped = params.grouped();
        let keys: Vec<&str> = grouped.keys().copied().collect();
        assert_eq!(keys, vec!["a", "z"]);
        assert_eq!(grouped["z"], vec!["1", "3"]);
    }

    #[test]
    fn test_with_replaces_existing_value() {
        let params = QueryParams::parse("shop=a&hmac=old").with("hmac", "new");
        assert_eq!(params.get_all("hmac"), vec!["new"]);
        assert_eq!(params.to_query_string(), "shop=a&hmac=new");
    }
}
