use std::fmt;

use super::ValidationError;

/// Longest number part VIES accepts after the country code.
const MAX_NUMBER_LEN: usize = 12;

/// A syntactically valid VAT identifier: a two-letter jurisdiction prefix
/// followed by the national number.
///
/// Only the shape is checked here. Whether the number is actually registered
/// is decided by the external authority.
///
/// # Example
///
/// ```rust
/// use vat_exempt::VatIdentifier;
///
/// let id = VatIdentifier::parse(" de 123 456 789 ").unwrap();
/// assert_eq!(id.country_code(), "DE");
/// assert_eq!(id.number(), "123456789");
/// assert_eq!(id.to_string(), "DE123456789");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VatIdentifier {
    country_code: String,
    number: String,
}

impl VatIdentifier {
    /// Parses a raw identifier as typed by a customer.
    ///
    /// Whitespace anywhere in the input is removed. The first two characters
    /// must be ASCII letters and are uppercased; the rest must be 1 to 12
    /// ASCII alphanumerics.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidIdentifier`] if the input does not
    /// have that shape.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

        if compact.len() < 3 || !compact.is_ascii() {
            return Err(invalid("expected a country code followed by a number"));
        }

        let (prefix, number) = compact.split_at(2);
        if !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid("country code must be two letters"));
        }
        if number.len() > MAX_NUMBER_LEN || !number.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid("number must be 1 to 12 letters or digits"));
        }

        Ok(Self {
            country_code: prefix.to_ascii_uppercase(),
            number: number.to_ascii_uppercase(),
        })
    }

    /// Two-letter jurisdiction prefix, uppercased.
    #[must_use]
    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// National number without the prefix.
    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }
}

impl fmt::Display for VatIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.country_code, self.number)
    }
}

fn invalid(reason: &str) -> ValidationError {
    ValidationError::InvalidIdentifier {
        reason: reason.to_string(),
    }
}
