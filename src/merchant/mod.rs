//! Merchant-facing data the app reads and writes with a shop's access token.
//!
//! - [`VatSettings`]: storefront configuration, persisted as a JSON
//!   metafield under [`SETTINGS_NAMESPACE`]/[`SETTINGS_KEY`]
//! - [`CartUpdate`]: VAT attributes attached to a customer's cart
//!
//! Both are sent by [`PlatformClient`](crate::clients::PlatformClient) on
//! behalf of a verified session.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Metafield namespace holding the app's settings.
pub const SETTINGS_NAMESPACE: &str = "vat_exempt";

/// Metafield key holding the app's settings.
pub const SETTINGS_KEY: &str = "settings";

/// Cart attribute carrying the VAT number.
pub const CART_ATTRIBUTE_VAT_ID: &str = "VAT_ID";

/// Cart attribute carrying the validation outcome (`Yes`/`No`).
pub const CART_ATTRIBUTE_VALIDATED: &str = "VAT_Validated";

/// Per-shop storefront settings.
///
/// Missing fields take their default, so a shop that never saved settings
/// and a partial update both yield a complete value.
///
/// # Example
///
/// ```rust
/// use vat_exempt::merchant::VatSettings;
///
/// let settings: VatSettings = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
/// assert!(!settings.enabled);
/// assert_eq!(settings.vat_field_label, "VAT Number");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VatSettings {
    /// Whether the storefront VAT field is shown.
    pub enabled: bool,
    /// Label of the VAT input.
    pub vat_field_label: String,
    /// Shown when a number validates.
    pub validation_message: String,
    /// Shown when a number does not validate.
    pub error_message: String,
}

impl Default for VatSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            vat_field_label: "VAT Number".to_string(),
            validation_message: "VAT number is valid".to_string(),
            error_message: "Invalid VAT number".to_string(),
        }
    }
}

/// Request to record a VAT number on a cart.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartUpdate {
    /// Token of the cart to update.
    pub cart_token: String,
    /// The VAT number as entered.
    #[serde(default)]
    pub vat_number: String,
    /// Outcome of the preceding validation.
    #[serde(default)]
    pub is_valid: bool,
}

impl CartUpdate {
    /// Cart attributes to write.
    #[must_use]
    pub fn attributes(&self) -> Value {
        json!({
            CART_ATTRIBUTE_VAT_ID: self.vat_number,
            CART_ATTRIBUTE_VALIDATED: if self.is_valid { "Yes" } else { "No" },
        })
    }
}
