use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::WebhookError;

/// Mandatory data-protection webhook topics.
///
/// Every app listed on the platform must accept these; this app stores no
/// customer data, so each is verified and acknowledged without further work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceTopic {
    /// A customer asked for the data held about them.
    #[serde(rename = "customers/data_request")]
    CustomersDataRequest,
    /// A customer's data must be erased.
    #[serde(rename = "customers/redact")]
    CustomersRedact,
    /// A shop uninstalled the app 48 hours ago; its data must be erased.
    #[serde(rename = "shop/redact")]
    ShopRedact,
}

impl ComplianceTopic {
    /// All compliance topics.
    pub const ALL: [Self; 3] = [
        Self::CustomersDataRequest,
        Self::CustomersRedact,
        Self::ShopRedact,
    ];

    /// Topic as sent in the `X-Shopify-Topic` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomersDataRequest => "customers/data_request",
            Self::CustomersRedact => "customers/redact",
            Self::ShopRedact => "shop/redact",
        }
    }

    /// Route the platform delivers this topic to, `/api/webhooks/<topic>`.
    #[must_use]
    pub fn path(self) -> String {
        format!("/api/webhooks/{}", self.as_str())
    }
}

impl fmt::Display for ComplianceTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceTopic {
    type Err = WebhookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| WebhookError::UnsupportedTopic {
                topic: s.to_string(),
            })
    }
}
