use std::time::Duration;

use chrono::Utc;

use super::envelope::{self, CheckVatResponse};
use super::{ValidationError, ValidationResult, VatIdentifier};
use crate::clients::LIBRARY_VERSION;

/// Public VIES `checkVat` SOAP endpoint.
pub const VIES_ENDPOINT: &str =
    "https://ec.europa.eu/taxation_customs/vies/services/checkVatService";

/// Tuning for [`VatValidationClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VatClientOptions {
    /// SOAP endpoint to POST to.
    pub endpoint: String,
    /// Timeout for a single HTTP attempt.
    pub attempt_timeout: Duration,
    /// Upper bound for the whole call, retries and waits included.
    pub deadline: Duration,
    /// Total number of attempts, at least 1.
    pub max_tries: u32,
    /// Fixed wait between attempts.
    pub retry_wait: Duration,
}

impl Default for VatClientOptions {
    fn default() -> Self {
        Self {
            endpoint: VIES_ENDPOINT.to_string(),
            attempt_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(15),
            max_tries: 3,
            retry_wait: Duration::from_millis(250),
        }
    }
}

/// Outcome of one failed attempt.
enum AttemptError {
    /// Worth another try.
    Transient(String),
    /// Final; returned to the caller as is.
    Final(ValidationError),
}

/// Client for the external VAT authority.
///
/// Each call is isolated: it runs under a per-attempt timeout and an overall
/// deadline, retries only transient failures, and reports every transport or
/// decoding problem as [`ValidationError::ServiceUnavailable`].
#[derive(Debug, Clone)]
pub struct VatValidationClient {
    client: reqwest::Client,
    options: VatClientOptions,
}

// Verify VatValidationClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<VatValidationClient>();
};

impl VatValidationClient {
    /// Builds a client with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ServiceUnavailable`] if the TLS backend
    /// cannot be initialized.
    pub fn new(options: VatClientOptions) -> Result<Self, ValidationError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .user_agent(format!("vat-exempt v{LIBRARY_VERSION}"))
            .build()
            .map_err(|e| ValidationError::ServiceUnavailable {
                reason: e.without_url().to_string(),
            })?;

        Ok(Self { client, options })
    }

    /// Returns the options the client was built with.
    #[must_use]
    pub const fn options(&self) -> &VatClientOptions {
        &self.options
    }

    /// Validates a raw VAT identifier against the authority.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidIdentifier`] if the input is malformed (no
    ///   call is made) or the authority rejects it as `INVALID_INPUT`
    /// - [`ValidationError::ServiceUnavailable`] if no answer could be
    ///   obtained within the retry budget and the deadline
    pub async fn validate(&self, raw: &str) -> Result<ValidationResult, ValidationError> {
        let identifier = VatIdentifier::parse(raw)?;
        let body = envelope::check_vat_request(&identifier);

        let outcome =
            tokio::time::timeout(self.options.deadline, self.check_with_retries(&identifier, &body))
                .await;

        match outcome {
            Ok(Ok(valid)) => {
                tracing::debug!(vat_number = %identifier, valid, "VAT number checked");
                Ok(ValidationResult {
                    identifier: identifier.to_string(),
                    country_code: identifier.country_code().to_string(),
                    number: identifier.number().to_string(),
                    is_valid: valid,
                    timestamp: Utc::now(),
                })
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::warn!(vat_number = %identifier, "VAT check exceeded its deadline");
                Err(ValidationError::ServiceUnavailable {
                    reason: "deadline exceeded".to_string(),
                })
            }
        }
    }

    async fn check_with_retries(
        &self,
        identifier: &VatIdentifier,
        body: &str,
    ) -> Result<bool, ValidationError> {
        let max_tries = self.options.max_tries.max(1);
        let mut last_reason = String::new();

        for attempt in 1..=max_tries {
            match self.attempt(body).await {
                Ok(valid) => return Ok(valid),
                Err(AttemptError::Final(err)) => return Err(err),
                Err(AttemptError::Transient(reason)) => {
                    tracing::warn!(
                        vat_number = %identifier,
                        attempt,
                        max_tries,
                        reason = %reason,
                        "VAT check failed, will retry if attempts remain"
                    );
                    last_reason = reason;
                }
            }

            if attempt < max_tries {
                tokio::time::sleep(self.options.retry_wait).await;
            }
        }

        Err(ValidationError::ServiceUnavailable {
            reason: last_reason,
        })
    }

    async fn attempt(&self, body: &str) -> Result<bool, AttemptError> {
        let response = self
            .client
            .post(&self.options.endpoint)
            .timeout(self.options.attempt_timeout)
            .header("Content-Type", "text/xml;charset=UTF-8")
            .header("SOAPAction", "")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AttemptError::Transient(transport_reason(e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(transport_reason(e)))?;

        match envelope::parse_check_vat_response(&text) {
            Some(CheckVatResponse::Answer { valid }) => Ok(valid),
            Some(CheckVatResponse::Fault { code }) => Err(classify_fault(code)),
            None if status == 429 || status >= 500 => {
                Err(AttemptError::Transient(format!("HTTP {status}")))
            }
            None => Err(AttemptError::Final(ValidationError::ServiceUnavailable {
                reason: format!("unexpected response (HTTP {status})"),
            })),
        }
    }
}

fn transport_reason(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "attempt timed out".to_string()
    } else {
        err.without_url().to_string()
    }
}

fn classify_fault(code: String) -> AttemptError {
    if code == "INVALID_INPUT" {
        return AttemptError::Final(ValidationError::InvalidIdentifier {
            reason: "rejected by the VAT authority".to_string(),
        });
    }

    let transient = matches!(
        code.as_str(),
        "MS_UNAVAILABLE" | "SERVICE_UNAVAILABLE" | "TIMEOUT"
    ) || code.ends_with("_MAX_CONCURRENT_REQ");

    if transient {
        AttemptError::Transient(code)
    } else {
        AttemptError::Final(ValidationError::ServiceUnavailable { reason: code })
    }
}
