//! SOAP envelopes for the VIES `checkVat` operation.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::VatIdentifier;

/// Decoded body of a `checkVat` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckVatResponse {
    /// The authority answered; `true` if the number is registered.
    Answer {
        /// Value of the `valid` element.
        valid: bool,
    },
    /// The authority returned a SOAP fault.
    Fault {
        /// Value of the `faultstring` element, e.g. `MS_UNAVAILABLE`.
        code: String,
    },
}

/// Builds the `checkVat` request envelope.
pub fn check_vat_request(identifier: &VatIdentifier) -> String {
    format!(
        concat!(
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"xmlns:tns1="urn:ec.europa.eu:taxud:vies:services:checkVat:types">"#,
            "<soap:Body><tns1:checkVat>",
            "<tns1:countryCode>{}</tns1:countryCode>",
            "<tns1:vatNumber>{}</tns1:vatNumber>",
            "</tns1:checkVat></soap:Body></soap:Envelope>"
        ),
        identifier.country_code(),
        identifier.number()
    )
}

/// Scans a response for the `valid` or `faultstring` element, ignoring
/// namespace prefixes.
///
/// Returns `None` if neither element is present or the XML is malformed.
pub fn parse_check_vat_response(xml: &str) -> Option<CheckVatResponse> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Vec<u8>> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => current = Some(start.local_name().as_ref().to_vec()),
            Ok(Event::End(_)) => current = None,
            Ok(Event::Text(text)) => {
                let Some(element) = current.as_deref() else {
                    continue;
                };
                let value = text.unescape().ok()?;
                match element {
                    b"valid" => {
                        return Some(CheckVatResponse::Answer {
                            valid: value.trim() == "true",
                        })
                    }
                    b"faultstring" => {
                        return Some(CheckVatResponse::Fault {
                            code: value.trim().to_string(),
                        })
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}
