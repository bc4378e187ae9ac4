//! Outbound HTTP clients.
//!
//! - [`PlatformClient`]: token exchange, liveness queries and Admin calls
//!   against the platform
//! - [`HttpError`]: errors shared by every outbound call
//!
//! The VAT authority client lives in [`crate::validation`]; it converts its
//! transport errors into its own error type at the boundary.

mod errors;
mod platform;

pub use errors::{HttpError, HttpResponseError};
pub use platform::{Liveness, PlatformClient, HEADER_ACCESS_TOKEN, LIBRARY_VERSION};
