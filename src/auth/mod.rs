//! Authentication: sessions, the OAuth handshake and request verification.
//!
//! # Overview
//!
//! - [`AuthScopes`]: a set of OAuth scopes with implied read scopes
//! - [`Session`]: a shop's access token and its lifecycle state
//! - [`oauth`]: the begin/callback handshake that creates sessions
//! - [`verify`]: the gate that resolves a session for protected requests
//!
//! # Session Types
//!
//! - **Offline sessions** (default): app-level tokens that don't expire,
//!   stored under `offline_<shop>`.
//! - **Online sessions**: per-user tokens with an expiry, stored under
//!   `online_<shop>`.
//!
//! # Example
//!
//! ```rust
//! use vat_exempt::{AccessMode, AuthScopes, Session, ShopDomain};
//!
//! let session = Session::new(
//!     ShopDomain::new("my-store.myshopify.com").unwrap(),
//!     "access-token",
//!     "read_products".parse::<AuthScopes>().unwrap(),
//!     AccessMode::Offline,
//!     None,
//! );
//!
//! // Offline sessions don't expire
//! assert!(!session.expired());
//! ```

pub mod oauth;
mod scopes;
pub mod session;
pub mod verify;

pub use scopes::AuthScopes;
pub use session::{AccessMode, AccessTokenResponse, Session, SessionState};
