//! Session and nonce persistence.
//!
//! # Overview
//!
//! - [`SessionStore`]: durable `get`/`put`/`delete` of [`Session`] records
//! - [`NonceStore`]: TTL-bound, single-use handshake nonces
//! - [`RedisStore`]: both traits over a Redis connection manager
//! - [`MemoryStore`]: both traits in process memory, for tests and local runs
//!
//! There is no fallback between backends. If the configured store is
//! unreachable, operations fail with [`StoreError::Unavailable`] and the
//! caller must not proceed as if trust had been established.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::time::Duration;

use thiserror::Error;

use crate::auth::oauth::Nonce;
use crate::auth::Session;
use crate::config::ShopDomain;

/// Errors raised by a session or nonce store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command.
    #[error("Session store unavailable: {reason}")]
    Unavailable {
        /// Backend error description.
        reason: String,
    },

    /// A stored record could not be decoded.
    #[error("Stored record '{id}' is corrupt: {reason}")]
    Corrupt {
        /// Key of the record.
        id: String,
        /// Decode error description.
        reason: String,
    },
}

impl StoreError {
    /// Returns the HTTP status class for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        500
    }

    pub(crate) fn corrupt(id: &str, err: &serde_json::Error) -> Self {
        // Position only; serde messages may quote stored values.
        Self::Corrupt {
            id: id.to_string(),
            reason: format!(
                "{:?} error at line {} column {}",
                err.classify(),
                err.line(),
                err.column()
            ),
        }
    }
}

/// Durable persistence for [`Session`] records.
///
/// Implementations must be safe under concurrent use; per-key atomicity is
/// sufficient.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session by id.
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Stores a session, replacing any record with the same id.
    async fn put(&self, session: &Session) -> Result<(), StoreError>;

    /// Removes a session. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Single-use, TTL-bound nonces for the OAuth handshake.
#[async_trait::async_trait]
pub trait NonceStore: Send + Sync {
    /// Generates a nonce bound to `shop`, persisted for `ttl`.
    async fn issue(&self, shop: &ShopDomain, ttl: Duration) -> Result<Nonce, StoreError>;

    /// Atomically removes a nonce and returns the shop it was bound to.
    ///
    /// Returns `None` for unknown, expired or already-consumed values. Of two
    /// concurrent calls with the same value, at most one returns `Some`.
    async fn consume(&self, value: &str) -> Result<Option<ShopDomain>, StoreError>;
}
