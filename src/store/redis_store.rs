use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{NonceStore, SessionStore, StoreError};
use crate::auth::oauth::Nonce;
use crate::auth::Session;
use crate::config::ShopDomain;

/// Session and nonce store backed by Redis.
///
/// Sessions are stored as JSON under `<prefix>:session:<id>`. Nonces are
/// stored under `<prefix>:nonce:<value>` with a millisecond TTL (`PSETEX`)
/// and consumed with `GETDEL`, which removes and returns the value in a
/// single command.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    /// Opens a managed connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is malformed or the
    /// server cannot be reached.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn, prefix))
    }

    fn session_key(&self, id: &str) -> String {
        format!("{}:session:{id}", self.prefix)
    }

    fn nonce_key(&self, value: &str) -> String {
        format!("{}:nonce:{value}", self.prefix)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable {
        reason: err.to_string(),
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.session_key(id)).await.map_err(unavailable)?;

        raw.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::corrupt(id, &e)))
            .transpose()
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_string(session).map_err(|e| StoreError::corrupt(&session.id, &e))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.session_key(&session.id), json)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.session_key(id)).await.map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NonceStore for RedisStore {
    async fn issue(&self, shop: &ShopDomain, ttl: Duration) -> Result<Nonce, StoreError> {
        let nonce = Nonce::generate();
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.conn.clone();
        let _: () = conn
            .pset_ex(self.nonce_key(nonce.as_ref()), shop.as_ref(), millis)
            .await
            .map_err(unavailable)?;
        Ok(nonce)
    }

    async fn consume(&self, value: &str) -> Result<Option<ShopDomain>, StoreError> {
        let mut conn = self.conn.clone();
        let shop: Option<String> = conn
            .get_del(self.nonce_key(value))
            .await
            .map_err(unavailable)?;

        shop.map(|s| {
            ShopDomain::from_stored(&s).map_err(|e| StoreError::Corrupt {
                id: "nonce".to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
