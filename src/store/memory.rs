use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{NonceStore, SessionStore, StoreError};
use crate::auth::oauth::Nonce;
use crate::auth::Session;
use crate::config::ShopDomain;

/// In-process session and nonce store.
///
/// Clones share the same maps. Records are lost on restart, so this backend
/// suits tests and single-process development only.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use vat_exempt::store::{MemoryStore, NonceStore};
/// use vat_exempt::ShopDomain;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// let shop = ShopDomain::new("demo.myshopify.com").unwrap();
///
/// let nonce = store.issue(&shop, Duration::from_secs(60)).await.unwrap();
/// assert_eq!(store.consume(nonce.as_ref()).await.unwrap(), Some(shop));
/// assert_eq!(store.consume(nonce.as_ref()).await.unwrap(), None);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    sessions: Arc<DashMap<String, Session>>,
    nonces: Arc<DashMap<String, (ShopDomain, Instant)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    async fn put(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NonceStore for MemoryStore {
    async fn issue(&self, shop: &ShopDomain, ttl: Duration) -> Result<Nonce, StoreError> {
        let now = Instant::now();
        self.nonces.retain(|_, (_, expires)| *expires > now);

        let nonce = Nonce::generate();
        self.nonces
            .insert(nonce.as_ref().to_string(), (shop.clone(), now + ttl));
        Ok(nonce)
    }

    async fn consume(&self, value: &str) -> Result<Option<ShopDomain>, StoreError> {
        Ok(self
            .nonces
            .remove(value)
            .filter(|(_, (_, expires))| *expires > Instant::now())
            .map(|(_, (shop, _))| shop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessMode, AuthScopes};

    fn shop() -> ShopDomain {
        ShopDomain::new("demo.myshopify.com").unwrap()
    }

    #[tokio::test]
    async fn test_session_put_get_delete() {
        let store = MemoryStore::new();
        let session = Session::new(shop(), "t", AuthScopes::new(), AccessMode::Offline, None);

        store.put(&session).await.unwrap();
        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.shop, session.shop);

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
        store.delete(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_session_for_same_shop_and_mode() {
        let store = MemoryStore::new();
        let first = Session::new(shop(), "one", AuthScopes::new(), AccessMode::Offline, None);
        let second = Session::new(shop(), "two", AuthScopes::new(), AccessMode::Offline, None);

        store.put(&first).await.unwrap();
        store.put(&second).await.unwrap();

        assert_eq!(store.session_count(), 1);
        let loaded = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "two");
    }

    #[tokio::test]
    async fn test_expired_nonce_does_not_consume() {
        let store = MemoryStore::new();
        let nonce = store.issue(&shop(), Duration::ZERO).await.unwrap();
        assert!(store.consume(nonce.as_ref()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_nonce_is_absent() {
        let store = MemoryStore::new();
        assert!(store.consume("never-issued").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consume_succeeds_exactly_once() {
        let store = MemoryStore::new();
        let nonce = store.issue(&shop(), Duration::from_secs(60)).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let value = nonce.as_ref().to_string();
                tokio::spawn(async move { store.consume(&value).await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
