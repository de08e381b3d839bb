//! In-process session store.
//!
//! The cookie only carries a signed random session id; values live in a map
//! owned by the store. Removing a session drops its record, so a cookie issued
//! before logout no longer resolves to anything.
//!
//! Records are kept for the store's record TTL (default five minutes), counted
//! from the last save; set it to the auth session lifetime.

use ::cookie::Key;
use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::cookie_store::{read_signed, write_signed, CookieConfig};
use super::{MaxAge, Session, SessionStore};
use crate::auth::keys::SessionKey;
use crate::error::StoreError;

/// Default lifetime of a stored record.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Record {
    values: HashMap<SessionKey, Value>,
    /// `None` when the record TTL overflows `Instant`.
    expires_at: Option<Instant>,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Session store keeping values in memory, keyed by a signed cookie id.
///
/// Clones share the same records.
#[derive(Clone)]
pub struct MemoryStore {
    key: Key,
    config: CookieConfig,
    ttl: Duration,
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("key", &"[REDACTED]")
            .field("config", &self.config)
            .field("ttl", &self.ttl)
            .field("records", &self.len())
            .finish()
    }
}

/// Random 32-byte session id, URL-safe base64.
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl MemoryStore {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            config: CookieConfig::default(),
            ttl: DEFAULT_RECORD_TTL,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_config(mut self, config: CookieConfig) -> Self {
        self.config = config;
        self
    }

    /// How long a record survives after its last save.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of stored records, expired ones included until the next save.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a record half-written, so
    // poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Record>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Record>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, request: &HeaderMap, name: &str) -> Result<Session, StoreError> {
        let Some(id) = read_signed(&self.key, request, name) else {
            return Ok(Session::new(name));
        };

        let records = self.read();
        match records.get(&id) {
            Some(record) if record.is_live(Instant::now()) => {
                Ok(Session::loaded(name, record.values.clone()).with_id(id))
            }
            _ => Ok(Session::new(name)),
        }
    }

    async fn save(
        &self,
        _request: &HeaderMap,
        session: &Session,
        response: &mut HeaderMap,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let id = {
            let mut records = self.write();
            records.retain(|_, record| record.is_live(now));

            match session.max_age {
                MaxAge::Delete => {
                    let id = session.id().unwrap_or_default().to_string();
                    records.remove(&id);
                    id
                }
                MaxAge::StoreDefault => {
                    let id = match session.id() {
                        Some(old) if session.needs_new_id() => {
                            records.remove(old);
                            new_session_id()
                        }
                        Some(id) => id.to_owned(),
                        None => new_session_id(),
                    };
                    records.insert(
                        id.clone(),
                        Record {
                            values: session.values.clone(),
                            expires_at: now.checked_add(self.ttl),
                        },
                    );
                    id
                }
            }
        };

        write_signed(
            &self.key,
            &self.config,
            session.name(),
            id,
            session.max_age,
            response,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cookie_store::generate_key;
    use axum::http::{header, HeaderValue};
    use serde_json::json;
    use std::time::Duration;

    const NAME: &str = "AuthSession";

    fn cookie_header(response: &HeaderMap) -> HeaderMap {
        let set_cookie = response.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    async fn save_new(store: &MemoryStore) -> HeaderMap {
        let mut session = store.get(&HeaderMap::new(), NAME).await.unwrap();
        session.values.insert(SessionKey::from("cart"), json!([1, 2]));
        let mut response = HeaderMap::new();
        store
            .save(&HeaderMap::new(), &session, &mut response)
            .await
            .unwrap();
        cookie_header(&response)
    }

    #[tokio::test]
    async fn test_save_then_get_roundtrip() {
        let store = MemoryStore::new(generate_key());
        let request = save_new(&store).await;
        assert_eq!(store.len(), 1);

        let session = store.get(&request, NAME).await.unwrap();
        assert!(!session.is_new());
        assert!(session.id().is_some());
        assert_eq!(session.values.get(&SessionKey::from("cart")), Some(&json!([1, 2])));
    }

    #[tokio::test]
    async fn test_resave_keeps_id() {
        let store = MemoryStore::new(generate_key());
        let request = save_new(&store).await;
        let session = store.get(&request, NAME).await.unwrap();

        let mut response = HeaderMap::new();
        store.save(&request, &session, &mut response).await.unwrap();
        assert_eq!(store.len(), 1);
        let again = store.get(&cookie_header(&response), NAME).await.unwrap();
        assert_eq!(again.id(), session.id());
    }

    #[tokio::test]
    async fn test_removal_forgets_record() {
        let store = MemoryStore::new(generate_key());
        let request = save_new(&store).await;

        let mut session = store.get(&request, NAME).await.unwrap();
        session.mark_for_removal();
        let mut response = HeaderMap::new();
        store.save(&request, &session, &mut response).await.unwrap();

        assert!(store.is_empty());
        let text = response.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(text.contains("Max-Age=0"));
        // The cookie from before the removal no longer resolves.
        assert!(store.get(&request, NAME).await.unwrap().is_new());
    }

    #[tokio::test]
    async fn test_regenerate_replaces_id() {
        let store = MemoryStore::new(generate_key());
        let request = save_new(&store).await;
        let mut session = store.get(&request, NAME).await.unwrap();
        let old_id = session.id().unwrap().to_string();

        session.regenerate();
        let mut response = HeaderMap::new();
        store.save(&request, &session, &mut response).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(&request, NAME).await.unwrap().is_new());
        let fresh = store.get(&cookie_header(&response), NAME).await.unwrap();
        assert!(!fresh.is_new());
        assert_ne!(fresh.id(), Some(old_id.as_str()));
        assert_eq!(fresh.values.get(&SessionKey::from("cart")), Some(&json!([1, 2])));
    }

    #[tokio::test]
    async fn test_expired_record_is_new_session() {
        let store = MemoryStore::new(generate_key()).with_ttl(Duration::ZERO);
        let request = save_new(&store).await;
        assert!(store.get(&request, NAME).await.unwrap().is_new());
    }

    #[tokio::test]
    async fn test_expired_records_pruned_on_save() {
        let store = MemoryStore::new(generate_key()).with_ttl(Duration::from_millis(50));
        save_new(&store).await;
        save_new(&store).await;
        assert_eq!(store.len(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        save_new(&store).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = MemoryStore::new(generate_key());
        let clone = store.clone();
        let request = save_new(&store).await;
        assert!(!clone.get(&request, NAME).await.unwrap().is_new());
    }
}
