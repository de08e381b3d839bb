//! Session storage: the per-request [`Session`] view and the [`SessionStore`] seam.
//!
//! Two stores ship with the crate:
//! - [`CookieStore`]: the whole session lives in a signed cookie.
//! - [`MemoryStore`]: the cookie carries a signed session id, values stay in process.

mod codec;
pub mod cookie_store;
pub mod memory;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

use crate::auth::keys::SessionKey;
use crate::error::StoreError;

pub use self::cookie_store::{CookieConfig, CookieStore};
pub use self::memory::MemoryStore;

/// Cookie lifetime directive honored on save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MaxAge {
    /// Use the store's configured cookie lifetime.
    #[default]
    StoreDefault,
    /// Ask the client to drop the cookie now.
    Delete,
}

/// Request-scoped session state.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    is_new: bool,
    id: Option<String>,
    regenerate: bool,
    pub values: HashMap<SessionKey, Value>,
    pub max_age: MaxAge,
}

impl Session {
    /// A fresh session: no cookie was presented, or it could not be verified.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_new: true,
            id: None,
            regenerate: false,
            values: HashMap::new(),
            max_age: MaxAge::StoreDefault,
        }
    }

    /// A session restored from a valid cookie.
    pub fn loaded(name: impl Into<String>, values: HashMap<SessionKey, Value>) -> Self {
        Self {
            is_new: false,
            values,
            ..Self::new(name)
        }
    }

    /// Attach a store-specific identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Remove the cookie on the next save.
    pub fn mark_for_removal(&mut self) {
        self.max_age = MaxAge::Delete;
    }

    /// Ask the store to drop the current id and issue a fresh one on the next
    /// save. Stores without server-side ids ignore it.
    pub fn regenerate(&mut self) {
        self.regenerate = true;
    }

    pub fn needs_new_id(&self) -> bool {
        self.regenerate
    }
}

/// Loads and persists sessions for a request/response pair.
///
/// Implementations must be safe to call concurrently from many requests.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load the session called `name` from the request headers.
    ///
    /// A missing or unverifiable cookie is a new session, not an error.
    async fn get(&self, request: &HeaderMap, name: &str) -> Result<Session, StoreError>;

    /// Persist `session`, writing any `Set-Cookie` header into `response`.
    async fn save(
        &self,
        request: &HeaderMap,
        session: &Session,
        response: &mut HeaderMap,
    ) -> Result<(), StoreError>;
}
