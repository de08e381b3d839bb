//! Signed-cookie session store.
//!
//! The cookie value is the encoded session payload, signed with HMAC-SHA256 by
//! the `cookie` crate's signed jar. Nothing is kept server side, so a cookie
//! stays valid until the expiry embedded in its payload.

use ::cookie::{
    time::{Duration as CookieDuration, OffsetDateTime},
    Cookie, CookieJar, Key, SameSite,
};
use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::time::Duration;

use super::{codec, MaxAge, Session, SessionStore};
use crate::auth::keys::registry;
use crate::error::StoreError;

/// Attributes of the session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// Browser-side lifetime of the cookie. Session validity is decided by the
    /// expiry inside the payload, not by this.
    pub max_age: Duration,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Generate a random 64-byte signing key.
pub fn generate_key() -> Key {
    let mut bytes = [0u8; 64];
    rand::fill(&mut bytes);
    Key::from(&bytes[..])
}

/// Base64 form of a key, as accepted by `AUTH_COOKIE_KEY`.
pub fn encode_key(key: &Key) -> String {
    general_purpose::STANDARD.encode(key.master())
}

/// Return the verified value of the signed cookie `name`, if any.
pub(crate) fn read_signed(key: &Key, request: &HeaderMap, name: &str) -> Option<String> {
    let mut jar = CookieJar::new();
    for value in request.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for cookie in Cookie::split_parse_encoded(value.to_owned()).flatten() {
            jar.add_original(cookie.into_owned());
        }
    }

    jar.get(name)?;
    match jar.signed(key).get(name) {
        Some(cookie) => Some(cookie.value().to_owned()),
        None => {
            tracing::debug!(cookie = %name, "discarding cookie with invalid signature");
            None
        }
    }
}

/// Sign `value` and append it to the response as a `Set-Cookie` header.
pub(crate) fn write_signed(
    key: &Key,
    config: &CookieConfig,
    name: &str,
    value: String,
    max_age: MaxAge,
    response: &mut HeaderMap,
) -> Result<(), StoreError> {
    let mut builder = Cookie::build((name.to_owned(), value))
        .path(config.path.clone())
        .secure(config.secure)
        .http_only(config.http_only)
        .same_site(config.same_site);
    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    builder = match max_age {
        MaxAge::Delete => builder
            .max_age(CookieDuration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH),
        MaxAge::StoreDefault => builder.max_age(
            CookieDuration::try_from(config.max_age).unwrap_or(CookieDuration::MAX),
        ),
    };

    let mut jar = CookieJar::new();
    jar.signed_mut(key).add(builder);
    let cookie = jar
        .get(name)
        .ok_or_else(|| StoreError::Backend(format!("signed cookie {} missing", name)))?;
    let header = HeaderValue::from_str(&cookie.encoded().to_string())
        .map_err(|e| StoreError::Backend(format!("invalid Set-Cookie value: {}", e)))?;
    response.append(header::SET_COOKIE, header);
    Ok(())
}

/// Session store keeping all values in a signed cookie.
#[derive(Clone)]
pub struct CookieStore {
    key: Key,
    config: CookieConfig,
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieStore")
            .field("key", &"[REDACTED]")
            .field("config", &self.config)
            .finish()
    }
}

impl CookieStore {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            config: CookieConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CookieConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CookieConfig {
        &self.config
    }
}

#[async_trait]
impl SessionStore for CookieStore {
    async fn get(&self, request: &HeaderMap, name: &str) -> Result<Session, StoreError> {
        let Some(payload) = read_signed(&self.key, request, name) else {
            return Ok(Session::new(name));
        };
        let values = codec::decode(&payload, registry())?;
        Ok(Session::loaded(name, values))
    }

    async fn save(
        &self,
        _request: &HeaderMap,
        session: &Session,
        response: &mut HeaderMap,
    ) -> Result<(), StoreError> {
        let payload = codec::encode(&session.values, registry())?;
        write_signed(
            &self.key,
            &self.config,
            session.name(),
            payload,
            session.max_age,
            response,
        )
    }
}
