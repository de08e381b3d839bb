//! Namespaced session keys reserved for the auth layer.
//!
//! Application code shares the session with the auth layer, so the two reserved
//! entries (identity and expiry) live under [`SessionKey::Auth`], a variant that
//! only this crate can construct. Application entries use [`SessionKey::App`].
//!
//! Stores that serialize sessions must know the wire names of the reserved keys.
//! Those are registered once, at process start, with [`register_session_types`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::StoreError;

/// Key of a session value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Application-owned entry.
    App(String),
    /// Entry reserved for the auth layer.
    Auth(AuthKey),
}

impl SessionKey {
    /// Shorthand for an application key.
    pub fn app(name: impl Into<String>) -> Self {
        SessionKey::App(name.into())
    }
}

impl From<&str> for SessionKey {
    fn from(name: &str) -> Self {
        SessionKey::App(name.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(name: String) -> Self {
        SessionKey::App(name)
    }
}

/// Reserved auth key. Has no public constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthKey(Slot);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Identity,
    Expiry,
}

impl AuthKey {
    pub(crate) const IDENTITY: AuthKey = AuthKey(Slot::Identity);
    pub(crate) const EXPIRY: AuthKey = AuthKey(Slot::Expiry);

    const ALL: [AuthKey; 2] = [AuthKey::IDENTITY, AuthKey::EXPIRY];

    fn wire_name(self) -> &'static str {
        match self.0 {
            Slot::Identity => "~auth.identity",
            Slot::Expiry => "~auth.expiry",
        }
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Wire-name table for the reserved keys.
///
/// Lookups fail with [`StoreError::UnregisteredKey`] until [`KeyRegistry::register`]
/// has run. Registration is idempotent.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    names: OnceLock<HashMap<&'static str, AuthKey>>,
}

impl KeyRegistry {
    pub const fn new() -> Self {
        Self {
            names: OnceLock::new(),
        }
    }

    /// Register the reserved keys. Returns `true` only for the call that did the work.
    pub fn register(&self) -> bool {
        let mut first = false;
        self.names.get_or_init(|| {
            first = true;
            AuthKey::ALL.iter().map(|k| (k.wire_name(), *k)).collect()
        });
        first
    }

    pub fn is_registered(&self) -> bool {
        self.names.get().is_some()
    }

    pub(crate) fn wire_name(&self, key: AuthKey) -> Result<&'static str, StoreError> {
        match self.names.get() {
            Some(_) => Ok(key.wire_name()),
            None => Err(StoreError::UnregisteredKey(key.wire_name().to_string())),
        }
    }

    pub(crate) fn lookup(&self, wire: &str) -> Result<AuthKey, StoreError> {
        self.names
            .get()
            .and_then(|names| names.get(wire).copied())
            .ok_or_else(|| StoreError::UnregisteredKey(wire.to_string()))
    }
}

static REGISTRY: KeyRegistry = KeyRegistry::new();

/// Register the reserved session keys with the process-wide registry.
///
/// Call once from `main` before serving requests; later calls are no-ops and
/// return `false`.
pub fn register_session_types() -> bool {
    let first = REGISTRY.register();
    if first {
        tracing::debug!("registered auth session keys");
    }
    first
}

/// The process-wide registry consulted by the bundled stores.
pub fn registry() -> &'static KeyRegistry {
    &REGISTRY
}

/// Absolute point in time, stored in sessions as Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(#[serde(with = "chrono::serde::ts_milliseconds")] pub DateTime<Utc>);

impl Timestamp {
    /// Read a timestamp back from a session value. `None` if the value is not one.
    pub fn from_value(value: &Value) -> Option<Self> {
        let millis = value.as_i64()?;
        Utc.timestamp_millis_opt(millis).single().map(Timestamp)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::from(ts.0.timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_is_idempotent() {
        let registry = KeyRegistry::new();
        assert!(!registry.is_registered());
        assert!(registry.register());
        assert!(!registry.register());
        assert!(registry.is_registered());
    }

    #[test]
    fn test_unregistered_lookups_fail() {
        let registry = KeyRegistry::new();
        assert!(matches!(
            registry.wire_name(AuthKey::IDENTITY),
            Err(StoreError::UnregisteredKey(_))
        ));
        assert!(matches!(
            registry.lookup("~auth.expiry"),
            Err(StoreError::UnregisteredKey(_))
        ));
    }

    #[test]
    fn test_registered_lookups_resolve() {
        let registry = KeyRegistry::new();
        registry.register();
        let name = registry.wire_name(AuthKey::EXPIRY).unwrap();
        assert_eq!(registry.lookup(name).unwrap(), AuthKey::EXPIRY);
        assert!(registry.lookup("~auth.other").is_err());
    }

    #[test]
    fn test_app_keys_never_equal_auth_keys() {
        let app = SessionKey::from("~auth.identity");
        assert_ne!(app, SessionKey::Auth(AuthKey::IDENTITY));
    }

    #[test]
    fn test_timestamp_value_roundtrip() {
        let ts = Timestamp(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap());
        let value = Value::from(ts);
        assert_eq!(value, json!(1_700_000_000_123i64));
        assert_eq!(Timestamp::from_value(&value), Some(ts));
        assert_eq!(serde_json::to_value(ts).unwrap(), value);
    }

    #[test]
    fn test_timestamp_rejects_non_numbers() {
        assert_eq!(Timestamp::from_value(&json!("tomorrow")), None);
        assert_eq!(Timestamp::from_value(&json!(1.5)), None);
        assert_eq!(Timestamp::from_value(&Value::Null), None);
    }
}
