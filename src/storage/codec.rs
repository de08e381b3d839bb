//! Session value payload encoding.
//!
//! Payload = URL-safe base64 (no padding) of a JSON object. Application keys are
//! written as `app.<name>`; reserved auth keys under their registered wire names.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::auth::keys::{KeyRegistry, SessionKey};
use crate::error::StoreError;

const APP_PREFIX: &str = "app.";

pub(crate) fn encode(
    values: &HashMap<SessionKey, Value>,
    registry: &KeyRegistry,
) -> Result<String, StoreError> {
    let mut wire = Map::with_capacity(values.len());
    for (key, value) in values {
        let name = match key {
            SessionKey::App(name) => format!("{APP_PREFIX}{name}"),
            SessionKey::Auth(key) => registry.wire_name(*key)?.to_string(),
        };
        wire.insert(name, value.clone());
    }
    let json = serde_json::to_vec(&Value::Object(wire))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub(crate) fn decode(
    payload: &str,
    registry: &KeyRegistry,
) -> Result<HashMap<SessionKey, Value>, StoreError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| StoreError::MalformedCookie(format!("invalid base64: {}", e)))?;
    let wire: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::MalformedCookie(format!("invalid payload: {}", e)))?;

    let mut values = HashMap::with_capacity(wire.len());
    for (name, value) in wire {
        let key = match name.strip_prefix(APP_PREFIX) {
            Some(app) => SessionKey::App(app.to_string()),
            None => SessionKey::Auth(registry.lookup(&name)?),
        };
        values.insert(key, value);
    }
    Ok(values)
}
