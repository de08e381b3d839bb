//! Test doubles shared by the auth unit tests.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Identity, Verifier};
use crate::error::VerifyError;

pub(crate) type CheckFn = fn(&str, &str) -> Result<Identity, VerifyError>;

/// Verifier delegating to a plain function and counting calls.
pub(crate) struct MockVerifier {
    check: CheckFn,
    calls: Arc<AtomicUsize>,
}

impl MockVerifier {
    pub(crate) fn new(check: CheckFn) -> Self {
        Self {
            check,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn check(&self, user: &str, pass: &str) -> Result<Identity, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.check)(user, pass)
    }
}

/// Accepts exactly `testUser`/`testPassw` as identity `23`.
pub(crate) fn accept_23(user: &str, pass: &str) -> Result<Identity, VerifyError> {
    if user == "testUser" && pass == "testPassw" {
        Ok(json!(23))
    } else {
        Err(VerifyError::BadLogin)
    }
}

/// Manually advanced clock.
#[derive(Clone)]
pub(crate) struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub(crate) fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        Self(Arc::new(Mutex::new(start)))
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    pub(crate) fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

/// Build the request headers a browser would send back after `response`.
pub(crate) fn cookie_request(response: &HeaderMap) -> HeaderMap {
    let set_cookie = response
        .get(header::SET_COOKIE)
        .expect("response sets a cookie")
        .to_str()
        .unwrap();
    let pair = set_cookie.split(';').next().unwrap().to_string();
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
    headers
}
