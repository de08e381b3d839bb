//! Credential verification seam.

use async_trait::async_trait;

use super::Identity;
use crate::error::VerifyError;

/// Checks a username/password pair.
///
/// Return [`VerifyError::BadLogin`] for rejected credentials so the login
/// handler answers 400; any other error is treated as an internal failure.
#[async_trait]
pub trait Verifier: Send + Sync + 'static {
    async fn check(&self, user: &str, pass: &str) -> Result<Identity, VerifyError>;
}

/// Verifier accepting a single configured credential.
///
/// Meant for demos and tests; real deployments plug in their own user store.
#[derive(Clone)]
pub struct StaticVerifier {
    user: String,
    pass: String,
    identity: Identity,
}

impl std::fmt::Debug for StaticVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticVerifier")
            .field("user", &self.user)
            .field("pass", &"[REDACTED]")
            .finish()
    }
}

impl StaticVerifier {
    pub fn new(user: impl Into<String>, pass: impl Into<String>, identity: Identity) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            identity,
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl Verifier for StaticVerifier {
    async fn check(&self, user: &str, pass: &str) -> Result<Identity, VerifyError> {
        let user_ok = constant_time_eq(user.as_bytes(), self.user.as_bytes());
        let pass_ok = constant_time_eq(pass.as_bytes(), self.pass.as_bytes());
        if user_ok && pass_ok {
            Ok(self.identity.clone())
        } else {
            Err(VerifyError::BadLogin)
        }
    }
}
