//! Request and response models.

use serde::Serialize;

use crate::auth::Identity;
use crate::error::AuthError;

/// Credentials posted to the login handler.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl LoginForm {
    /// Parse an `application/x-www-form-urlencoded` payload.
    ///
    /// Repeated fields keep their first value.
    pub fn parse(input: &[u8]) -> Result<Self, AuthError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(input)
            .map_err(|e| AuthError::BodyParse(e.to_string()))?;

        let mut form = LoginForm::default();
        for (name, value) in pairs {
            match name.as_str() {
                "user" if form.user.is_none() => form.user = Some(value),
                "pass" if form.pass.is_none() => form.pass = Some(value),
                _ => {}
            }
        }
        Ok(form)
    }

    /// Fill fields missing here from `fallback`.
    pub fn or(self, fallback: LoginForm) -> Self {
        Self {
            user: self.user.or(fallback.user),
            pass: self.pass.or(fallback.pass),
        }
    }
}

/// Body of the demo profile endpoint.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub identity: Identity,
}
