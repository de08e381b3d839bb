//! Option functions for [`AuthHandler::new`](super::AuthHandler::new).
//!
//! Each option validates its input and records it on an [`AuthBuilder`].
//! Defaults are filled in after every option ran; the first failing option
//! aborts construction.

use axum::{
    http::{request::Parts, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::handler::{Clock, ErrorHandler, Inner, NotAuthorizedHandler};
use super::verify::Verifier;
use crate::config::ConfigError;
use crate::error::{plain_text_error, AuthError};
use crate::storage::SessionStore;

pub const DEFAULT_SESSION_NAME: &str = "AuthSession";
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_LANDING: &str = "/";

/// A configuration step applied to the builder.
pub type AuthOption = Box<dyn FnOnce(&mut AuthBuilder) -> Result<(), ConfigError> + Send>;

/// Mutable configuration collected from options.
#[derive(Default)]
pub struct AuthBuilder {
    store: Option<Arc<dyn SessionStore>>,
    session_name: Option<String>,
    lifetime: Option<chrono::Duration>,
    landing: Option<HeaderValue>,
    logout: Option<HeaderValue>,
    error_handler: Option<ErrorHandler>,
    not_authorized_handler: Option<NotAuthorizedHandler>,
    clock: Option<Clock>,
}

impl AuthBuilder {
    pub(super) fn build(self, verifier: Arc<dyn Verifier>) -> Result<Inner, ConfigError> {
        let store = self.store.ok_or(ConfigError::MissingStore)?;

        let lifetime = match self.lifetime {
            Some(lifetime) => lifetime,
            None => chrono::Duration::from_std(DEFAULT_LIFETIME)
                .map_err(|e| invalid("lifetime", e.to_string()))?,
        };
        let landing = self
            .landing
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_LANDING));
        let logout = self.logout.unwrap_or_else(|| landing.clone());
        let session_name = self
            .session_name
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        let error_handler: ErrorHandler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(plain_text_error));
        let not_authorized_handler = self.not_authorized_handler.unwrap_or_else(|| {
            let error_handler = error_handler.clone();
            Arc::new(move |parts: &Parts| {
                error_handler(parts, &AuthError::NotAuthorized, StatusCode::UNAUTHORIZED)
            })
        });
        let clock: Clock = self.clock.unwrap_or_else(|| Arc::new(Utc::now));

        Ok(Inner {
            verifier,
            store,
            session_name,
            lifetime,
            landing,
            logout,
            error_handler,
            not_authorized_handler,
            clock,
        })
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue(field.to_string(), reason.into())
}

/// RFC 6265 cookie-name token.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

fn redirect_target(field: &str, target: String) -> Result<HeaderValue, ConfigError> {
    if target.is_empty() {
        return Err(invalid(field, "cannot be empty"));
    }
    if !target.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(invalid(
            field,
            format!("{:?} must be visible ASCII; percent-encode other characters", target),
        ));
    }
    HeaderValue::from_str(&target).map_err(|e| invalid(field, e.to_string()))
}

/// Session store used to load and save sessions. Required.
pub fn with_store<S: SessionStore>(store: S) -> AuthOption {
    Box::new(move |builder: &mut AuthBuilder| {
        if builder.store.is_some() {
            return Err(ConfigError::DuplicateStore);
        }
        builder.store = Some(Arc::new(store));
        Ok(())
    })
}

/// Name of the session and its cookie (default `AuthSession`).
pub fn with_session_name(name: impl Into<String>) -> AuthOption {
    let name = name.into();
    Box::new(move |builder: &mut AuthBuilder| {
        if !is_cookie_token(&name) {
            return Err(invalid(
                "session_name",
                format!("{:?} is not a valid cookie name", name),
            ));
        }
        builder.session_name = Some(name);
        Ok(())
    })
}

/// Absolute session lifetime, counted from login (default 5 minutes).
pub fn with_lifetime(lifetime: Duration) -> AuthOption {
    Box::new(move |builder: &mut AuthBuilder| {
        if lifetime.is_zero() {
            return Err(invalid("lifetime", "must be greater than zero"));
        }
        let lifetime =
            chrono::Duration::from_std(lifetime).map_err(|e| invalid("lifetime", e.to_string()))?;
        let now = Utc::now();
        if now.checked_add_signed(lifetime).is_none() || now.checked_sub_signed(lifetime).is_none() {
            return Err(invalid("lifetime", "expiry would fall outside the supported date range"));
        }
        builder.lifetime = Some(lifetime);
        Ok(())
    })
}

/// Redirect target after a successful login (default `/`).
pub fn with_landing_redirect(target: impl Into<String>) -> AuthOption {
    let target = target.into();
    Box::new(move |builder: &mut AuthBuilder| {
        builder.landing = Some(redirect_target("landing_redirect", target)?);
        Ok(())
    })
}

/// Redirect target after logout (default: the landing target).
pub fn with_logout_redirect(target: impl Into<String>) -> AuthOption {
    let target = target.into();
    Box::new(move |builder: &mut AuthBuilder| {
        builder.logout = Some(redirect_target("logout_redirect", target)?);
        Ok(())
    })
}

/// Replace the default plain-text error response.
pub fn with_error_handler<F>(handler: F) -> AuthOption
where
    F: Fn(&Parts, &AuthError, StatusCode) -> Response + Send + Sync + 'static,
{
    Box::new(move |builder: &mut AuthBuilder| {
        builder.error_handler = Some(Arc::new(handler));
        Ok(())
    })
}

/// Replace the response sent when a protected route is hit without a valid session.
pub fn with_not_authorized_handler<F>(handler: F) -> AuthOption
where
    F: Fn(&Parts) -> Response + Send + Sync + 'static,
{
    Box::new(move |builder: &mut AuthBuilder| {
        builder.not_authorized_handler = Some(Arc::new(handler));
        Ok(())
    })
}

/// Time source for expiry computations (default `Utc::now`).
pub fn with_clock<F>(clock: F) -> AuthOption
where
    F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
{
    Box::new(move |builder: &mut AuthBuilder| {
        builder.clock = Some(Arc::new(clock));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{accept_23, MockVerifier};
    use crate::auth::AuthHandler;
    use crate::storage::{cookie_store::generate_key, CookieStore};
    use axum::response::IntoResponse;

    fn store() -> CookieStore {
        CookieStore::new(generate_key())
    }

    fn build(options: Vec<AuthOption>) -> Result<AuthHandler, ConfigError> {
        AuthHandler::new(MockVerifier::new(accept_23), options)
    }

    #[test]
    fn test_missing_store_fails() {
        let err = build(vec![with_lifetime(Duration::from_secs(60))]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingStore));
    }

    #[test]
    fn test_duplicate_store_fails() {
        let err = build(vec![with_store(store()), with_store(store())]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStore));
    }

    #[test]
    fn test_defaults_applied() {
        let handler = build(vec![with_store(store())]).unwrap();
        assert_eq!(handler.session_name(), "AuthSession");
        assert_eq!(handler.lifetime(), chrono::Duration::minutes(5));
        assert_eq!(handler.landing_redirect(), "/");
        assert_eq!(handler.logout_redirect(), "/");
    }

    #[test]
    fn test_logout_defaults_to_landing() {
        let handler = build(vec![
            with_store(store()),
            with_landing_redirect("/landingRedir"),
        ])
        .unwrap();
        assert_eq!(handler.landing_redirect(), "/landingRedir");
        assert_eq!(handler.logout_redirect(), "/landingRedir");
    }

    #[test]
    fn test_explicit_values_kept() {
        let handler = build(vec![
            with_store(store()),
            with_session_name("my.sid"),
            with_lifetime(Duration::from_secs(3600)),
            with_landing_redirect("/home"),
            with_logout_redirect("/bye"),
        ])
        .unwrap();
        assert_eq!(handler.session_name(), "my.sid");
        assert_eq!(handler.lifetime(), chrono::Duration::hours(1));
        assert_eq!(handler.landing_redirect(), "/home");
        assert_eq!(handler.logout_redirect(), "/bye");
    }

    #[test]
    fn test_invalid_session_names_rejected() {
        for name in ["", "has space", "semi;colon", "quote\"", "tab\t"] {
            let err = build(vec![with_store(store()), with_session_name(name)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(ref f, _) if f == "session_name"),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_zero_lifetime_rejected() {
        let err = build(vec![with_store(store()), with_lifetime(Duration::ZERO)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref f, _) if f == "lifetime"));
    }

    #[test]
    fn test_out_of_range_lifetime_rejected() {
        let err = build(vec![
            with_store(store()),
            with_lifetime(Duration::from_secs(10_000_000_000_000)),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref f, _) if f == "lifetime"));
    }

    #[test]
    fn test_non_ascii_redirects_rejected() {
        for target in ["/caf\u{e9}", "/a b"] {
            let err = build(vec![with_store(store()), with_landing_redirect(target)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref f, _) if f == "landing_redirect"));
        }

        let handler = build(vec![
            with_store(store()),
            with_landing_redirect("/caf%C3%A9"),
        ])
        .unwrap();
        assert_eq!(handler.landing_redirect(), "/caf%C3%A9");
        assert_eq!(handler.logout_redirect(), "/caf%C3%A9");
    }

    #[test]
    fn test_empty_redirects_rejected() {
        let err = build(vec![with_store(store()), with_landing_redirect("")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref f, _) if f == "landing_redirect"));

        let err = build(vec![with_store(store()), with_logout_redirect("/a\nb")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref f, _) if f == "logout_redirect"));
    }

    #[test]
    fn test_failing_option_aborts_before_store_check() {
        // The option error wins even though the store is also missing.
        let err = build(vec![with_session_name("bad name")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    }

    #[test]
    fn test_custom_handlers_accepted() {
        let handler = build(vec![
            with_store(store()),
            with_error_handler(|_, _, status| status.into_response()),
            with_not_authorized_handler(|_| StatusCode::FORBIDDEN.into_response()),
            with_clock(Utc::now),
        ]);
        assert!(handler.is_ok());
    }

    #[test]
    fn test_cookie_token_rules() {
        assert!(is_cookie_token("AuthSession"));
        assert!(is_cookie_token("__Host-sid"));
        assert!(!is_cookie_token("a=b"));
        assert!(!is_cookie_token("caf\u{e9}"));
    }
}
