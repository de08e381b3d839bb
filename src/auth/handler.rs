//! Login, session validation and logout.
//!
//! A session is authenticated when it was loaded from a cookie (not new), holds
//! an identity, and holds an expiry timestamp that lies in the future. Expiry is
//! absolute: it is written at login as `now + lifetime` and never extended.
//! Logout back-dates it to `now - lifetime` and asks the store to drop the cookie.

use axum::{
    body::Body,
    extract::Request,
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::keys::{AuthKey, SessionKey, Timestamp};
use super::options::{AuthBuilder, AuthOption};
use super::verify::Verifier;
use super::Identity;
use crate::config::ConfigError;
use crate::error::{AuthError, ErrorKind};
use crate::models::LoginForm;
use crate::storage::{Session, SessionStore};

/// Renders an error with the status chosen by the auth handler.
pub type ErrorHandler = Arc<dyn Fn(&Parts, &AuthError, StatusCode) -> Response + Send + Sync>;

/// Renders the rejection of a protected request.
pub type NotAuthorizedHandler = Arc<dyn Fn(&Parts) -> Response + Send + Sync>;

/// Current time source.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Login bodies larger than this are refused.
const MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

pub(super) struct Inner {
    pub(super) verifier: Arc<dyn Verifier>,
    pub(super) store: Arc<dyn SessionStore>,
    pub(super) session_name: String,
    pub(super) lifetime: chrono::Duration,
    pub(super) landing: HeaderValue,
    pub(super) logout: HeaderValue,
    pub(super) error_handler: ErrorHandler,
    pub(super) not_authorized_handler: NotAuthorizedHandler,
    pub(super) clock: Clock,
}

/// Session authentication for a set of routes.
///
/// Immutable once built and cheap to clone; share one instance across requests.
#[derive(Clone)]
pub struct AuthHandler {
    inner: Arc<Inner>,
}

impl fmt::Debug for AuthHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandler")
            .field("session_name", &self.inner.session_name)
            .field("lifetime", &self.inner.lifetime)
            .field("landing", &self.inner.landing)
            .field("logout", &self.inner.logout)
            .finish_non_exhaustive()
    }
}

/// Why a loaded session was not accepted. Logged, never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NewSession,
    MissingIdentity,
    MissingExpiry,
    MalformedExpiry,
    Expired,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::NewSession => "new_session",
            Rejection::MissingIdentity => "missing_identity",
            Rejection::MissingExpiry => "missing_expiry",
            Rejection::MalformedExpiry => "malformed_expiry",
            Rejection::Expired => "expired",
        }
    }
}

const IDENTITY_KEY: SessionKey = SessionKey::Auth(AuthKey::IDENTITY);
const EXPIRY_KEY: SessionKey = SessionKey::Auth(AuthKey::EXPIRY);

impl AuthHandler {
    /// Build a handler from a verifier and options.
    ///
    /// Fails on the first invalid option, or when no store was supplied.
    pub fn new<V, I>(verifier: V, options: I) -> Result<Self, ConfigError>
    where
        V: Verifier,
        I: IntoIterator<Item = AuthOption>,
    {
        let mut builder = AuthBuilder::default();
        for option in options {
            option(&mut builder)?;
        }
        let inner = builder.build(Arc::new(verifier))?;

        if !crate::auth::keys::registry().is_registered() {
            tracing::warn!(
                "auth session keys are not registered, sessions will fail to save until register_session_types() is called"
            );
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn session_name(&self) -> &str {
        &self.inner.session_name
    }

    pub fn lifetime(&self) -> chrono::Duration {
        self.inner.lifetime
    }

    pub fn landing_redirect(&self) -> &str {
        self.inner.landing.to_str().unwrap_or_default()
    }

    pub fn logout_redirect(&self) -> &str {
        self.inner.logout.to_str().unwrap_or_default()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }

    /// Handle a login POST with `user` and `pass` form fields.
    ///
    /// Redirects to the landing target with `303 See Other` and a session
    /// cookie on success; every failure goes through the error handler.
    pub async fn authorize(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        if parts.method != Method::POST {
            return self.fail(&parts, AuthError::BadMethod);
        }

        let form = match read_login_form(&parts, body).await {
            Ok(form) => form,
            Err(err) => return self.fail(&parts, err),
        };
        let (user, pass) = match (form.user, form.pass) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => (user, pass),
            _ => return self.fail(&parts, AuthError::BadLogin),
        };

        let identity = match self.inner.verifier.check(&user, &pass).await {
            Ok(identity) => identity,
            Err(err) => {
                let err = AuthError::from(err);
                if !err.status().is_server_error() {
                    tracing::warn!(action = "login_rejected", user = %user, "Bad credentials");
                }
                return self.fail(&parts, err);
            }
        };

        let mut headers = HeaderMap::new();
        if let Err(err) = self
            .save_user_session(&parts.headers, &mut headers, identity)
            .await
        {
            return self.fail(&parts, err);
        }

        tracing::info!(action = "login", session = %self.inner.session_name, "Session established");
        see_other(&self.inner.landing, headers)
    }

    /// Authenticate a request/response pair for an identity that is already known.
    ///
    /// Writes the identity and `now + lifetime` into the session and saves it
    /// under a fresh session id, adding the session cookie to `response`.
    pub async fn save_user_session(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
        identity: Identity,
    ) -> Result<(), AuthError> {
        let mut session = self.load(request).await?;
        let expiry = self
            .now()
            .checked_add_signed(self.inner.lifetime)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        session.values.insert(IDENTITY_KEY, identity);
        session.values.insert(EXPIRY_KEY, Timestamp(expiry).into());
        session.regenerate();
        self.inner.store.save(request, &session, response).await?;
        Ok(())
    }

    /// Return the identity of an authenticated request.
    ///
    /// Every kind of invalid session yields [`AuthError::NotAuthorized`]; store
    /// failures are returned as they are. Never modifies the session.
    pub async fn authenticate_request(&self, request: &HeaderMap) -> Result<Identity, AuthError> {
        let session = self.load(request).await?;
        match self.validate(&session) {
            Ok(identity) => Ok(identity.clone()),
            Err(reason) => {
                tracing::debug!(action = "session_rejected", reason = reason.as_str());
                Err(AuthError::NotAuthorized)
            }
        }
    }

    fn validate<'s>(&self, session: &'s Session) -> Result<&'s Identity, Rejection> {
        if session.is_new() {
            return Err(Rejection::NewSession);
        }
        let identity = session
            .values
            .get(&IDENTITY_KEY)
            .ok_or(Rejection::MissingIdentity)?;
        let expiry = session
            .values
            .get(&EXPIRY_KEY)
            .ok_or(Rejection::MissingExpiry)?;
        let expiry = Timestamp::from_value(expiry).ok_or(Rejection::MalformedExpiry)?;
        if self.now() >= expiry.0 {
            return Err(Rejection::Expired);
        }
        Ok(identity)
    }

    /// Run `next` only for authenticated requests; answer the rest with the
    /// not-authorized handler.
    pub async fn gate(&self, request: Request, next: Next) -> Response {
        let outcome = self.authenticate_request(request.headers()).await;
        match outcome {
            Ok(_) => next.run(request).await,
            Err(err) => {
                if err.status().is_server_error() {
                    tracing::error!(action = "store_failure", error = %err, "Session load failed");
                }
                let (parts, _body) = request.into_parts();
                self.not_authorized(&parts)
            }
        }
    }

    /// Response of the configured not-authorized handler.
    pub fn not_authorized(&self, parts: &Parts) -> Response {
        (self.inner.not_authorized_handler)(parts)
    }

    /// Invalidate the session and redirect to the logout target.
    pub async fn logout(&self, request: Request) -> Response {
        let (parts, _body) = request.into_parts();
        let mut headers = HeaderMap::new();
        if let Err(err) = self.end_session(&parts.headers, &mut headers).await {
            return self.fail(&parts, err);
        }

        tracing::info!(action = "logout", session = %self.inner.session_name, "Session ended");
        see_other(&self.inner.logout, headers)
    }

    async fn end_session(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
    ) -> Result<(), AuthError> {
        let mut session = self.load(request).await?;
        let expiry = self
            .now()
            .checked_sub_signed(self.inner.lifetime)
            .ok_or(AuthError::ExpiryOutOfRange)?;
        session.values.insert(EXPIRY_KEY, Timestamp(expiry).into());
        session.mark_for_removal();
        self.inner.store.save(request, &session, response).await?;
        Ok(())
    }

    async fn load(&self, request: &HeaderMap) -> Result<Session, AuthError> {
        Ok(self
            .inner
            .store
            .get(request, &self.inner.session_name)
            .await?)
    }

    fn fail(&self, parts: &Parts, err: AuthError) -> Response {
        let status = err.status();
        if status.is_server_error() {
            let action = match err.kind() {
                ErrorKind::Verifier => "verifier_failure",
                ErrorKind::Store => "store_failure",
                _ => "request_failure",
            };
            tracing::error!(
                action,
                error = %err,
                method = %parts.method,
                path = %parts.uri.path(),
                "Auth request failed"
            );
        }
        (self.inner.error_handler)(parts, &err, status)
    }
}

fn see_other(location: &HeaderValue, headers: HeaderMap) -> Response {
    let mut response = StatusCode::SEE_OTHER.into_response();
    response.headers_mut().extend(headers);
    response
        .headers_mut()
        .insert(header::LOCATION, location.clone());
    response
}

fn is_form_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Collect `user`/`pass` from the urlencoded body, falling back to the query string.
async fn read_login_form(parts: &Parts, body: Body) -> Result<LoginForm, AuthError> {
    let query = match parts.uri.query() {
        Some(query) => LoginForm::parse(query.as_bytes())?,
        None => LoginForm::default(),
    };
    if !is_form_body(&parts.headers) {
        return Ok(query);
    }

    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| AuthError::BodyParse(e.to_string()))?;
    Ok(LoginForm::parse(&bytes)?.or(query))
}
