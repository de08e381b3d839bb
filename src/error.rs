//! Error types and the default plain-text error response.

use axum::{
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Discriminant of [`AuthError`], for comparisons that must survive wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadMethod,
    BodyParse,
    BadLogin,
    NotAuthorized,
    Store,
    Verifier,
    ExpiryOutOfRange,
}

/// Errors surfaced by login, session validation and logout.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("method should be POST")]
    BadMethod,

    #[error("failed to parse form: {0}")]
    BodyParse(String),

    #[error("Bad Login")]
    BadLogin,

    #[error("Not Authorized")]
    NotAuthorized,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("credential check failed: {0}")]
    Verifier(String),

    #[error("session expiry out of range")]
    ExpiryOutOfRange,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::BadMethod => ErrorKind::BadMethod,
            AuthError::BodyParse(_) => ErrorKind::BodyParse,
            AuthError::BadLogin => ErrorKind::BadLogin,
            AuthError::NotAuthorized => ErrorKind::NotAuthorized,
            AuthError::Store(_) => ErrorKind::Store,
            AuthError::Verifier(_) => ErrorKind::Verifier,
            AuthError::ExpiryOutOfRange => ErrorKind::ExpiryOutOfRange,
        }
    }

    /// Status code the auth handlers answer with for this error.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::BadMethod | ErrorKind::BadLogin => StatusCode::BAD_REQUEST,
            ErrorKind::NotAuthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::BodyParse
            | ErrorKind::Store
            | ErrorKind::Verifier
            | ErrorKind::ExpiryOutOfRange => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure reported by a credential verifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The credentials were checked and rejected.
    #[error("Bad Login")]
    BadLogin,

    /// The check itself could not be performed.
    #[error("{0}")]
    Internal(String),
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::BadLogin => AuthError::BadLogin,
            VerifyError::Internal(msg) => AuthError::Verifier(msg),
        }
    }
}

/// Session store load/save failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed session cookie: {0}")]
    MalformedCookie(String),

    #[error("session codec error: {0}")]
    Codec(String),

    #[error("session key {0} is not registered, call register_session_types() at startup")]
    UnregisteredKey(String),

    #[error("session backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

/// Default error handler: the error text as a plain-text body.
pub fn plain_text_error(_parts: &Parts, err: &AuthError, status: StatusCode) -> Response {
    (
        status,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ),
        ],
        format!("{err}\n"),
    )
        .into_response()
}
