//! Session authentication: login, request gating and logout.

pub mod handler;
pub mod keys;
pub mod middleware;
pub mod options;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

/// Opaque value returned by a [`Verifier`] and stored in the session.
pub type Identity = serde_json::Value;

pub use handler::{AuthHandler, Clock, ErrorHandler, NotAuthorizedHandler};
pub use keys::{register_session_types, SessionKey, Timestamp};
pub use middleware::{authenticate, authorize, logout, Authenticated};
pub use options::{
    with_clock, with_error_handler, with_landing_redirect, with_lifetime, with_logout_redirect,
    with_not_authorized_handler, with_session_name, with_store, AuthBuilder, AuthOption,
};
pub use verify::{StaticVerifier, Verifier};
