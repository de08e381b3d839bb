//! Axum handlers, middleware and extractor backed by an [`AuthHandler`].
//!
//! None of these bind a path; mount them wherever the application wants:
//!
//! ```rust,no_run
//! use axum::{middleware, routing::{any, get}, Router};
//! use sessionauth::auth::{authenticate, authorize, logout, AuthHandler};
//!
//! fn router(auth: AuthHandler) -> Router {
//!     let protected = Router::new()
//!         .route("/profile", get(|| async { "secret" }))
//!         .route_layer(middleware::from_fn_with_state(auth.clone(), authenticate));
//!
//!     Router::new()
//!         .route("/login", any(authorize))
//!         .route("/logout", any(logout))
//!         .merge(protected)
//!         .with_state(auth)
//! }
//! ```

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use super::{AuthHandler, Identity};

/// Login handler. Expects a POST with `user` and `pass` form fields.
pub async fn authorize(State(auth): State<AuthHandler>, request: Request) -> Response {
    auth.authorize(request).await
}

/// Logout handler. Accepts any method.
pub async fn logout(State(auth): State<AuthHandler>, request: Request) -> Response {
    auth.logout(request).await
}

/// Middleware for `axum::middleware::from_fn_with_state`, rejecting
/// requests without a valid session.
pub async fn authenticate(
    State(auth): State<AuthHandler>,
    request: Request,
    next: Next,
) -> Response {
    auth.gate(request, next).await
}

/// Identity of the authenticated caller.
///
/// Validates the session again on extraction; rejects with the configured
/// not-authorized response.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    AuthHandler: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthHandler::from_ref(state);
        match auth.authenticate_request(&parts.headers).await {
            Ok(identity) => Ok(Authenticated(identity)),
            Err(err) => {
                if err.status().is_server_error() {
                    tracing::error!(action = "store_failure", error = %err, "Session load failed");
                }
                Err(auth.not_authorized(parts))
            }
        }
    }
}
