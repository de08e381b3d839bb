//! Demo server routes.

pub mod pages;

use crate::auth::{authenticate, authorize, logout, AuthHandler};
use axum::{
    middleware,
    routing::{any, get},
    Router,
};

/// Build the demo router.
///
/// `/login` and `/logout` accept any method and let the auth handler reject
/// the wrong ones; `/profile` sits behind the session gate.
pub fn demo_router(auth: AuthHandler) -> Router {
    let protected = Router::new()
        .route("/profile", get(pages::profile))
        .route_layer(middleware::from_fn_with_state(auth.clone(), authenticate));

    Router::new()
        .route("/", get(pages::index))
        .route("/login", any(authorize))
        .route("/logout", any(logout))
        .merge(protected)
        .with_state(auth)
}
