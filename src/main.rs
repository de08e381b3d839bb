//! Demo server for the session authentication handler.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Register the auth session keys
//! 3. Build the session store and auth handler
//! 4. Serve the demo router with request tracing
//!
//! Also supports a `keygen` subcommand that prints a fresh cookie signing key.

use serde_json::json;
use sessionauth::{
    auth::{register_session_types, AuthHandler, StaticVerifier},
    config::{Config, SessionBackend},
    routes,
    storage::{
        cookie_store::{encode_key, generate_key},
        CookieStore, MemoryStore,
    },
};
use std::process;
use tower_http::trace::TraceLayer;

fn print_keygen_usage() {
    eprintln!("Usage: sessionauth keygen");
    eprintln!();
    eprintln!("Generate a random 64-byte cookie signing key.");
    eprintln!();
    eprintln!("Then set in .env:");
    eprintln!("  AUTH_COOKIE_KEY=<output>");
}

fn build_handler(config: &Config) -> Result<AuthHandler, String> {
    let (user, pass) = match (&config.demo_user, &config.demo_pass) {
        (Some(user), Some(pass)) => (user.clone(), pass.clone()),
        _ => return Err("DEMO_USER and DEMO_PASS must both be set".to_string()),
    };
    let verifier = StaticVerifier::new(user.clone(), pass, json!({ "user": user }));

    let options = match config.session_backend {
        SessionBackend::Cookie => config.auth_options(
            CookieStore::new(config.cookie_key.clone()).with_config(config.cookie_config()),
        ),
        SessionBackend::Memory => config.auth_options(
            MemoryStore::new(config.cookie_key.clone())
                .with_config(config.cookie_config())
                .with_ttl(config.session_lifetime()),
        ),
    };

    AuthHandler::new(verifier, options).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    // Check for keygen subcommand
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] == "keygen" {
        if args.len() != 2 {
            print_keygen_usage();
            process::exit(1);
        }
        println!("{}", encode_key(&generate_key()));
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    register_session_types();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            process::exit(1);
        }
    };
    tracing::info!(?config, "Starting sessionauth demo on {}", config.bind_addr);

    let auth = match build_handler(&config) {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build auth handler");
            process::exit(1);
        }
    };

    let app = routes::demo_router(auth).layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.bind_addr, "Failed to bind");
            process::exit(1);
        }
    };
    tracing::info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        process::exit(1);
    }
}
