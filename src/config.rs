use base64::{engine::general_purpose, Engine as _};
use cookie::Key;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::{
    with_landing_redirect, with_lifetime, with_logout_redirect, with_session_name, with_store,
    AuthOption,
};
use crate::storage::{CookieConfig, SessionStore};

/// Where session state lives for the demo server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    /// Whole session in the signed cookie.
    Cookie,
    /// Signed session id in the cookie, values in process memory.
    Memory,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cookie" => Ok(SessionBackend::Cookie),
            "memory" => Ok(SessionBackend::Memory),
            other => Err(format!("expected \"cookie\" or \"memory\", got {:?}", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Cookie signing
    pub cookie_key: Key,
    pub cookie_secure: bool,

    // Session
    pub session_name: String,
    pub session_lifetime_secs: u64,
    pub session_backend: SessionBackend,

    // Redirects
    pub landing_path: String,
    pub logout_path: Option<String>,

    // Server
    pub bind_addr: SocketAddr,

    // Demo credentials
    pub demo_user: Option<String>,
    pub demo_pass: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("cookie_key", &"[REDACTED]")
            .field("cookie_secure", &self.cookie_secure)
            .field("session_name", &self.session_name)
            .field("session_lifetime_secs", &self.session_lifetime_secs)
            .field("session_backend", &self.session_backend)
            .field("landing_path", &self.landing_path)
            .field("logout_path", &self.logout_path)
            .field("bind_addr", &self.bind_addr)
            .field("demo_user", &self.demo_user)
            .field("demo_pass", &self.demo_pass.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no session store configured")]
    MissingStore,

    #[error("session store configured more than once")]
    DuplicateStore,

    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

/// Shortest accepted signing key, in bytes.
pub const MIN_KEY_BYTES: usize = 64;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; variables may be set directly.
        let _ = dotenvy::dotenv();

        let cookie_key = parse_cookie_key(
            &env::var("AUTH_COOKIE_KEY")
                .map_err(|_| ConfigError::MissingVar("AUTH_COOKIE_KEY".to_string()))?,
        )?;
        let cookie_secure = parse_env_or_default("AUTH_COOKIE_SECURE", true)?;

        let session_name =
            env::var("AUTH_SESSION_NAME").unwrap_or_else(|_| "AuthSession".to_string());
        let session_lifetime_secs: u64 = parse_env_or_default("AUTH_SESSION_LIFETIME_SECS", 300)?;
        if session_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "AUTH_SESSION_LIFETIME_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let session_backend = parse_env_or_default("AUTH_SESSION_BACKEND", SessionBackend::Cookie)?;

        let landing_path = env::var("AUTH_LANDING_PATH").unwrap_or_else(|_| "/".to_string());
        let logout_path = env::var("AUTH_LOGOUT_PATH").ok().filter(|p| !p.is_empty());

        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let demo_user = env::var("DEMO_USER").ok().filter(|v| !v.is_empty());
        let demo_pass = env::var("DEMO_PASS").ok().filter(|v| !v.is_empty());

        Ok(Config {
            cookie_key,
            cookie_secure,
            session_name,
            session_lifetime_secs,
            session_backend,
            landing_path,
            logout_path,
            bind_addr,
            demo_user,
            demo_pass,
        })
    }

    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    /// Cookie attributes for the configured store.
    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            secure: self.cookie_secure,
            ..CookieConfig::default()
        }
    }

    /// Handler options equivalent to this configuration, using `store`.
    pub fn auth_options<S: SessionStore>(&self, store: S) -> Vec<AuthOption> {
        let mut options = vec![
            with_store(store),
            with_session_name(self.session_name.clone()),
            with_lifetime(self.session_lifetime()),
            with_landing_redirect(self.landing_path.clone()),
        ];
        if let Some(logout) = &self.logout_path {
            options.push(with_logout_redirect(logout.clone()));
        }
        options
    }
}

fn parse_cookie_key(encoded: &str) -> Result<Key, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("AUTH_COOKIE_KEY".to_string(), reason);

    if encoded.is_empty() {
        return Err(invalid("cannot be empty".to_string()));
    }
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(format!("invalid base64: {}", e)))?;
    if bytes.len() < MIN_KEY_BYTES {
        return Err(invalid(format!(
            "expected at least {} bytes, got {}",
            MIN_KEY_BYTES,
            bytes.len()
        )));
    }
    Key::try_from(bytes.as_slice()).map_err(|e| invalid(e.to_string()))
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
