use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::api::NONCE_PATH;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3000);
const DEFAULT_NONCE_TTL_SECS: i64 = 15 * 60;

/// Configuration for the signing client and the verifier
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the identity service
    pub base_url: String,
    /// Path of the nonce-issuing endpoint
    pub nonce_path: String,
    /// File holding the bearer token and profile fields
    pub session_path: PathBuf,
    /// Path to the SQLite database
    pub db_path: String,
    /// Address the verifier listens on
    pub bind_addr: SocketAddr,
    /// Lifetime of an issued server nonce, in seconds
    pub nonce_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            nonce_path: NONCE_PATH.to_string(),
            session_path: PathBuf::from("session.json"),
            db_path: "storage.db".to_string(),
            bind_addr: SocketAddr::from(DEFAULT_BIND_ADDR),
            nonce_ttl_secs: DEFAULT_NONCE_TTL_SECS,
        }
    }
}

impl Config {
    /// Create a configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("C2ID_BASE_URL").unwrap_or(defaults.base_url),
            nonce_path: env::var("C2ID_NONCE_PATH").unwrap_or(defaults.nonce_path),
            session_path: env::var("C2ID_SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_path),
            db_path: env::var("DB_PATH").unwrap_or(defaults.db_path),
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|addr| addr.parse().ok())
                .unwrap_or(defaults.bind_addr),
            nonce_ttl_secs: env::var("NONCE_TTL_SECS")
                .ok()
                .and_then(|ttl| ttl.parse().ok())
                .filter(|ttl: &i64| *ttl > 0)
                .unwrap_or(defaults.nonce_ttl_secs),
        }
    }
}
