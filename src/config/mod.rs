//! Configuration module for the coordination backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// User ids promoted to admin the first time their profile is created
    pub admin_uids: Vec<String>,
    /// Timeout for fetching a published sheet
    pub sheet_fetch_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("COORD_API_PSK").ok().filter(|s| !s.is_empty());

        let db_path = env::var("COORD_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let bind_addr = env::var("COORD_BIND_ADDR")
            .ok()
            .and_then(|s| match s.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    eprintln!("Invalid COORD_BIND_ADDR '{}', using default", s);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080)));

        let log_level = env::var("COORD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let admin_uids = env::var("COORD_ADMIN_UIDS")
            .map(|s| parse_list(&s))
            .unwrap_or_default();

        let sheet_fetch_timeout = env::var("COORD_SHEET_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            admin_uids,
            sheet_fetch_timeout,
        }
    }

    /// Whether the uid is listed as a bootstrap admin.
    pub fn is_bootstrap_admin(&self, uid: &str) -> bool {
        self.admin_uids.iter().any(|a| a == uid)
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
