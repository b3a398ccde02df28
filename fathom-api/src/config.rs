//! API Configuration Module
//!
//! Configuration is loaded from environment variables with development
//! defaults. The database URL is handed to tokio-postgres verbatim, so any
//! connection-string form it understands is accepted.

use std::time::Duration;

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_COMMAND_TTL_SECS, DEFAULT_DATABASE_URL,
    DEFAULT_DB_POOL_SIZE, DEFAULT_DESCENT_FRESHNESS_SECS, DEFAULT_EXPIRE_SWEEP_SECS,
};

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection string (`DATABASE_URL`)
    pub url: String,
    /// Maximum pool size (`DB_POOL_SIZE`)
    pub pool_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            pool_size: DEFAULT_DB_POOL_SIZE,
        }
    }
}

impl DbConfig {
    /// Create a database configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: connection string (default: local dev database)
    /// - `DB_POOL_SIZE`: maximum pool size (default: 20)
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            pool_size: env_parsed("DB_POOL_SIZE", DEFAULT_DB_POOL_SIZE),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server-wide tunables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address (`BIND_ADDR`)
    pub bind_addr: String,
    /// TTL before a QUEUED command expires (`COMMAND_TTL_SECONDS`)
    pub command_ttl: Duration,
    /// Descent gate freshness window (`DESCENT_FRESHNESS_SECONDS`)
    pub descent_freshness: Duration,
    /// Expiration sweep cadence (`EXPIRE_SWEEP_SECONDS`)
    pub expire_sweep_period: Duration,
    /// Whether `/admin/reset-db` is allowed (`ADMIN_RESET_ENABLED`)
    pub admin_reset_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            command_ttl: Duration::from_secs(DEFAULT_COMMAND_TTL_SECS),
            descent_freshness: Duration::from_secs(DEFAULT_DESCENT_FRESHNESS_SECS),
            expire_sweep_period: Duration::from_secs(DEFAULT_EXPIRE_SWEEP_SECS),
            admin_reset_enabled: false,
        }
    }
}

impl ApiConfig {
    /// Create an API configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `BIND_ADDR`: listen address (default: 0.0.0.0:8000)
    /// - `COMMAND_TTL_SECONDS`: queued-command TTL (default: 3600)
    /// - `DESCENT_FRESHNESS_SECONDS`: descent gate window (default: 600)
    /// - `EXPIRE_SWEEP_SECONDS`: sweep cadence (default: 60)
    /// - `ADMIN_RESET_ENABLED`: allow destructive reset (default: false)
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            command_ttl: Duration::from_secs(env_parsed(
                "COMMAND_TTL_SECONDS",
                DEFAULT_COMMAND_TTL_SECS,
            )),
            descent_freshness: Duration::from_secs(env_parsed(
                "DESCENT_FRESHNESS_SECONDS",
                DEFAULT_DESCENT_FRESHNESS_SECS,
            )),
            expire_sweep_period: Duration::from_secs(env_parsed(
                "EXPIRE_SWEEP_SECONDS",
                DEFAULT_EXPIRE_SWEEP_SECS,
            )),
            admin_reset_enabled: env_bool("ADMIN_RESET_ENABLED"),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// ============================================================================
// TESTS
// ============================================================================
