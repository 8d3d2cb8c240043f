//! Configuration for garage
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::JwtValidator;
use crate::registry::RegistryConfig;
use crate::types::{GarageError, Result};

/// garage - course sharing backend
#[derive(Parser, Debug, Clone)]
#[command(name = "garage")]
#[command(about = "Course sharing backend with friend-scoped visibility")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (insecure JWT default, in-memory fallback)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "garage")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Upper bound for a single store operation in milliseconds
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value = "10000")]
    pub store_timeout_ms: u64,

    /// Seconds between request registry sweeps
    #[arg(long, env = "REGISTRY_FLUSH_INTERVAL_SECS", default_value = "60")]
    pub registry_flush_interval_secs: u64,

    /// Registry size above which sweeps evict expired entries
    #[arg(long, env = "REGISTRY_SWEEP_THRESHOLD", default_value = "5000")]
    pub registry_sweep_threshold: usize,

    /// Age in seconds after which a registry entry may be evicted
    #[arg(long, env = "REGISTRY_TTL_SECS", default_value = "900")]
    pub registry_ttl_secs: u64,

    /// Append visit events as JSONL to this file
    #[arg(long, env = "VISIT_LOG_PATH")]
    pub visit_log_path: Option<PathBuf>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }
        if self.store_timeout_ms == 0 {
            return Err("STORE_TIMEOUT_MS must be greater than zero".to_string());
        }
        if self.registry_flush_interval_secs == 0 {
            return Err("REGISTRY_FLUSH_INTERVAL_SECS must be greater than zero".to_string());
        }
        Ok(())
    }

    /// JWT validator for the configured secret; dev mode falls back to an insecure one
    pub fn jwt_validator(&self) -> Result<JwtValidator> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), self.jwt_expiry_seconds),
            (None, true) => Ok(JwtValidator::new_dev()),
            (None, false) => Err(GarageError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            ttl: Duration::from_secs(self.registry_ttl_secs),
            sweep_threshold: self.registry_sweep_threshold,
        }
    }

    pub fn registry_flush_interval(&self) -> Duration {
        Duration::from_secs(self.registry_flush_interval_secs)
    }
}
