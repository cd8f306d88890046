// src/config.rs

use std::{env, fmt};

use dotenvy::dotenv;

/// Default token lifetime: one week.
pub const DEFAULT_JWT_EXPIRATION: u64 = 60 * 60 * 24 * 7;

/// Settings key holding the semester completion date.
pub const SEMESTER_COMPLETION_KEY: &str = "semesterCompletionDate";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub log_dir: String,
    /// Seed admin account, created at startup when both are present.
    pub admin_name: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid(var, reason) => write!(f, "{} is invalid: {}", var, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads configuration from the environment (and `.env` if present).
    ///
    /// The signing secret has no fallback: startup fails without it.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = match env::var("JWT_EXPIRATION") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::Invalid("JWT_EXPIRATION", e.to_string()))?,
            Err(_) => DEFAULT_JWT_EXPIRATION,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let admin_name = env::var("ADMIN_NAME").ok().filter(|v| !v.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            log_dir,
            admin_name,
            admin_password,
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}
