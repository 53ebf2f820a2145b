use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Secrets that ship in sample files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "secret", "changeme"];

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub aggregation_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment, after `.env` if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("SWAPMEET_JWT_SECRET").context("SWAPMEET_JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SWAPMEET_JWT_SECRET is a placeholder; set a real secret");
        }

        let timeout_ms: u64 = var("SWAPMEET_AGGREGATION_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("SWAPMEET_AGGREGATION_TIMEOUT_MS must be a number of milliseconds")?;

        Ok(Self {
            host: var("SWAPMEET_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("SWAPMEET_PORT")
                .unwrap_or_else(|| "3000".into())
                .parse()
                .context("SWAPMEET_PORT must be a valid port")?,
            db_path: PathBuf::from(var("SWAPMEET_DB_PATH").unwrap_or_else(|| "swapmeet.db".into())),
            jwt_secret,
            aggregation_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
