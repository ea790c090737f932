//! Server configuration.
//!
//! Values come from `COACHDESK_*` environment variables, falling back to
//! logged defaults. The server binary then lets command-line flags
//! override individual fields.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ValidationError;

/// Bind address variable.
pub const ENV_BIND: &str = "COACHDESK_BIND";
/// Data directory variable.
pub const ENV_DATA_DIR: &str = "COACHDESK_DATA_DIR";
/// Demo seeding switch.
pub const ENV_SEED: &str = "COACHDESK_SEED";
/// Hour of day (UTC) for the maintenance sweep.
pub const ENV_SWEEP_HOUR: &str = "COACHDESK_SWEEP_HOUR";
/// Comma-separated browser origins allowed to call the API.
pub const ENV_CORS_ORIGINS: &str = "COACHDESK_CORS_ORIGINS";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "./coachdesk.db";
const DEFAULT_SWEEP_HOUR: u32 = 1;

/// Runtime settings of the REST server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: SocketAddr,
    /// Directory of the durable store.
    pub data_dir: PathBuf,
    /// Load demo data on startup.
    pub seed: bool,
    /// Hour of day (0-23, UTC) at which the daily sweep runs.
    pub sweep_hour: u32,
    /// Browser origins (`scheme://host[:port]`) granted CORS access.
    /// Empty disables CORS.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            seed: false,
            sweep_hour: DEFAULT_SWEEP_HOUR,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` for unparseable values.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, one call per variable.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` for unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let bind = setting(&lookup, ENV_BIND, DEFAULT_BIND);
        let bind = bind.parse().map_err(|e| invalid(ENV_BIND, format!("'{bind}': {e}")))?;

        let data_dir = PathBuf::from(setting(&lookup, ENV_DATA_DIR, DEFAULT_DATA_DIR));

        let seed = match setting(&lookup, ENV_SEED, "false").trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            other => return Err(invalid(ENV_SEED, format!("'{other}' is not a boolean"))),
        };

        let hour = setting(&lookup, ENV_SWEEP_HOUR, "1");
        let sweep_hour = hour
            .trim()
            .parse()
            .map_err(|e| invalid(ENV_SWEEP_HOUR, format!("'{hour}': {e}")))?;

        let cors_origins = setting(&lookup, ENV_CORS_ORIGINS, "")
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        let config = Self {
            bind,
            data_dir,
            seed,
            sweep_hour,
            cors_origins,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates field ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` when the sweep hour is not a
    /// valid hour of day or an origin is not `http(s)://host[:port]`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_hour > 23 {
            return Err(invalid("sweep_hour", format!("{} is not within [0, 23]", self.sweep_hour)));
        }
        for origin in &self.cors_origins {
            let host = origin
                .strip_prefix("https://")
                .or_else(|| origin.strip_prefix("http://"))
                .unwrap_or_default();
            if host.is_empty() || host.contains('/') {
                return Err(invalid("cors_origins", format!("'{origin}' is not an origin")));
            }
        }
        Ok(())
    }
}

fn setting(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    if let Some(value) = lookup(key) {
        return value;
    }
    tracing::warn!(variable = key, default, "environment variable not set, using default");
    default.to_string()
}

fn invalid(field: &str, reason: String) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        reason,
    }
}
