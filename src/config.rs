//! Configuration types.

use crate::error::ConfigError;

/// Server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP API binds to.
    pub port: u16,
    /// Path to the local database file.
    pub db_path: String,
    /// Whether to seed a default agent when the agents table is empty.
    pub auto_seed: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            db_path: "./data/agent-hire.db".to_string(),
            auto_seed: true,
        }
    }
}

impl ServerConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// - `AGENT_HIRE_PORT` — HTTP port (default 3000)
    /// - `AGENT_HIRE_DB_PATH` — database file path
    /// - `AGENT_HIRE_AUTO_SEED` — set to `false` to disable agent seeding
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match std::env::var("AGENT_HIRE_PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "AGENT_HIRE_PORT".to_string(),
                message: format!("'{v}' is not a valid port"),
            })?,
            Err(_) => defaults.port,
        };

        let db_path = std::env::var("AGENT_HIRE_DB_PATH").unwrap_or(defaults.db_path);

        let auto_seed = std::env::var("AGENT_HIRE_AUTO_SEED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(defaults.auto_seed);

        Ok(Self {
            port,
            db_path,
            auto_seed,
        })
    }
}
