//! Service configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Environment variable that overrides `database_path`.
pub const DATABASE_PATH_ENV: &str = "BANQI_DATABASE_PATH";

/// Settings for the game service, loaded from TOML.
///
/// ```toml
/// database_path = "banqi.db"
/// max_commit_attempts = 3
///
/// [tokens]
/// "alice-secret" = "alice"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    database_path: String,

    /// How many times a move is re-validated after losing a commit race.
    #[serde(default = "default_max_commit_attempts")]
    max_commit_attempts: u32,

    /// Bearer token to player id.
    #[serde(default)]
    tokens: HashMap<String, String>,
}

#[instrument]
fn default_database_path() -> String {
    "banqi.db".to_string()
}

#[instrument]
fn default_max_commit_attempts() -> u32 {
    3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            max_commit_attempts: default_max_commit_attempts(),
            tokens: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not valid configuration.
    #[instrument(skip(content))]
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        if config.max_commit_attempts == 0 {
            return Err(ConfigError::new(
                "max_commit_attempts must be at least 1".to_string(),
            ));
        }
        debug!(tokens = config.tokens.len(), "Config parsed");
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!(database_path = %config.database_path, "Config loaded successfully");
        Ok(config)
    }

    /// Loads the file if it exists, otherwise starts from defaults, then
    /// applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            warn!("Config file not found, using defaults");
            Self::default()
        };
        if let Ok(db_path) = std::env::var(DATABASE_PATH_ENV) {
            debug!(%db_path, "Database path overridden by environment");
            config.database_path = db_path;
        }
        Ok(config)
    }

    /// Replaces the database path.
    pub fn with_database_path(mut self, database_path: impl Into<String>) -> Self {
        self.database_path = database_path.into();
        self
    }

    /// Adds a token for a player.
    pub fn with_token(mut self, token: impl Into<String>, player_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), player_id.into());
        self
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
