//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;
use word_study_core::DEFAULT_LANGUAGE;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Browser origin allowed by CORS.
    pub cors_origin: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    /// Model behind passage, unit, morphology and free-question generation.
    pub generation_model: String,
    /// Cheaper model used to fill quiz question banks.
    pub quiz_model: String,
    /// Output language when a request does not name one.
    pub default_language: String,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and Database ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let max_connections_str = var_or("DB_MAX_CONNECTIONS", "5");
        let db_max_connections = match max_connections_str.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "DB_MAX_CONNECTIONS".to_string(),
                    format!("'{}' is not a positive integer", max_connections_str),
                ))
            }
        };

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let generation_model = var_or("GENERATION_MODEL", "gpt-4o");
        let quiz_model = var_or("QUIZ_MODEL", "gpt-4o-mini");
        let default_language = var_or("DEFAULT_LANGUAGE", DEFAULT_LANGUAGE);

        Ok(Self {
            bind_address,
            cors_origin,
            database_url,
            db_max_connections,
            log_level,
            openai_api_key,
            generation_model,
            quiz_model,
            default_language,
        })
    }
}
