//! services/rag/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

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
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    /// Embedding model used for both ingestion and querying. Changing it
    /// for an existing index is configuration drift, not a runtime error.
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_top_k: usize,
    pub snippet_max_chars: usize,
    pub index_ready_timeout: Duration,
    pub generation_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let embedding_dimension = parse_var("EMBEDDING_DIMENSION", 1536)?;
        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        // --- Load Pipeline Tunables ---
        let chunk_size = parse_var("CHUNK_SIZE", 1000)?;
        let chunk_overlap = parse_var("CHUNK_OVERLAP", 200)?;
        let retrieval_top_k = parse_var("RETRIEVAL_TOP_K", 5)?;
        let snippet_max_chars = parse_var("SNIPPET_MAX_CHARS", 250)?;
        let index_ready_timeout =
            Duration::from_millis(parse_var("INDEX_READY_TIMEOUT_MS", 30_000)? as u64);
        let generation_retries = parse_var("GENERATION_RETRIES", 3)? as u32;

        Ok(Self {
            database_url,
            log_level,
            openai_api_key,
            embedding_model,
            embedding_dimension,
            chat_model,
            chunk_size,
            chunk_overlap,
            retrieval_top_k,
            snippet_max_chars,
            index_ready_timeout,
            generation_retries,
        })
    }
}

/// Reads a numeric environment variable, falling back to a default.
fn parse_var(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
