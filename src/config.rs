//! Environment-driven settings, resolved once at the composition boundary.

use crate::chunker::DEFAULT_WINDOW_SIZE;
use crate::embeddings::DEFAULT_DIMENSIONS;
use crate::ingestion::DEFAULT_ADMIN_ROLE;
use crate::retrieval::DEFAULT_TOP_K;
use crate::types::RagError;

/// Runtime settings for the ingestion/retrieval stack.
///
/// Every field has a default; [`Settings::from_env`] overrides from
/// `RAGVAULT_*` environment variables (a `.env` file is honored via
/// `dotenvy`).
#[derive(Clone, Debug)]
pub struct Settings {
    /// Path of the SQLite database file holding the collection.
    pub db_path: String,
    /// HTTP endpoint of the embedding inference service.
    pub embedding_endpoint: String,
    /// Model identifier sent with every embedding request.
    pub embedding_model: String,
    /// Fixed embedding dimension of the collection.
    pub embedding_dimensions: usize,
    /// Tokens per chunk window.
    pub chunk_window: usize,
    /// Default number of similarity hits per retrieval.
    pub top_k: usize,
    /// Role granted to documents ingested without explicit roles.
    pub default_role: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: "ragvault.sqlite".to_string(),
            embedding_endpoint: "http://localhost:8080/embed".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimensions: DEFAULT_DIMENSIONS,
            chunk_window: DEFAULT_WINDOW_SIZE,
            top_k: DEFAULT_TOP_K,
            default_role: DEFAULT_ADMIN_ROLE.to_string(),
        }
    }
}

impl Settings {
    /// Resolves settings from the environment, falling back to defaults.
    ///
    /// Malformed numeric values are configuration errors, not panics.
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();

        let mut settings = Self::default();
        if let Ok(db_path) = std::env::var("RAGVAULT_DB_PATH") {
            settings.db_path = db_path;
        }
        if let Ok(endpoint) = std::env::var("RAGVAULT_EMBEDDING_URL") {
            settings.embedding_endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("RAGVAULT_EMBEDDING_MODEL") {
            settings.embedding_model = model;
        }
        if let Ok(dimensions) = std::env::var("RAGVAULT_EMBEDDING_DIM") {
            settings.embedding_dimensions = parse_positive("RAGVAULT_EMBEDDING_DIM", &dimensions)?;
        }
        if let Ok(window) = std::env::var("RAGVAULT_CHUNK_WINDOW") {
            settings.chunk_window = parse_positive("RAGVAULT_CHUNK_WINDOW", &window)?;
        }
        if let Ok(top_k) = std::env::var("RAGVAULT_TOP_K") {
            settings.top_k = parse_positive("RAGVAULT_TOP_K", &top_k)?;
        }
        if let Ok(role) = std::env::var("RAGVAULT_DEFAULT_ROLE") {
            settings.default_role = role;
        }
        Ok(settings)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, RagError> {
    match value.parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(RagError::Config {
            key: key.to_string(),
            message: format!("must be a positive integer, got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let settings = Settings::default();
        assert_eq!(settings.embedding_dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(settings.chunk_window, DEFAULT_WINDOW_SIZE);
        assert_eq!(settings.top_k, DEFAULT_TOP_K);
        assert_eq!(settings.default_role, DEFAULT_ADMIN_ROLE);
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(parse_positive("K", "12").is_ok());
        assert!(parse_positive("K", "0").is_err());
        assert!(parse_positive("K", "many").is_err());
    }
}
