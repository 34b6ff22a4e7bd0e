//! Error types for Conductor

use thiserror::Error;

/// Result type alias using Conductor's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Conductor
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM backend error (HTTP or API-level)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Structured LLM output could not be parsed
    #[error("LLM parse failure: {0}")]
    LlmParse(String),

    /// The definition catalog could not be reached
    #[error("Definitions unavailable: {0}")]
    DefinitionsUnavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Llm(_)
                | Error::Timeout(_)
                | Error::Database(_)
                | Error::DefinitionsUnavailable(_)
        )
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}

impl From<handlebars::TemplateError> for Error {
    fn from(err: handlebars::TemplateError) -> Self {
        Error::Config(format!("Invalid prompt template: {}", err))
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(err: handlebars::RenderError) -> Self {
        Error::Internal(format!("Template render error: {}", err))
    }
}
