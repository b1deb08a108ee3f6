use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Load(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Failures while reading question sets or topic configuration from a store.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Request for {resource} failed with status {status}")]
    HttpStatus { resource: String, status: u16 },
    #[error("HTTP request for {resource} failed: {source}")]
    Http {
        resource: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {resource}: {message}")]
    Parse { resource: String, message: String },
    #[error("Question {position} in {resource} is invalid: {reason}")]
    InvalidQuestion {
        resource: String,
        position: usize,
        reason: String,
    },
    #[error("Invalid resource address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session manager unavailable: {0}")]
    ManagerUnavailable(String),
    #[error("Session {0} is no longer running")]
    Closed(Uuid),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
