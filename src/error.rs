//! Error types for the Kolosal experiment engine

use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the experiment engine
#[derive(Error, Debug)]
pub enum KolosalError {
    /// Invalid combination of experiment options
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// `transform` was called on a step that has not been fitted
    #[error("Step '{step}' is not fitted; call fit_transform first")]
    ModelNotFitted { step: String },

    /// Failure raised by an injected collaborator (cleaner, detector, search engine, ...)
    #[error("{collaborator} failed: {message}")]
    Collaborator { collaborator: String, message: String },

    /// Row or column misalignment between parts of a dataset
    #[error("Alignment error: {0}")]
    AlignmentError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl KolosalError {
    /// Wrap an error raised inside a collaborator
    pub fn collaborator(collaborator: impl Into<String>, err: impl std::fmt::Display) -> Self {
        KolosalError::Collaborator {
            collaborator: collaborator.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn not_fitted(step: &str) -> Self {
        KolosalError::ModelNotFitted {
            step: step.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
