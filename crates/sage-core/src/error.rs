//! Error types for the sage core library

use thiserror::Error;

/// Result type alias for core operations
pub type SageResult<T> = Result<T, SageError>;

#[derive(Error, Debug)]
pub enum SageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported attachment '{0}': expected an image or a PDF")]
    UnsupportedAttachment(String),

    #[error("Audio device error: {0}")]
    Audio(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<cpal::DevicesError> for SageError {
    fn from(err: cpal::DevicesError) -> Self {
        SageError::Audio(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for SageError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        SageError::Audio(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for SageError {
    fn from(err: cpal::BuildStreamError) -> Self {
        SageError::Audio(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for SageError {
    fn from(err: cpal::PlayStreamError) -> Self {
        SageError::Audio(err.to_string())
    }
}

impl From<hound::Error> for SageError {
    fn from(err: hound::Error) -> Self {
        SageError::Audio(err.to_string())
    }
}
