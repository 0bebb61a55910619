// ABOUTME: Error types for the markdownreveal application
// ABOUTME: Provides structured error handling for each stage of the live-edit pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevealError {
    #[error("Failed to read file: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("Configuration file not found: {0}")]
    ConfigurationMissing(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(#[from] serde_yml::Error),

    #[error("Failed to prepare asset bundle {bundle}: {message}")]
    AssetFetchFailure { bundle: String, message: String },

    #[error("Markdown conversion error: {0}")]
    ConversionFailure(String),

    #[error("Anchor not found for {feature}: no line matches {anchor:?}")]
    AnchorNotFound {
        feature: &'static str,
        anchor: &'static str,
    },

    #[error("Failed to mirror source directory: {0}")]
    SyncFailure(String),

    #[error("Path not found: {0}")]
    PathNotFoundError(PathBuf),

    #[error("Input validation error: {0}")]
    ValidationError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Failed to send reload notification: {0}")]
    NotifyError(#[from] reqwest::Error),

    #[error("{0}")]
    UnknownError(String),
}

impl From<anyhow::Error> for RevealError {
    fn from(err: anyhow::Error) -> Self {
        RevealError::UnknownError(err.to_string())
    }
}

impl From<notify::Error> for RevealError {
    fn from(err: notify::Error) -> Self {
        RevealError::WatchError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RevealError>;
