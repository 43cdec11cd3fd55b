use std::io;

/// Custom error type for ci_slack_notify operations
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Template parse error: {0}")]
    TemplateParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dispatch failed: {0}")]
    DispatchError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use NotifyError
pub type Result<T> = std::result::Result<T, NotifyError>;
