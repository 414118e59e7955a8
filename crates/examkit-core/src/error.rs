//! Error types for the exam session core.
//!
//! Only failures that terminate an attempt surface here. Cache and detector
//! failures are swallowed where they happen and never reach the controller.

use thiserror::Error;

/// Errors returned by `SessionController`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The acquisition collaborator failed. Terminal for this attempt.
    #[error("failed to start exam: {0}")]
    Acquisition(String),

    /// `start` was called on a session that is already running or finished.
    #[error("session already started")]
    AlreadyStarted,
}

/// Errors raised while reading an exam file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported exam file extension: {0}")]
    UnsupportedFormat(String),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
