//! Acquisition error types.

use thiserror::Error;

/// Errors that can occur while acquiring an exam.
///
/// Messages are shown to the student as-is.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No exam with this id exists (or it is not open to the student).
    #[error("exam not found: {0}")]
    ExamNotFound(String),

    /// The server refused to start the exam.
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The exam could not be decoded.
    #[error("invalid exam data: {0}")]
    InvalidExam(String),
}
