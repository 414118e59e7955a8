//! Collaborator traits the session core depends on.
//!
//! Exam acquisition is implemented by `examkit-sources`; notification sinks
//! are provided by whatever hosts the session (the CLI, a GUI, tests).

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::{RawExam, StartExamRequest};
use crate::security::Violation;
use crate::submission::SubmitReason;

// ---------------------------------------------------------------------------
// Exam acquisition
// ---------------------------------------------------------------------------

/// Fetches an exam attempt and its questions.
///
/// Errors should carry a human-readable message; the controller shows it to
/// the student as-is.
#[async_trait]
pub trait ExamSource: Send + Sync {
    /// Short source name for logs (e.g. "http").
    fn name(&self) -> &str;

    /// Acquire the exam for a student.
    async fn start_exam(&self, request: &StartExamRequest) -> anyhow::Result<RawExam>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Transient advisory message for the student.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Cached progress was applied at start.
    ProgressRestored { answered: usize },
    /// An integrity violation was recorded. `limit` is `max_violations + 1`.
    ViolationWarning {
        violation: Violation,
        count: u32,
        limit: u32,
    },
    /// The violation limit was exceeded; the exam is being submitted.
    MaxViolationsReached,
    /// The exam was submitted.
    Submitted { reason: SubmitReason },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ProgressRestored { answered } => {
                write!(f, "Progress restored ({answered} answered)")
            }
            Notice::ViolationWarning {
                violation,
                count,
                limit,
            } => write!(f, "Warning {count}/{limit}: {}", violation.message),
            Notice::MaxViolationsReached => {
                write!(f, "Maximum violations reached. Your exam is being submitted.")
            }
            Notice::Submitted { reason } => write!(f, "Exam submitted ({reason})"),
        }
    }
}

/// Fire-and-forget receiver of notices.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Discards every notice.
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, _: Notice) {}
}

/// Keeps every notice in memory. Useful for tests and headless hosts.
#[derive(Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
