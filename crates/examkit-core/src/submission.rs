//! Submission assembly.
//!
//! `assemble_submission` maps locally selected option indices to the
//! server's option identifiers. It is pure; the controller wraps its output
//! in an `ExamSubmission` envelope before handing it to the results sink.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AnswerMap, OptionId, Question, QuestionId, Session};

/// What ended the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    /// The student submitted.
    Manual,
    /// The countdown reached zero.
    TimeUp,
    /// The integrity monitor ran out of chances.
    MaxViolations,
    /// The host's input stream closed.
    InputClosed,
}

impl fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitReason::Manual => write!(f, "submitted by student"),
            SubmitReason::TimeUp => write!(f, "time is up"),
            SubmitReason::MaxViolations => write!(f, "too many violations"),
            SubmitReason::InputClosed => write!(f, "input closed"),
        }
    }
}

/// The externally addressable result of an exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    /// Always `None` here; the server computes the authoritative score.
    pub score: Option<u32>,
    pub total_questions: usize,
    /// Question id to the chosen option's server id. Unanswered questions are absent.
    pub answers: BTreeMap<QuestionId, OptionId>,
    /// Full question list, for rendering a later review.
    pub questions: Vec<Question>,
    pub session: Session,
}

/// Build the submission payload.
///
/// Questions without an answer, and answers whose index is outside the
/// question's options, are left out entirely.
pub fn assemble_submission(
    questions: &[Question],
    answers: &AnswerMap,
    session: &Session,
) -> SubmissionPayload {
    let answers = questions
        .iter()
        .filter_map(|q| {
            let index = *answers.get(&q.id)?;
            q.option_id(index).map(|option| (q.id, option))
        })
        .collect();

    SubmissionPayload {
        score: None,
        total_questions: questions.len(),
        answers,
        questions: questions.to_vec(),
        session: session.clone(),
    }
}

/// A finished attempt, as handed to the results sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSubmission {
    pub id: Uuid,
    pub reason: SubmitReason,
    pub submitted_at: DateTime<Utc>,
    /// Seconds left on the clock at submission.
    pub time_left_secs: u32,
    /// Integrity violations counted during the attempt.
    pub violations: u32,
    /// Questions still flagged for review. Advisory only.
    #[serde(default)]
    pub flagged: Vec<QuestionId>,
    pub payload: SubmissionPayload,
}

impl ExamSubmission {
    pub fn answered(&self) -> usize {
        self.payload.answers.len()
    }

    pub fn total(&self) -> usize {
        self.payload.total_questions
    }

    /// Save the submission as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize submission")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write submission to {}", path.display()))?;
        Ok(())
    }

    /// Load a submission from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read submission from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse submission JSON")
    }
}
