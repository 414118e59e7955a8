//! Core data model types for examkit.
//!
//! Raw types mirror the acquisition wire format; `Session` and `Question`
//! are the immutable internal shapes the controller works with.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an exam as issued by the assessment platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamId(String);

impl ExamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-issued question identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u64);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-issued option identifier. This is what gets submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub u64);

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locally selected option index per question. Absence means unanswered.
pub type AnswerMap = BTreeMap<QuestionId, usize>;

/// Questions marked "review later".
pub type FlagSet = BTreeSet<QuestionId>;

/// Request sent to the exam acquisition collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExamRequest {
    pub student_id: String,
    pub exam_id: ExamId,
    #[serde(default)]
    pub is_demo: bool,
}

// ---------------------------------------------------------------------------
// Raw acquisition response
// ---------------------------------------------------------------------------

/// Exam as returned by the acquisition call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExam {
    pub exam_title: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub class_name: String,
    pub exam_duration_minutes: u32,
    #[serde(default)]
    pub question_list: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    pub question_id: QuestionId,
    pub question_text: String,
    #[serde(default)]
    pub chapter_name: String,
    #[serde(default)]
    pub chapter_id: Option<u64>,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub option_list: Vec<RawOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOption {
    pub option_id: OptionId,
    pub option_text: String,
}

// ---------------------------------------------------------------------------
// Internal shapes
// ---------------------------------------------------------------------------

/// One acquired exam attempt. Immutable after acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub exam_id: ExamId,
    pub student_id: String,
    pub title: String,
    pub subject_name: String,
    pub class_name: String,
    pub duration_minutes: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub is_demo: bool,
}

impl Session {
    /// Build a session from the acquisition response.
    pub fn from_raw(request: &StartExamRequest, raw: &RawExam, started_at: DateTime<Utc>) -> Self {
        Self {
            exam_id: request.exam_id.clone(),
            student_id: request.student_id.clone(),
            title: raw.exam_title.clone(),
            subject_name: raw.subject_name.clone(),
            class_name: raw.class_name.clone(),
            duration_minutes: raw.exam_duration_minutes,
            started_at,
            is_demo: request.is_demo,
        }
    }

    /// Full exam duration in seconds.
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }
}

/// A question with its options.
///
/// Option texts and option identifiers are parallel vectors: position `i` of
/// one always describes the same option as position `i` of the other. Both are
/// private and only ever built together, so they cannot be reordered apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    option_texts: Vec<String>,
    option_ids: Vec<OptionId>,
    pub difficulty: Option<String>,
    pub chapter_id: Option<u64>,
    pub chapter_name: String,
    pub question_type: String,
}

impl Question {
    /// Map a raw question, keeping option text/id pairing by position.
    pub fn from_raw(raw: &RawQuestion) -> Self {
        let (option_texts, option_ids) = raw
            .option_list
            .iter()
            .map(|o| (o.option_text.clone(), o.option_id))
            .unzip();

        Self {
            id: raw.question_id,
            text: raw.question_text.clone(),
            option_texts,
            option_ids,
            difficulty: raw.difficulty.clone(),
            chapter_id: raw.chapter_id,
            chapter_name: raw.chapter_name.clone(),
            question_type: raw.question_type.clone(),
        }
    }

    /// Build a question directly from `(option id, option text)` pairs.
    pub fn new(id: QuestionId, text: impl Into<String>, options: Vec<(OptionId, String)>) -> Self {
        let (option_ids, option_texts) = options.into_iter().unzip();
        Self {
            id,
            text: text.into(),
            option_texts,
            option_ids,
            difficulty: None,
            chapter_id: None,
            chapter_name: String::new(),
            question_type: "single_choice".to_string(),
        }
    }

    pub fn option_count(&self) -> usize {
        self.option_ids.len()
    }

    pub fn option_texts(&self) -> &[String] {
        &self.option_texts
    }

    pub fn option_ids(&self) -> &[OptionId] {
        &self.option_ids
    }

    /// External identifier of the option at `index`, if in range.
    pub fn option_id(&self, index: usize) -> Option<OptionId> {
        self.option_ids.get(index).copied()
    }

    /// Iterate `(option id, option text)` in display order.
    pub fn options(&self) -> impl Iterator<Item = (OptionId, &str)> {
        self.option_ids
            .iter()
            .copied()
            .zip(self.option_texts.iter().map(String::as_str))
    }
}
