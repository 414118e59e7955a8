//! Exam file parser.
//!
//! Reads an exam in the acquisition wire shape from TOML or JSON, and checks
//! it for problems that would make an attempt unusable.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::ParseError;
use crate::model::RawExam;

/// Exam file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamFormat {
    Toml,
    Json,
}

impl ExamFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ExamFormat::Toml),
            Some("json") => Ok(ExamFormat::Json),
            other => Err(ParseError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Parse an exam file.
pub fn parse_exam_file(path: &Path) -> Result<RawExam> {
    let format = ExamFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam file: {}", path.display()))?;

    parse_exam_str(&content, format)
        .with_context(|| format!("failed to parse exam file: {}", path.display()))
}

/// Parse exam content (useful for testing).
pub fn parse_exam_str(content: &str, format: ExamFormat) -> Result<RawExam, ParseError> {
    let exam = match format {
        ExamFormat::Toml => toml::from_str(content)?,
        ExamFormat::Json => serde_json::from_str(content)?,
    };
    Ok(exam)
}

/// A problem found in an exam.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Question the warning refers to, if any.
    pub question_id: Option<u64>,
    pub message: String,
}

/// Validate an exam and return any warnings.
pub fn validate_exam(exam: &RawExam) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if exam.exam_duration_minutes == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "exam duration is zero minutes".into(),
        });
    }

    if exam.question_list.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "exam has no questions".into(),
        });
    }

    let mut seen_questions = HashSet::new();
    for q in &exam.question_list {
        let id = Some(q.question_id.0);

        if !seen_questions.insert(q.question_id) {
            warnings.push(ValidationWarning {
                question_id: id,
                message: "duplicate question id".into(),
            });
        }

        if q.question_text.trim().is_empty() {
            warnings.push(ValidationWarning {
                question_id: id,
                message: "question text is empty".into(),
            });
        }

        match q.option_list.len() {
            0 => warnings.push(ValidationWarning {
                question_id: id,
                message: "question has no options".into(),
            }),
            1 => warnings.push(ValidationWarning {
                question_id: id,
                message: "question has only one option".into(),
            }),
            _ => {}
        }

        let mut seen_options = HashSet::new();
        for option in &q.option_list {
            if !seen_options.insert(option.option_id) {
                warnings.push(ValidationWarning {
                    question_id: id,
                    message: format!("duplicate option id {}", option.option_id),
                });
            }
        }
    }

    warnings
}
