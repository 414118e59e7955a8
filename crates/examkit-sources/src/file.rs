//! Local exam directory source.
//!
//! Looks for `{dir}/{exam_id}.toml`, then `{dir}/{exam_id}.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use examkit_core::model::{ExamId, RawExam, StartExamRequest};
use examkit_core::parser::{parse_exam_str, ExamFormat};
use examkit_core::traits::ExamSource;

use crate::error::SourceError;

pub struct FileExamSource {
    dir: PathBuf,
}

impl FileExamSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Existing exam file for an id, if any.
    pub fn find(&self, exam_id: &ExamId) -> Option<(PathBuf, ExamFormat)> {
        [("toml", ExamFormat::Toml), ("json", ExamFormat::Json)]
            .into_iter()
            .map(|(ext, format)| (self.dir.join(format!("{exam_id}.{ext}")), format))
            .find(|(path, _)| path.is_file())
    }
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl ExamSource for FileExamSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn start_exam(&self, request: &StartExamRequest) -> anyhow::Result<RawExam> {
        let exam_id = &request.exam_id;
        if !is_plain_id(exam_id.as_str()) {
            return Err(SourceError::ExamNotFound(exam_id.to_string()).into());
        }

        let Some((path, format)) = self.find(exam_id) else {
            return Err(SourceError::ExamNotFound(exam_id.to_string()).into());
        };

        tracing::debug!(path = %path.display(), "reading exam file");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::InvalidExam(format!("{}: {e}", path.display())))?;

        let exam = parse_exam_str(&content, format)
            .map_err(|e| SourceError::InvalidExam(format!("{}: {e}", path.display())))?;
        Ok(exam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(exam: &str) -> StartExamRequest {
        StartExamRequest {
            student_id: "s-1".into(),
            exam_id: exam.into(),
            is_demo: true,
        }
    }

    const JSON_EXAM: &str = r#"{
        "examTitle": "Pop quiz",
        "examDurationMinutes": 5,
        "questionList": [
            {"questionId": 1, "questionText": "2+2?", "optionList": [
                {"optionId": 10, "optionText": "3"},
                {"optionId": 11, "optionText": "4"}
            ]}
        ]
    }"#;

    #[tokio::test]
    async fn reads_json_exam() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quiz-1.json"), JSON_EXAM).unwrap();

        let source = FileExamSource::new(dir.path());
        let exam = source.start_exam(&request("quiz-1")).await.unwrap();
        assert_eq!(exam.exam_title, "Pop quiz");
        assert_eq!(exam.question_list.len(), 1);
    }

    #[tokio::test]
    async fn prefers_toml_over_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.json"), JSON_EXAM).unwrap();
        std::fs::write(
            dir.path().join("q.toml"),
            "examTitle = \"From TOML\"\nexamDurationMinutes = 1\n",
        )
        .unwrap();

        let source = FileExamSource::new(dir.path());
        let exam = source.start_exam(&request("q")).await.unwrap();
        assert_eq!(exam.exam_title, "From TOML");
    }

    #[tokio::test]
    async fn missing_exam_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileExamSource::new(dir.path());

        let err = source.start_exam(&request("nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "exam not found: nope");
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileExamSource::new(dir.path());

        let err = source.start_exam(&request("../secret")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn malformed_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{\"examTitle\": 3}").unwrap();

        let source = FileExamSource::new(dir.path());
        let err = source.start_exam(&request("bad")).await.unwrap_err();
        assert!(err.to_string().starts_with("invalid exam data"));
    }
}
