//! Mock exam source for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examkit_core::model::{OptionId, QuestionId, RawExam, RawOption, RawQuestion, StartExamRequest};
use examkit_core::traits::ExamSource;

/// An exam source that serves a fixed exam, or fails with a fixed message.
pub struct MockExamSource {
    result: Result<RawExam, String>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<StartExamRequest>>,
}

impl MockExamSource {
    pub fn with_exam(exam: RawExam) -> Self {
        Self {
            result: Ok(exam),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A source whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<StartExamRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

/// A small exam with `questions` four-option questions. Option ids are
/// `question_id * 100 + n` for n in 1..=4.
pub fn sample_exam(questions: u64, duration_minutes: u32) -> RawExam {
    RawExam {
        exam_title: "Sample exam".into(),
        subject_name: "General".into(),
        class_name: "Demo".into(),
        exam_duration_minutes: duration_minutes,
        question_list: (1..=questions)
            .map(|id| RawQuestion {
                question_id: QuestionId(id),
                question_text: format!("Sample question {id}"),
                chapter_name: "Basics".into(),
                chapter_id: Some(1),
                question_type: "single_choice".into(),
                difficulty: Some("easy".into()),
                option_list: (1..=4)
                    .map(|n| RawOption {
                        option_id: OptionId(id * 100 + n),
                        option_text: format!("Choice {n}"),
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[async_trait]
impl ExamSource for MockExamSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_exam(&self, request: &StartExamRequest) -> anyhow::Result<RawExam> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        self.result.clone().map_err(|message| anyhow::anyhow!(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StartExamRequest {
        StartExamRequest {
            student_id: "s-1".into(),
            exam_id: "demo".into(),
            is_demo: true,
        }
    }

    #[tokio::test]
    async fn serves_fixed_exam() {
        let source = MockExamSource::with_exam(sample_exam(3, 10));
        let exam = source.start_exam(&request()).await.unwrap();

        assert_eq!(exam.question_list.len(), 3);
        assert_eq!(exam.question_list[2].option_list[0].option_id, OptionId(301));
        assert_eq!(source.call_count(), 1);
        assert_eq!(source.last_request(), Some(request()));
    }

    #[tokio::test]
    async fn failing_source() {
        let source = MockExamSource::failing("server unavailable");
        let err = source.start_exam(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "server unavailable");
        assert_eq!(source.call_count(), 1);
    }
}
