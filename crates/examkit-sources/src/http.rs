//! HTTP exam server source.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use examkit_core::model::{RawExam, StartExamRequest};
use examkit_core::traits::ExamSource;

use crate::error::SourceError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Acquires exams with `POST {base_url}/exam/start`.
pub struct HttpExamSource {
    base_url: String,
    api_token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpExamSource {
    pub fn new(base_url: &str, api_token: Option<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, api_token, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        base_url: &str,
        api_token: Option<String>,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.filter(|t| !t.is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Error body returned by the exam server.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body)
}

#[async_trait]
impl ExamSource for HttpExamSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(exam_id = %request.exam_id, demo = request.is_demo))]
    async fn start_exam(&self, request: &StartExamRequest) -> anyhow::Result<RawExam> {
        let mut builder = self
            .client
            .post(format!("{}/exam/start", self.base_url))
            .json(request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(self.timeout_secs)
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::AuthenticationFailed(error_message(body)).into());
        }
        if status == 404 {
            return Err(SourceError::ExamNotFound(request.exam_id.to_string()).into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Rejected {
                status,
                message: error_message(body),
            }
            .into());
        }

        let exam: RawExam = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidExam(format!("failed to parse response: {e}")))?;

        tracing::debug!(questions = exam.question_list.len(), "exam acquired");
        Ok(exam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> StartExamRequest {
        StartExamRequest {
            student_id: "s-42".into(),
            exam_id: "7".into(),
            is_demo: false,
        }
    }

    #[tokio::test]
    async fn successful_start() {
        let server = MockServer::start().await;

        let response_body = serde_json::json!({
            "examTitle": "Unit test",
            "subjectName": "Chemistry",
            "className": "11A",
            "examDurationMinutes": 40,
            "questionList": [{
                "questionId": 5,
                "questionText": "Symbol for gold?",
                "chapterName": "Elements",
                "chapterId": 2,
                "questionType": "single_choice",
                "optionList": [
                    {"optionId": 101, "optionText": "Ag"},
                    {"optionId": 103, "optionText": "Au"}
                ]
            }]
        });

        Mock::given(method("POST"))
            .and(path("/exam/start"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(serde_json::json!({
                "studentId": "s-42",
                "examId": "7",
                "isDemo": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let source = HttpExamSource::new(&server.uri(), Some("test-token".into())).unwrap();
        let exam = source.start_exam(&request()).await.unwrap();

        assert_eq!(exam.exam_title, "Unit test");
        assert_eq!(exam.exam_duration_minutes, 40);
        assert_eq!(exam.question_list[0].option_list[1].option_text, "Au");
    }

    #[tokio::test]
    async fn server_message_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exam/start"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"message": "Exam has already been taken"})),
            )
            .mount(&server)
            .await;

        let source = HttpExamSource::new(&server.uri(), None).unwrap();
        let err = source.start_exam(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Exam has already been taken (HTTP 409)");
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exam/start"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let source = HttpExamSource::new(&server.uri(), Some("bad".into())).unwrap();
        let err = source.start_exam(&request()).await.unwrap_err();
        assert!(err.to_string().contains("authentication failed: invalid token"));
    }

    #[tokio::test]
    async fn unknown_exam() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exam/start"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpExamSource::new(&format!("{}/", server.uri()), None).unwrap();
        let err = source.start_exam(&request()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SourceError>(),
            Some(SourceError::ExamNotFound(id)) if id == "7"
        ));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_exam() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exam/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let source = HttpExamSource::new(&server.uri(), None).unwrap();
        let err = source.start_exam(&request()).await.unwrap_err();
        assert!(err.to_string().starts_with("invalid exam data"));
    }
}
