// Type definitions shared across the LLM, search and citation layers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub provider: String,
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    /// Ask the provider to ground its answer with live web search.
    #[serde(default)]
    pub web_search: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
    /// Web evidence the provider attached to the answer, if it searched.
    #[serde(default)]
    pub grounding: Vec<GroundingRecord>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One piece of web evidence reported by a search-capable step.
///
/// A record without a `text_segment` only registers the source; a record with
/// one also attributes that segment of the answer to the source.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroundingRecord {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl GroundingRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            domain: domain.into(),
            text_segment: None,
            confidence: None,
        }
    }

    pub fn with_claim(mut self, text_segment: impl Into<String>, confidence: Option<f64>) -> Self {
        self.text_segment = Some(text_segment.into());
        self.confidence = confidence;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("LLM API returned {status}: {message}")]
    LLMStatus { status: u16, message: String },

    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::LLMApi(_) | AppError::LLMStatus { .. } | AppError::Search(_) | AppError::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    /// Transport failures, rate limits and upstream 5xx may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(_) => true,
            AppError::LLMStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::NotFound("p1".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidRequest("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::LLMApi("down".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(AppError::Internal("oops".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_only_rate_limits_and_server_errors_are_transient() {
        let status = |status: u16| AppError::LLMStatus {
            status,
            message: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!AppError::LLMApi("unparsable reply".into()).is_transient());
    }

    #[test]
    fn test_grounding_record_builder() {
        let record = GroundingRecord::new("https://a.example", "A", "a.example")
            .with_claim("Revenue grew", Some(0.9));
        assert_eq!(record.text_segment.as_deref(), Some("Revenue grew"));
        assert_eq!(record.confidence, Some(0.9));
    }
}
