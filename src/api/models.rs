//! API data models

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AnalyzerError;
use crate::knowledge::KnowledgeGraph;
use crate::types::TranscriptSegment;

/// `POST /api/chapters`
#[derive(Debug, Deserialize)]
pub struct ChaptersRequest {
    pub segments: Vec<TranscriptSegment>,
    /// Defaults to the end of the last segment
    pub duration: Option<f64>,
    pub language: Option<String>,
}

/// `POST /api/cognitive-load`: either a stored job or inline documents
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CognitiveLoadRequest {
    pub job_id: Option<String>,
    pub transcript: Option<Vec<TranscriptSegment>>,
    pub graph: Option<KnowledgeGraph>,
    pub str_data: Option<Vec<TranscriptSegment>>,
    pub seed: Option<HashMap<String, f64>>,
    pub window_size: Option<f64>,
    pub segment_start: Option<f64>,
    pub segment_end: Option<f64>,
}

/// `POST /api/analyze`; the media file must already be on the server
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub job_id: String,
    pub video_path: PathBuf,
    pub language: Option<String>,
}

/// `POST /api/explain`
#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub job_id: Option<String>,
    pub segments: Option<Vec<TranscriptSegment>>,
    pub start: f64,
    pub end: f64,
    pub language: Option<String>,
}

/// `POST /api/translate`
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub texts: Option<Vec<String>>,
    pub target: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TranslateResponse {
    One { translation: String },
    Many { translations: Vec<String> },
}

/// `GET /api/wikipedia?q=...&lang=...&sentences=...`
#[derive(Debug, Deserialize)]
pub struct WikipediaQuery {
    pub q: String,
    #[serde(default = "default_wiki_lang")]
    pub lang: String,
    #[serde(default = "default_wiki_sentences")]
    pub sentences: usize,
}

fn default_wiki_lang() -> String {
    "en".to_string()
}

fn default_wiki_sentences() -> usize {
    3
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Analyzer errors rendered as JSON with a matching status code
#[derive(Debug)]
pub struct ApiError(pub AnalyzerError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            AnalyzerError::ArtifactNotFound { .. } => StatusCode::NOT_FOUND,
            AnalyzerError::CollaboratorUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AnalyzerError::InvalidRequest(message.into()))
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(error: AnalyzerError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {}", self.0);
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}
