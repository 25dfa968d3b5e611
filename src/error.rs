use std::path::PathBuf;
use thiserror::Error;

/// Failures at the collaborator boundary of the analysis pipeline.
///
/// Stages that are designed to degrade gracefully (JSON recovery, boundary
/// extraction, chapter metadata, load aggregation) never produce these.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid transcript segment #{index}: {reason}")]
    InvalidSegment { index: usize, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    #[error("Artifact {artifact} not found for job {job_id}")]
    ArtifactNotFound { job_id: String, artifact: String },

    #[error("{name} is unavailable: {reason}")]
    CollaboratorUnavailable { name: String, reason: String },

    #[error("Transcription failed for {path}: {reason}")]
    TranscriptionFailed { path: PathBuf, reason: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzerError {
    /// Whether the error was caused by the caller's input rather than by us
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::InvalidSegment { .. }
                | AnalyzerError::InvalidRequest(_)
                | AnalyzerError::InvalidJobId(_)
                | AnalyzerError::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
