pub mod whisper;

pub use whisper::WhisperTranscriber;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{AnalyzerError, Result};
use crate::types::{transcript_duration, validate_segments, TranscriptSegment};

/// Speech-to-text settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whisper model name (tiny, base, small, medium, large)
    pub model: String,
    /// Language hint; detected when unset
    pub language: Option<String>,
    /// Give up on a single video after this many seconds
    pub timeout_seconds: u64,
    pub fp16: bool,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: "small".to_string(),
            language: None,
            timeout_seconds: 3600,
            fp16: false,
        }
    }
}

/// Transcript of one media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    pub duration: f64,
    pub segments: Vec<TranscriptSegment>,
    /// Language code detected (or forced) during transcription
    pub language: Option<String>,
}

impl TranscriptionOutput {
    /// Validate and sort segments; duration is the last segment end
    pub fn from_segments(segments: Vec<TranscriptSegment>, language: Option<String>) -> Result<Self> {
        let segments = validate_segments(segments)?;
        Ok(Self {
            duration: transcript_duration(&segments),
            segments,
            language,
        })
    }
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path, language: Option<&str>) -> Result<TranscriptionOutput>;
}

/// Read a JSON array of `{start, end, text}` segments from disk
pub async fn load_transcript_file(path: &Path) -> Result<Vec<TranscriptSegment>> {
    let content = tokio::fs::read_to_string(path).await?;
    let segments: Vec<TranscriptSegment> = serde_json::from_str(&content)?;
    let segments = validate_segments(segments)?;
    info!("📄 Loaded {} transcript segments from {}", segments.len(), path.display());
    Ok(segments)
}

/// Transcriber used when no speech-to-text back-end is configured
pub struct UnavailableTranscriber {
    pub reason: String,
}

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn transcribe(&self, _path: &Path, _language: Option<&str>) -> Result<TranscriptionOutput> {
        Err(AnalyzerError::CollaboratorUnavailable {
            name: "transcriber".to_string(),
            reason: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_transcript_file_sorts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.json");
        tokio::fs::write(
            &path,
            r#"[{"start": 5.0, "end": 9.0, "text": "second"}, {"start": 0.0, "end": 5.0, "text": "first"}]"#,
        )
        .await
        .unwrap();

        let segments = load_transcript_file(&path).await.unwrap();
        assert_eq!(segments[0].text, "first");
    }

    #[tokio::test]
    async fn test_load_transcript_rejects_bad_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transcript.json");
        tokio::fs::write(&path, r#"[{"start": 5.0, "end": 1.0, "text": "bad"}]"#)
            .await
            .unwrap();

        let err = load_transcript_file(&path).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidSegment { .. }));
    }

    #[test]
    fn test_output_duration_is_last_end() {
        let output = TranscriptionOutput::from_segments(
            vec![TranscriptSegment::new(0.0, 4.0, "a"), TranscriptSegment::new(3.0, 12.5, "b")],
            Some("en".to_string()),
        )
        .unwrap();
        assert_eq!(output.duration, 12.5);
    }

    #[test]
    fn test_unavailable_transcriber() {
        let transcriber = UnavailableTranscriber {
            reason: "not configured".to_string(),
        };
        tokio_test::block_on(async {
            let err = transcriber.transcribe(Path::new("x.mp4"), None).await.unwrap_err();
            assert!(matches!(err, AnalyzerError::CollaboratorUnavailable { .. }));
        });
    }
}
