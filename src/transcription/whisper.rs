use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{Transcriber, TranscriptionOutput, TranscriptionSettings};
use crate::error::{AnalyzerError, Result};
use crate::types::{round_time, TranscriptSegment};

/// JSON document written by `whisper --output_format json`
#[derive(Debug, Deserialize)]
struct WhisperJson {
    #[serde(default)]
    segments: Vec<WhisperSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    text: String,
}

/// Runs the OpenAI Whisper command-line tool
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    settings: TranscriptionSettings,
    binary: String,
    work_root: PathBuf,
}

impl WhisperTranscriber {
    pub fn new(settings: TranscriptionSettings) -> Self {
        Self {
            settings,
            binary: "whisper".to_string(),
            work_root: std::env::temp_dir(),
        }
    }

    /// Use a different executable (a wrapper script or full path)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_work_root(mut self, work_root: impl Into<PathBuf>) -> Self {
        self.work_root = work_root.into();
        self
    }

    fn command(&self, media: &Path, output_dir: &Path, language: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(media)
            .arg("--model")
            .arg(&self.settings.model)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False")
            .arg("--fp16")
            .arg(if self.settings.fp16 { "True" } else { "False" });

        if let Some(language) = language.or(self.settings.language.as_deref()) {
            cmd.arg("--language").arg(language);
        }

        cmd.stdout(Stdio::null()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    fn failure(path: &Path, reason: impl Into<String>) -> AnalyzerError {
        AnalyzerError::TranscriptionFailed {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    async fn run(&self, media: &Path, output_dir: &Path, language: Option<&str>) -> Result<TranscriptionOutput> {
        let mut cmd = self.command(media, output_dir, language);
        debug!("Executing command: {:?}", cmd);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnalyzerError::CollaboratorUnavailable {
                    name: self.binary.clone(),
                    reason: "executable not found; install openai-whisper".to_string(),
                }
            } else {
                Self::failure(media, format!("failed to start {}: {}", self.binary, e))
            }
        })?;

        let timeout = Duration::from_secs(self.settings.timeout_seconds);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                error!("⏰ Whisper timed out after {}s on {}", timeout.as_secs(), media.display());
                return Err(Self::failure(media, format!("timed out after {}s", timeout.as_secs())));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or_default();
            error!("❌ Whisper failed with {}: {}", output.status, last_line);
            return Err(Self::failure(media, format!("exit status {}: {}", output.status, last_line)));
        }

        let stem = media.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = output_dir.join(format!("{}.json", stem));
        let content = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| Self::failure(media, format!("missing output {}: {}", json_path.display(), e)))?;

        parse_whisper_json(&content, language)
    }
}

/// Convert Whisper's JSON output into validated transcript segments.
/// Times are rounded to milliseconds and text is trimmed.
pub fn parse_whisper_json(content: &str, forced_language: Option<&str>) -> Result<TranscriptionOutput> {
    let parsed: WhisperJson = serde_json::from_str(content)?;
    let segments = parsed
        .segments
        .into_iter()
        .map(|s| TranscriptSegment::new(round_time(s.start), round_time(s.end), s.text.trim()))
        .collect();

    let language = parsed.language.or_else(|| forced_language.map(str::to_string));
    TranscriptionOutput::from_segments(segments, language)
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, path: &Path, language: Option<&str>) -> Result<TranscriptionOutput> {
        if !path.exists() {
            return Err(Self::failure(path, "file does not exist"));
        }

        let started = Instant::now();
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let work_dir = self.work_root.join(format!(
            "lecture-lens-whisper-{}-{}",
            stem,
            chrono::Utc::now().timestamp_millis()
        ));
        tokio::fs::create_dir_all(&work_dir).await?;

        info!("🎤 Transcribing {} with Whisper '{}'", path.display(), self.settings.model);
        let result = self.run(path, &work_dir, language).await;
        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        let output = result?;
        info!(
            "✅ Transcribed {:.1}s of media into {} segments in {:.1}s",
            output.duration,
            output.segments.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_whisper_json() {
        let json = r#"{
            "text": " Hello there. General idea.",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.4567, "text": " Hello there.", "avg_logprob": -0.2},
                {"id": 1, "start": 2.4567, "end": 5.0, "text": " General idea."}
            ],
            "language": "en"
        }"#;

        let output = parse_whisper_json(json, None).unwrap();
        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.segments[0].text, "Hello there.");
        assert_eq!(output.segments[0].end, 2.457);
        assert_eq!(output.duration, 5.0);
        assert_eq!(output.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_forced_language_used_when_missing() {
        let output = parse_whisper_json(r#"{"segments": []}"#, Some("ko")).unwrap();
        assert_eq!(output.language.as_deref(), Some("ko"));
        assert_eq!(output.duration, 0.0);
    }

    #[test]
    fn test_command_arguments() {
        let settings = TranscriptionSettings {
            language: Some("ko".to_string()),
            ..TranscriptionSettings::default()
        };
        let transcriber = WhisperTranscriber::new(settings);
        let cmd = transcriber.command(Path::new("talk.mp4"), Path::new("/tmp/out"), None);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(args[0], "talk.mp4");
        assert!(args.windows(2).any(|w| w[0] == "--output_format" && w[1] == "json"));
        assert!(args.windows(2).any(|w| w[0] == "--language" && w[1] == "ko"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("talk.mp4");
        tokio::fs::write(&media, b"not really a video").await.unwrap();

        let transcriber = WhisperTranscriber::new(TranscriptionSettings::default())
            .with_binary("lecture-lens-no-such-whisper")
            .with_work_root(dir.path());
        let err = transcriber.transcribe(&media, None).await.unwrap_err();

        assert!(matches!(err, AnalyzerError::CollaboratorUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_missing_media_is_failure() {
        let transcriber = WhisperTranscriber::new(TranscriptionSettings::default());
        let err = transcriber
            .transcribe(Path::new("/definitely/not/here.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::TranscriptionFailed { .. }));
    }
}
