use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AnalyzerError, Result};

/// Kinds of per-job JSON documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Transcript,
    Graph,
    CognitiveLoad,
    Chapters,
    StrData,
}

impl Artifact {
    pub const ALL: [Artifact; 5] = [
        Artifact::Transcript,
        Artifact::Graph,
        Artifact::CognitiveLoad,
        Artifact::Chapters,
        Artifact::StrData,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Artifact::Transcript => "transcript",
            Artifact::Graph => "graph",
            Artifact::CognitiveLoad => "cognitive_load",
            Artifact::Chapters => "chapters",
            Artifact::StrData => "str_data",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Artifact {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Artifact::ALL
            .into_iter()
            .find(|a| a.name() == normalized)
            .ok_or_else(|| format!("unknown artifact '{}'", s))
    }
}

/// Reject ids that could escape the jobs directory
pub fn validate_job_id(job_id: &str) -> Result<()> {
    let invalid = job_id.trim().is_empty()
        || job_id.contains('/')
        || job_id.contains('\\')
        || job_id.contains("..")
        || job_id.contains('\0');

    if invalid {
        Err(AnalyzerError::InvalidJobId(job_id.to_string()))
    } else {
        Ok(())
    }
}

/// Per-job JSON artifacts stored as `{job_id}_{artifact}.json`
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs_dir: PathBuf,
}

impl JobStore {
    pub async fn new(jobs_dir: impl Into<PathBuf>) -> Result<Self> {
        let jobs_dir = jobs_dir.into();
        fs::create_dir_all(&jobs_dir).await?;
        debug!("📁 Job store at {}", jobs_dir.display());
        Ok(Self { jobs_dir })
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    pub fn path_for(&self, job_id: &str, artifact: Artifact) -> Result<PathBuf> {
        validate_job_id(job_id)?;
        Ok(self.jobs_dir.join(format!("{}_{}.json", job_id, artifact.name())))
    }

    /// Pretty-printed write through a temporary file and rename, so readers
    /// never see a partial document
    pub async fn save<T: Serialize + ?Sized>(&self, job_id: &str, artifact: Artifact, value: &T) -> Result<PathBuf> {
        let path = self.path_for(job_id, artifact)?;
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(value)?;
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!("💾 Saved {} for job {}", artifact, job_id);
        Ok(path)
    }

    pub async fn load<T: DeserializeOwned>(&self, job_id: &str, artifact: Artifact) -> Result<T> {
        let path = self.path_for(job_id, artifact)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyzerError::ArtifactNotFound {
                    job_id: job_id.to_string(),
                    artifact: artifact.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn exists(&self, job_id: &str, artifact: Artifact) -> Result<bool> {
        let path = self.path_for(job_id, artifact)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Artifacts present on disk for a job
    pub async fn artifacts(&self, job_id: &str) -> Result<Vec<Artifact>> {
        let mut present = Vec::new();
        for artifact in Artifact::ALL {
            if self.exists(job_id, artifact).await? {
                present.push(artifact);
            }
        }
        Ok(present)
    }

    pub async fn remove_job(&self, job_id: &str) -> Result<usize> {
        let mut removed = 0;
        for artifact in self.artifacts(job_id).await? {
            fs::remove_file(self.path_for(job_id, artifact)?).await?;
            removed += 1;
        }
        if removed > 0 {
            info!("🧹 Removed {} artifacts for job {}", removed, job_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TranscriptSegment;
    use tempfile::TempDir;

    #[test]
    fn test_job_id_validation() {
        assert!(validate_job_id("job-42").is_ok());
        assert!(validate_job_id("").is_err());
        assert!(validate_job_id("../etc").is_err());
        assert!(validate_job_id("a/b").is_err());
        assert!(validate_job_id("a\\b").is_err());
    }

    #[test]
    fn test_artifact_names_parse() {
        assert_eq!("cognitive-load".parse::<Artifact>().unwrap(), Artifact::CognitiveLoad);
        assert_eq!("str_data".parse::<Artifact>().unwrap(), Artifact::StrData);
        assert!("video".parse::<Artifact>().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load_artifact() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path()).await.unwrap();
        let transcript = vec![TranscriptSegment::new(0.0, 1.0, "hi")];

        let path = store.save("job1", Artifact::Transcript, &transcript).await.unwrap();
        assert!(path.ends_with("job1_transcript.json"));
        assert!(!dir.path().join("job1_transcript.json.tmp").exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  "), "artifact should be indented");

        let loaded: Vec<TranscriptSegment> = store.load("job1", Artifact::Transcript).await.unwrap();
        assert_eq!(loaded, transcript);
        assert_eq!(store.artifacts("job1").await.unwrap(), vec![Artifact::Transcript]);
    }

    #[tokio::test]
    async fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path()).await.unwrap();
        let err = store
            .load::<serde_json::Value>("job1", Artifact::Graph)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::ArtifactNotFound { .. }));
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_io() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path()).await.unwrap();
        let err = store.save("../escape", Artifact::Graph, &1).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidJobId(_)));
    }

    #[tokio::test]
    async fn test_remove_job() {
        let dir = TempDir::new().unwrap();
        let store = JobStore::new(dir.path()).await.unwrap();
        store.save("j", Artifact::Graph, &serde_json::json!({})).await.unwrap();
        store.save("j", Artifact::Chapters, &serde_json::json!([])).await.unwrap();
        assert_eq!(store.remove_job("j").await.unwrap(), 2);
        assert!(store.artifacts("j").await.unwrap().is_empty());
    }
}
