use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::chapters::{ChapterOutcome, ChapterPipeline};
use crate::cognitive::{combine_segments, compute_load, CentralityMap};
use crate::config::Config;
use crate::error::{AnalyzerError, Result};
use crate::knowledge::{KnowledgeExtraction, SpoExtractor};
use crate::llm::{GenerationGateway, RetryPolicy, TargetLanguage, UnavailableLLM, LLM};
use crate::store::{validate_job_id, Artifact, JobStore};
use crate::transcription::Transcriber;
use crate::types::{CognitiveLoadSeries, TranscriptSegment};

/// What one analysis job produced
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub job_id: String,
    pub duration: f64,
    pub language: Option<String>,
    pub segment_count: usize,
    pub chapters: ChapterOutcome,
    pub graph_nodes: usize,
    pub graph_links: usize,
    pub skipped_chunks: usize,
    pub cognitive_load: CognitiveLoadSeries,
    pub artifacts: Vec<PathBuf>,
    pub processing_seconds: f64,
}

/// End-to-end job: transcribe, chapter, graph, load, persist
pub struct Analyzer {
    config: Arc<Config>,
    gateway: Arc<GenerationGateway>,
    transcriber: Arc<dyn Transcriber>,
    store: JobStore,
}

impl Analyzer {
    pub fn new(
        config: Arc<Config>,
        gateway: Arc<GenerationGateway>,
        transcriber: Arc<dyn Transcriber>,
        store: JobStore,
    ) -> Self {
        Self {
            config,
            gateway,
            transcriber,
            store,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Shared model for this configuration. When no provider can be built
    /// the stages still run on their fallbacks.
    pub async fn language_model(&self) -> Arc<dyn LLM> {
        self.model_with_retry().await.0
    }

    /// The model with the retry policy to use for it. Calls to the
    /// unavailable stand-in are never retried.
    async fn model_with_retry(&self) -> (Arc<dyn LLM>, RetryPolicy) {
        match self.gateway.get_or_create(&self.config.llm).await {
            Ok(llm) => (llm, self.config.llm.retry.policy()),
            Err(e) => {
                warn!("⚠️ Language model unavailable, continuing with fallbacks: {}", e);
                (Arc::new(UnavailableLLM { reason: e.to_string() }), RetryPolicy::none())
            }
        }
    }

    /// Chapters for an already-transcribed lecture
    pub async fn chapters(
        &self,
        segments: &[TranscriptSegment],
        duration: f64,
        language: &TargetLanguage,
    ) -> ChapterOutcome {
        let llm = self.language_model().await;
        ChapterPipeline::new(llm.as_ref(), &self.config.chapters)
            .run(segments, duration, language)
            .await
    }

    /// Transcription failure is fatal; every later stage degrades instead
    pub async fn analyze(&self, job_id: &str, video: &Path, language: Option<&str>) -> Result<AnalysisReport> {
        validate_job_id(job_id)?;
        let started = Instant::now();
        info!("🎬 Starting job {} for {}", job_id, video.display());

        let transcription = self.transcriber.transcribe(video, language).await?;
        let mut artifacts = vec![
            self.store
                .save(job_id, Artifact::Transcript, &transcription.segments)
                .await?,
        ];

        let target = TargetLanguage::resolve(language, transcription.language.as_deref());
        let (llm, retry) = self.model_with_retry().await;

        let chapters = ChapterPipeline::new(llm.as_ref(), &self.config.chapters)
            .run(&transcription.segments, transcription.duration, &target)
            .await;

        let knowledge = SpoExtractor::new(llm.as_ref(), &self.config.knowledge, retry)
            .extract(&transcription.segments)
            .await;
        artifacts.push(self.store.save(job_id, Artifact::Graph, &knowledge.graph).await?);

        let on_screen = self.on_screen_text(job_id).await;
        let combined = combine_segments(&[&transcription.segments, &on_screen]);
        let centrality = CentralityMap::from_graph(&knowledge.graph);
        let cognitive_load = compute_load(&combined, &centrality, &self.config.cognitive_load.options());
        artifacts.push(
            self.store
                .save(job_id, Artifact::CognitiveLoad, &cognitive_load)
                .await?,
        );
        artifacts.push(self.store.save(job_id, Artifact::Chapters, &chapters.chapters).await?);

        let KnowledgeExtraction {
            graph, skipped_chunks, ..
        } = knowledge;

        let report = AnalysisReport {
            job_id: job_id.to_string(),
            duration: transcription.duration,
            language: target.code().map(str::to_string),
            segment_count: transcription.segments.len(),
            graph_nodes: graph.nodes.len(),
            graph_links: graph.links.len(),
            chapters,
            skipped_chunks,
            cognitive_load,
            artifacts,
            processing_seconds: started.elapsed().as_secs_f64(),
        };

        info!(
            "🎉 Job {} done in {:.1}s: {} chapters, {} graph nodes, {} load windows",
            job_id,
            report.processing_seconds,
            report.chapters.chapters.len(),
            report.graph_nodes,
            report.cognitive_load.len()
        );
        Ok(report)
    }

    /// On-screen text saved for the job by an external OCR step, if any
    async fn on_screen_text(&self, job_id: &str) -> Vec<TranscriptSegment> {
        match self.store.load::<Vec<TranscriptSegment>>(job_id, Artifact::StrData).await {
            Ok(segments) => segments,
            Err(AnalyzerError::ArtifactNotFound { .. }) => Vec::new(),
            Err(e) => {
                warn!("⚠️ Ignoring unreadable on-screen text for job {}: {}", job_id, e);
                Vec::new()
            }
        }
    }
}
