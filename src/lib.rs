/// Lecture Lens
///
/// Analysis of recorded lectures: LLM-generated chapters with titles and
/// summaries, a knowledge graph of the concepts discussed, and a
/// cognitive-load curve over time.

pub mod analysis;
pub mod chapters;
pub mod cognitive;
pub mod config;
pub mod enrich;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod store;
pub mod transcription;
pub mod types;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::analysis::{AnalysisReport, Analyzer};
pub use crate::chapters::{ChapterOutcome, ChapterPipeline, ChapterSettings};
pub use crate::cognitive::{combine_segments, compute_load, CentralityMap, LoadOptions};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::enrich::{Explainer, RefineMode, SegmentRefiner, Translator, WikipediaClient};
pub use crate::error::{AnalyzerError, Result};
pub use crate::knowledge::{KnowledgeGraph, SpoExtractor};
pub use crate::llm::{recover_json, GenerationGateway, GenerationRequest, LLMConfig, LLMProvider, TargetLanguage, LLM};
pub use crate::store::{Artifact, JobStore};
pub use crate::transcription::{Transcriber, TranscriptionOutput, WhisperTranscriber};
pub use crate::types::{Chapter, ChapterMetadata, CognitiveLoadSeries, TimeBoundary, TranscriptSegment};
