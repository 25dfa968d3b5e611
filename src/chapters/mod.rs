/// Chapter generation module
///
/// Turns a transcript into an ordered list of titled chapters in two model
/// passes: one call proposes topic boundaries, then one call per validated
/// boundary writes its title and summary. Every model step degrades to a
/// deterministic fallback, so chapter generation itself never fails.

pub mod boundaries;
pub mod metadata;
pub mod pipeline;
pub mod prompt;
pub mod validator;

pub use boundaries::{BoundaryExtraction, BoundaryExtractor, BoundarySource};
pub use metadata::{MetadataGenerator, MetadataSource};
pub use pipeline::{resolve_overlaps, ChapterOutcome, ChapterPipeline, ChapterStage};
pub use validator::{validate, BoundaryRules};

use serde::{Deserialize, Serialize};

/// Tunables for boundary extraction, validation and metadata generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterSettings {
    /// Transcript lines included in the boundary prompt
    pub max_prompt_lines: usize,
    /// Requested chapter count range
    pub min_chapters: usize,
    pub max_chapters: usize,
    /// Boundary counts above this are coarsened down to `max_chapters`
    pub cap_threshold: usize,
    /// Minimum chapter length in seconds
    pub min_duration: f64,
    /// Minimum distance between boundaries asked of the model, in seconds
    pub min_separation: f64,
    /// Equal parts used when the model yields no boundaries
    pub fallback_parts: usize,
    pub boundary_temperature: f32,
    pub boundary_max_tokens: u32,
    pub metadata_temperature: f32,
    pub metadata_max_tokens: u32,
    /// Transcript characters sent per chapter for title/summary
    pub metadata_max_chars: usize,
}

impl Default for ChapterSettings {
    fn default() -> Self {
        Self {
            max_prompt_lines: 200,
            min_chapters: 4,
            max_chapters: 8,
            cap_threshold: 10,
            min_duration: 60.0,
            min_separation: 45.0,
            fallback_parts: 6,
            boundary_temperature: 0.2,
            boundary_max_tokens: 800,
            metadata_temperature: 0.3,
            metadata_max_tokens: 200,
            metadata_max_chars: 1200,
        }
    }
}

impl ChapterSettings {
    pub fn rules(&self) -> BoundaryRules {
        BoundaryRules {
            min_duration: self.min_duration,
            cap_threshold: self.cap_threshold,
            max_boundaries: self.max_chapters,
        }
    }
}
