use serde::Serialize;
use tracing::{debug, info};

use super::boundaries::{BoundaryExtractor, BoundarySource};
use super::metadata::MetadataGenerator;
use super::validator::{equal_split, validate};
use super::ChapterSettings;
use crate::llm::{TargetLanguage, LLM};
use crate::types::{Chapter, TranscriptSegment};

/// Progress of one chapter request; stages only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStage {
    Extracting,
    Validating,
    PerBoundaryLoop,
    Done,
}

/// Final chapters plus how much of them the model actually wrote
#[derive(Debug, Clone, Serialize)]
pub struct ChapterOutcome {
    pub chapters: Vec<Chapter>,
    pub boundary_source: BoundarySource,
    /// Chapters whose title/summary came from a fallback
    pub degraded_chapters: usize,
}

pub struct ChapterPipeline<'a> {
    llm: &'a dyn LLM,
    settings: &'a ChapterSettings,
    stage: ChapterStage,
}

impl<'a> ChapterPipeline<'a> {
    pub fn new(llm: &'a dyn LLM, settings: &'a ChapterSettings) -> Self {
        Self {
            llm,
            settings,
            stage: ChapterStage::Extracting,
        }
    }

    pub fn stage(&self) -> ChapterStage {
        self.stage
    }

    fn advance(&mut self, next: ChapterStage) {
        debug_assert!(next >= self.stage, "chapter stages only move forward");
        debug!("Chapter pipeline: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    /// Boundary extraction, validation, then one metadata call per boundary.
    ///
    /// `segments` must already be sorted by start. Metadata calls run one
    /// after another and a failure only degrades its own chapter.
    pub async fn run(
        &mut self,
        segments: &[TranscriptSegment],
        duration: f64,
        language: &TargetLanguage,
    ) -> ChapterOutcome {
        self.advance(ChapterStage::Extracting);
        let extraction = BoundaryExtractor::new(self.llm, self.settings)
            .extract(segments, duration)
            .await;

        self.advance(ChapterStage::Validating);
        let rules = self.settings.rules();
        let mut boundaries = validate(&extraction.boundaries, duration, &rules);
        let mut boundary_source = extraction.source;
        if boundaries.is_empty() && extraction.source == BoundarySource::Model {
            debug!("Model boundaries did not survive validation, using equal split");
            boundaries = validate(&equal_split(duration, self.settings.fallback_parts), duration, &rules);
            boundary_source = BoundarySource::EqualSplit;
        }

        self.advance(ChapterStage::PerBoundaryLoop);
        let generator = MetadataGenerator::new(self.llm, self.settings);
        let mut chapters = Vec::with_capacity(boundaries.len());
        let mut degraded_chapters = 0;

        for boundary in &boundaries {
            let (metadata, source) = generator
                .generate(segments, boundary.start, boundary.end, language)
                .await;
            if source.is_degraded() {
                degraded_chapters += 1;
            }
            chapters.push(Chapter::new(*boundary, metadata));
        }

        resolve_overlaps(&mut chapters);
        self.advance(ChapterStage::Done);

        info!(
            "✅ Generated {} chapters ({} with fallback metadata, boundaries from {:?})",
            chapters.len(),
            degraded_chapters,
            boundary_source
        );

        ChapterOutcome {
            chapters,
            boundary_source,
            degraded_chapters,
        }
    }
}

/// Sort by start and push any chapter that begins before its predecessor
/// ends forward to that end
pub fn resolve_overlaps(chapters: &mut [Chapter]) {
    chapters.sort_by(|a, b| a.start.total_cmp(&b.start));

    for i in 1..chapters.len() {
        let previous_end = chapters[i - 1].end;
        let current = &mut chapters[i];
        if current.start < previous_end {
            current.start = previous_end;
            current.end = current.end.max(current.start);
        }
    }
}
