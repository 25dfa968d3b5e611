use std::time::Duration;
use tracing::{info, warn};

use crate::llm::{generate_with_retry, GenerationRequest, RetryPolicy, LLM};
use crate::types::TranscriptSegment;

/// What to do with each on-screen text segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineMode {
    /// Fix OCR mistakes, keep wording
    Clean,
    /// Rewrite fragments as a readable paragraph
    Rephrase,
}

impl RefineMode {
    fn system_prompt(&self) -> &'static str {
        match self {
            RefineMode::Clean => {
                "You proof-read text captured from lecture slides by OCR.\n\
                 Fix recognition errors, broken words and spacing. Do not add content.\n\
                 Output ONLY the corrected text."
            }
            RefineMode::Rephrase => {
                "You turn fragments of lecture slide text into one readable paragraph.\n\
                 Keep every fact, add nothing new.\n\
                 Output ONLY the paragraph."
            }
        }
    }
}

/// Proof-reads OCR-derived segments one at a time
pub struct SegmentRefiner<'a> {
    llm: &'a dyn LLM,
    policy: RetryPolicy,
}

impl<'a> SegmentRefiner<'a> {
    /// Three attempts, 1.2 s apart
    pub fn new(llm: &'a dyn LLM) -> Self {
        Self::with_policy(llm, RetryPolicy::fixed(3, Duration::from_millis(1200)))
    }

    pub fn with_policy(llm: &'a dyn LLM, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    /// Empty responses and exhausted retries keep the raw text
    pub async fn refine_text(&self, raw: &str, mode: RefineMode) -> String {
        if raw.trim().is_empty() {
            return raw.to_string();
        }

        let request = GenerationRequest::new(raw.trim())
            .with_system(mode.system_prompt())
            .with_temperature(0.2)
            .with_max_new_tokens(512);

        match generate_with_retry(self.llm, &request, &self.policy).await {
            Ok(response) if !response.content.trim().is_empty() => response.content.trim().to_string(),
            Ok(_) => raw.to_string(),
            Err(e) => {
                warn!("⚠️ Keeping raw on-screen text after failed refinement: {}", e);
                raw.to_string()
            }
        }
    }

    pub async fn refine(&self, segments: &[TranscriptSegment], mode: RefineMode) -> Vec<TranscriptSegment> {
        info!("📝 Refining {} on-screen text segments ({:?})", segments.len(), mode);

        let mut refined = Vec::with_capacity(segments.len());
        for segment in segments {
            refined.push(TranscriptSegment {
                text: self.refine_text(&segment.text, mode).await,
                ..segment.clone()
            });
        }
        refined
    }
}
