use tracing::{debug, warn};

use crate::chapters::prompt::truncate_chars;
use crate::error::{AnalyzerError, Result};
use crate::llm::{GenerationRequest, TargetLanguage, LLM};
use crate::types::TranscriptSegment;

const MAX_EXCERPT_CHARS: usize = 1500;
const EXPLAIN_TEMPERATURE: f32 = 0.25;
const EXPLAIN_MAX_TOKENS: u32 = 400;

/// Longer-form explanation of what one chapter teaches
pub struct Explainer<'a> {
    llm: &'a dyn LLM,
}

impl<'a> Explainer<'a> {
    pub fn new(llm: &'a dyn LLM) -> Self {
        Self { llm }
    }

    pub fn build_request(&self, excerpt: &str, language: &TargetLanguage) -> GenerationRequest {
        let (system, prompt) = if language.is_korean() {
            (
                "당신은 교육 콘텐츠 분석 전문가입니다. 주어진 내용을 분석하고 명확한 설명을 한국어로 제공하세요.\n\
                 규칙:\n\
                 - 핵심 개념을 요약하고 설명할 것\n\
                 - 교육적 통찰을 담아 3~5문장으로 작성할 것\n\
                 - 영어 단어를 쓰지 말고 전문 용어도 한국어로 풀어 쓸 것"
                    .to_string(),
                format!("다음 내용을 분석하고 주요 아이디어를 설명하세요:\n\n{}", excerpt),
            )
        } else {
            let label = language.label();
            (
                format!(
                    "You are an educational content analyzer.\n\
                     Rules:\n\
                     - Write ONLY in {label}\n\
                     - Summarize and explain the key concepts\n\
                     - Give 3 to 5 sentences with educational insight\n\
                     - Rephrase ideas in your own words"
                ),
                format!("Analyze and explain in {}:\n\n{}", label, excerpt),
            )
        };

        GenerationRequest::new(prompt)
            .with_system(system)
            .with_temperature(EXPLAIN_TEMPERATURE)
            .with_max_new_tokens(EXPLAIN_MAX_TOKENS)
    }

    /// Explain the transcript overlapping `[start, end)`. An empty range
    /// returns a fixed notice without calling the model.
    pub async fn explain(
        &self,
        segments: &[TranscriptSegment],
        start: f64,
        end: f64,
        language: &TargetLanguage,
    ) -> Result<String> {
        let text = segments
            .iter()
            .filter(|s| s.overlaps(start, end))
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");

        if text.trim().is_empty() {
            warn!("⚠️ No transcript overlaps {:.1}s-{:.1}s, nothing to explain", start, end);
            return Ok(empty_range_notice(language).to_string());
        }

        let excerpt = truncate_chars(&text, MAX_EXCERPT_CHARS);
        debug!("Explaining {:.1}s-{:.1}s from {} chars", start, end, excerpt.len());

        let response = self
            .llm
            .generate(&self.build_request(excerpt, language))
            .await
            .map_err(|e| AnalyzerError::Generation(e.to_string()))?;

        let explanation = response.content.trim();
        if explanation.is_empty() {
            return Err(AnalyzerError::Generation("empty explanation".to_string()));
        }
        Ok(explanation.to_string())
    }
}

fn empty_range_notice(language: &TargetLanguage) -> &'static str {
    if language.is_korean() {
        "이 구간에 대한 자막이 없습니다."
    } else {
        "There is no transcript for this section."
    }
}
