use serde_json::Value;
use tracing::{debug, warn};

use super::prompt::{slice_text, truncate_chars};
use super::ChapterSettings;
use crate::llm::recovery::extract_string_fields;
use crate::llm::{GenerationRequest, RecoveryChain, TargetLanguage, LLM};
use crate::types::{ChapterMetadata, TranscriptSegment};

const UNTITLED: &str = "Untitled";
const NO_CONTENT: &str = "No content";

/// Which tier produced a chapter's title and summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// Parsed from (possibly repaired) JSON
    Parsed,
    /// Pulled out of unparseable output by key regex
    KeyExtraction,
    /// Derived from the transcript slice without the model
    Fallback,
    /// No transcript in range, model not called
    Placeholder,
}

impl MetadataSource {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Fallback | Self::Placeholder)
    }
}

/// Writes a title and summary for one chapter range
pub struct MetadataGenerator<'a> {
    llm: &'a dyn LLM,
    settings: &'a ChapterSettings,
    recovery: RecoveryChain,
}

impl<'a> MetadataGenerator<'a> {
    pub fn new(llm: &'a dyn LLM, settings: &'a ChapterSettings) -> Self {
        Self {
            llm,
            settings,
            recovery: RecoveryChain::structured(),
        }
    }

    pub fn build_request(&self, slice: &str, language: &TargetLanguage) -> GenerationRequest {
        let system = if language.is_korean() {
            "당신은 강의 영상의 챕터 제목과 요약을 작성하는 편집자입니다.\n\
             규칙:\n\
             - 제목은 3~5 단어의 한국어 명사구\n\
             - 요약은 1~2 문장의 자연스러운 한국어\n\
             - 영어, 한자, 일본어 등 다른 문자를 섞지 말 것 (고유명사 제외)\n\
             - 반드시 다음 형식의 JSON만 출력: {\"title\": \"...\", \"summary\": \"...\"}"
                .to_string()
        } else {
            format!(
                "You write chapter titles and summaries for lecture videos.\n\
                 Rules:\n\
                 - Title: 3 to 5 words\n\
                 - Summary: 1 to 2 sentences\n\
                 - Write only in {}; never mix scripts or languages\n\
                 - Return STRICT JSON ONLY: {{\"title\": \"...\", \"summary\": \"...\"}}",
                language.label()
            )
        };

        GenerationRequest::new(format!("Transcript excerpt:\n{}", slice))
            .with_system(system)
            .with_temperature(self.settings.metadata_temperature)
            .with_max_new_tokens(self.settings.metadata_max_tokens)
    }

    /// Title and summary for `[start, end]`. Never fails: model errors and
    /// unusable output degrade to a transcript-derived default.
    pub async fn generate(
        &self,
        segments: &[TranscriptSegment],
        start: f64,
        end: f64,
        language: &TargetLanguage,
    ) -> (ChapterMetadata, MetadataSource) {
        let full_slice = slice_text(segments, start, end);
        if full_slice.is_empty() {
            warn!("⚠️ No transcript inside {:.1}s-{:.1}s, using placeholder", start, end);
            return (
                ChapterMetadata {
                    title: UNTITLED.to_string(),
                    summary: NO_CONTENT.to_string(),
                },
                MetadataSource::Placeholder,
            );
        }

        let slice = truncate_chars(&full_slice, self.settings.metadata_max_chars);
        let fallback = fallback_metadata(slice, start);
        let request = self.build_request(slice, language);

        let raw = match self.llm.generate(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("⚠️ Metadata generation failed for {:.1}s-{:.1}s: {}", start, end, e);
                return (fallback, MetadataSource::Fallback);
            }
        };

        if let Some(parsed) = self.recovery.recover(&raw).and_then(|v| metadata_from_value(&v)) {
            return (complete_with(parsed, &fallback), MetadataSource::Parsed);
        }

        let fields = extract_string_fields(&raw, &["title", "summary"]);
        if !fields.is_empty() {
            debug!("Chapter metadata pulled by key extraction");
            let partial = PartialMetadata {
                title: fields.get("title").and_then(Value::as_str).map(clean_text),
                summary: fields.get("summary").and_then(Value::as_str).map(clean_text),
            };
            return (complete_with(partial, &fallback), MetadataSource::KeyExtraction);
        }

        warn!(
            "⚠️ Unusable metadata output for {:.1}s-{:.1}s ({} chars), using fallback",
            start,
            end,
            raw.len()
        );
        (fallback, MetadataSource::Fallback)
    }
}

struct PartialMetadata {
    title: Option<String>,
    summary: Option<String>,
}

fn clean_text(raw: &str) -> String {
    raw.trim().trim_matches(['"', '\'', '*', '#']).trim().to_string()
}

fn metadata_from_value(value: &Value) -> Option<PartialMetadata> {
    // Some models wrap the object in a one-element array
    let object = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };

    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(clean_text)
            .filter(|s| !s.is_empty())
    };
    let partial = PartialMetadata {
        title: field("title"),
        summary: field("summary"),
    };

    (partial.title.is_some() || partial.summary.is_some()).then_some(partial)
}

fn complete_with(partial: PartialMetadata, fallback: &ChapterMetadata) -> ChapterMetadata {
    ChapterMetadata {
        title: partial
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| fallback.title.clone()),
        summary: partial
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.summary.clone()),
    }
}

/// `Part {n}` with `n = floor(start / 60) + 1`, and the slice's first sentence
pub fn fallback_metadata(slice: &str, start: f64) -> ChapterMetadata {
    let part = (start.max(0.0) / 60.0).floor() as u64 + 1;
    let first_sentence = slice.split(". ").next().unwrap_or_default().trim();

    ChapterMetadata {
        title: format!("Part {}", part),
        summary: if first_sentence.is_empty() {
            NO_CONTENT.to_string()
        } else {
            first_sentence.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(120.0, 130.0, "Gradient descent walks downhill. It uses the slope."),
            TranscriptSegment::new(130.0, 150.0, "The learning rate sets the step."),
        ]
    }

    async fn run(llm: &ScriptedLLM, language: &TargetLanguage) -> (ChapterMetadata, MetadataSource) {
        let settings = ChapterSettings::default();
        MetadataGenerator::new(llm, &settings)
            .generate(&segments(), 120.0, 180.0, language)
            .await
    }

    #[tokio::test]
    async fn test_parsed_metadata() {
        let llm = ScriptedLLM::replying(&[r#"```json
{"title": "Gradient Descent Basics", "summary": "Explains the update rule."}
```"#]);
        let (metadata, source) = run(&llm, &TargetLanguage::new("en")).await;
        assert_eq!(source, MetadataSource::Parsed);
        assert_eq!(metadata.title, "Gradient Descent Basics");
        assert_eq!(metadata.summary, "Explains the update rule.");
    }

    #[tokio::test]
    async fn test_key_extraction_tier() {
        let llm = ScriptedLLM::replying(&[r#"title is "title": "Step Sizes", "summary": "Why the rate matters"#]);
        let (metadata, source) = run(&llm, &TargetLanguage::unspecified()).await;
        assert_eq!(source, MetadataSource::KeyExtraction);
        assert_eq!(metadata.title, "Step Sizes");
        assert_eq!(metadata.summary, "Why the rate matters");
    }

    #[tokio::test]
    async fn test_garbage_output_uses_fallback() {
        let llm = ScriptedLLM::replying(&["I cannot help with that."]);
        let (metadata, source) = run(&llm, &TargetLanguage::unspecified()).await;
        assert_eq!(source, MetadataSource::Fallback);
        assert_eq!(metadata.title, "Part 3");
        assert_eq!(metadata.summary, "Gradient descent walks downhill");
    }

    #[tokio::test]
    async fn test_model_error_uses_fallback() {
        let llm = ScriptedLLM::new(vec![Err("timeout".to_string())]);
        let (metadata, source) = run(&llm, &TargetLanguage::unspecified()).await;
        assert!(source.is_degraded());
        assert_eq!(metadata.title, "Part 3");
    }

    #[tokio::test]
    async fn test_missing_summary_filled_from_transcript() {
        let llm = ScriptedLLM::replying(&[r#"{"title": "Descent"}"#]);
        let (metadata, _) = run(&llm, &TargetLanguage::unspecified()).await;
        assert_eq!(metadata.title, "Descent");
        assert_eq!(metadata.summary, "Gradient descent walks downhill");
    }

    #[tokio::test]
    async fn test_empty_range_skips_model() {
        let llm = ScriptedLLM::replying(&[]);
        let settings = ChapterSettings::default();
        let (metadata, source) = MetadataGenerator::new(&llm, &settings)
            .generate(&segments(), 500.0, 600.0, &TargetLanguage::unspecified())
            .await;

        assert_eq!(source, MetadataSource::Placeholder);
        assert_eq!(metadata.title, "Untitled");
        assert_eq!(metadata.summary, "No content");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_korean_prompt_selected() {
        let llm = ScriptedLLM::replying(&[r#"{"title": "경사 하강법", "summary": "기울기를 따라 내려갑니다."}"#]);
        run(&llm, &TargetLanguage::new("ko")).await;
        let request = &llm.requests()[0];
        assert!(request.system.as_ref().unwrap().contains("한국어"));
    }

    #[tokio::test]
    async fn test_generic_prompt_names_language() {
        let llm = ScriptedLLM::replying(&["{}"]);
        run(&llm, &TargetLanguage::new("de")).await;
        assert!(llm.requests()[0].system.as_ref().unwrap().contains("German"));
    }

    #[test]
    fn test_slice_is_capped() {
        let llm = ScriptedLLM::replying(&[]);
        let settings = ChapterSettings {
            metadata_max_chars: 10,
            ..ChapterSettings::default()
        };
        let generator = MetadataGenerator::new(&llm, &settings);
        let request = generator.build_request(truncate_chars("abcdefghijklmnop", 10), &TargetLanguage::unspecified());
        assert!(request.prompt.ends_with("abcdefghij"));
    }

    #[test]
    fn test_fallback_title_numbering() {
        assert_eq!(fallback_metadata("x", 0.0).title, "Part 1");
        assert_eq!(fallback_metadata("x", 59.9).title, "Part 1");
        assert_eq!(fallback_metadata("x", 60.0).title, "Part 2");
    }
}
