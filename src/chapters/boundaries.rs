use serde_json::Value;
use tracing::{debug, info, warn};

use super::prompt::pack_segments;
use super::validator::equal_split;
use super::ChapterSettings;
use crate::llm::{GenerationRequest, RecoveryChain, LLM};
use crate::types::{parse_timestamp, round_time, TimeBoundary, TranscriptSegment};

/// Where a boundary list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySource {
    Model,
    EqualSplit,
}

/// Unvalidated boundaries plus their provenance
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryExtraction {
    pub boundaries: Vec<TimeBoundary>,
    pub source: BoundarySource,
}

impl BoundaryExtraction {
    pub fn equal_split(duration: f64, parts: usize) -> Self {
        Self {
            boundaries: equal_split(duration, parts),
            source: BoundarySource::EqualSplit,
        }
    }
}

/// Asks the model for major-topic time ranges over the whole transcript
pub struct BoundaryExtractor<'a> {
    llm: &'a dyn LLM,
    settings: &'a ChapterSettings,
    recovery: RecoveryChain,
}

impl<'a> BoundaryExtractor<'a> {
    pub fn new(llm: &'a dyn LLM, settings: &'a ChapterSettings) -> Self {
        Self {
            llm,
            settings,
            recovery: RecoveryChain::structured(),
        }
    }

    pub fn build_request(&self, segments: &[TranscriptSegment], duration: f64) -> GenerationRequest {
        let s = self.settings;
        let system = format!(
            "You are a video chapterizer. Split a lecture transcript into major topic segments.\n\
             Rules:\n\
             - Produce between {min} and {max} segments in chronological order\n\
             - Each segment lasts at least {min_len:.0} seconds\n\
             - Consecutive boundaries are at least {sep:.0} seconds apart\n\
             - Together the segments cover 0 to {duration:.3} seconds\n\
             - Use only timestamps that appear in the transcript lines\n\
             - Times are seconds as floats\n\
             Return STRICT JSON ONLY with this exact schema:\n\
             {{\"boundaries\": [{{\"start\": <float>, \"end\": <float>}}]}}",
            min = s.min_chapters,
            max = s.max_chapters,
            min_len = s.min_duration,
            sep = s.min_separation,
            duration = round_time(duration),
        );

        let prompt = format!(
            "Video duration (seconds): {:.3}\nTranscript lines (start|end|text):\n{}",
            round_time(duration),
            pack_segments(segments, s.max_prompt_lines)
        );

        GenerationRequest::new(prompt)
            .with_system(system)
            .with_temperature(s.boundary_temperature)
            .with_max_new_tokens(s.boundary_max_tokens)
    }

    /// One model call; anything unusable falls back to an equal split
    pub async fn extract(&self, segments: &[TranscriptSegment], duration: f64) -> BoundaryExtraction {
        if segments.is_empty() || duration <= 0.0 {
            debug!("No transcript to chapterize, using equal split");
            return BoundaryExtraction::equal_split(duration, self.settings.fallback_parts);
        }

        let request = self.build_request(segments, duration);
        debug!(
            "Requesting boundaries for {} segments ({} prompt chars)",
            segments.len(),
            request.prompt.len()
        );

        let raw = match self.llm.generate(&request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("⚠️ Boundary generation failed, using equal split: {}", e);
                return BoundaryExtraction::equal_split(duration, self.settings.fallback_parts);
            }
        };

        let boundaries = self
            .recovery
            .recover(&raw)
            .map(|value| boundaries_from_value(&value))
            .unwrap_or_default();

        if boundaries.is_empty() {
            warn!(
                "⚠️ No usable boundaries in model output ({} chars), using equal split",
                raw.len()
            );
            return BoundaryExtraction::equal_split(duration, self.settings.fallback_parts);
        }

        info!("📑 Model proposed {} chapter boundaries", boundaries.len());
        BoundaryExtraction {
            boundaries,
            source: BoundarySource::Model,
        }
    }
}

/// Read boundaries from a bare array or an object holding one under a
/// common key. Entries without a readable start and end are skipped.
pub fn boundaries_from_value(value: &Value) -> Vec<TimeBoundary> {
    let entries = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["boundaries", "segments", "chapters"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| {
            let start = entry.get("start").and_then(time_value)?;
            let end = entry.get("end").and_then(time_value)?;
            Some(TimeBoundary::new(round_time(start), round_time(end)))
        })
        .collect()
}

fn time_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;
    use serde_json::json;

    fn transcript() -> Vec<TranscriptSegment> {
        (0..40)
            .map(|i| TranscriptSegment::new(i as f64 * 15.0, (i + 1) as f64 * 15.0, format!("line {}", i)))
            .collect()
    }

    #[test]
    fn test_boundaries_from_object_and_array() {
        let object = json!({"boundaries": [{"start": 0, "end": 90.5}, {"start": "01:30", "end": "300s"}]});
        assert_eq!(
            boundaries_from_value(&object),
            vec![TimeBoundary::new(0.0, 90.5), TimeBoundary::new(90.0, 300.0)]
        );

        let array = json!([{"start": 0.0, "end": 60.0}, {"start": null, "end": 1.0}]);
        assert_eq!(boundaries_from_value(&array), vec![TimeBoundary::new(0.0, 60.0)]);
    }

    #[test]
    fn test_chapters_key_accepted() {
        let value = json!({"chapters": [{"start": 0, "end": 100, "title": "x"}]});
        assert_eq!(boundaries_from_value(&value).len(), 1);
    }

    #[test]
    fn test_request_carries_rules_and_parameters() {
        let llm = ScriptedLLM::replying(&[]);
        let settings = ChapterSettings::default();
        let extractor = BoundaryExtractor::new(&llm, &settings);
        let request = extractor.build_request(&transcript(), 600.0);

        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_new_tokens, 800);
        let system = request.system.unwrap();
        assert!(system.contains("between 4 and 8"));
        assert!(system.contains("at least 60 seconds"));
        assert!(system.contains("at least 45 seconds"));
        assert!(request.prompt.contains("0.000|15.000|line 0"));
    }

    #[tokio::test]
    async fn test_model_boundaries_used() {
        let llm = ScriptedLLM::replying(&[
            r#"Sure! {"boundaries": [{"start": 0, "end": 300}, {"start": 300, "end": 600}]}"#,
        ]);
        let settings = ChapterSettings::default();
        let extraction = BoundaryExtractor::new(&llm, &settings).extract(&transcript(), 600.0).await;

        assert_eq!(extraction.source, BoundarySource::Model);
        assert_eq!(extraction.boundaries.len(), 2);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_output_falls_back_to_equal_split() {
        let llm = ScriptedLLM::replying(&[""]);
        let settings = ChapterSettings::default();
        let extraction = BoundaryExtractor::new(&llm, &settings).extract(&transcript(), 600.0).await;

        assert_eq!(extraction.source, BoundarySource::EqualSplit);
        assert_eq!(extraction.boundaries.len(), 6);
        assert_eq!(extraction.boundaries[5].end, 600.0);
    }

    #[tokio::test]
    async fn test_generation_error_falls_back_without_retry() {
        let llm = ScriptedLLM::new(vec![Err("connection refused".to_string())]);
        let settings = ChapterSettings::default();
        let extraction = BoundaryExtractor::new(&llm, &settings).extract(&transcript(), 600.0).await;

        assert_eq!(extraction.source, BoundarySource::EqualSplit);
        assert_eq!(llm.call_count(), 1);
    }
}
