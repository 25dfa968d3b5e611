use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::graph::{normalize_triples, KnowledgeGraph, Triple};
use super::KnowledgeSettings;
use crate::llm::{generate_with_retry, GenerationRequest, RecoveryChain, RetryPolicy, LLM};
use crate::types::TranscriptSegment;

const SYSTEM_PROMPT: &str = "You extract knowledge from lecture transcripts.\n\
Identify the key concepts and how they relate as subject-predicate-object triples.\n\
Subjects and objects are short noun phrases; predicates are short verb phrases.\n\
Return STRICT JSON ONLY: an array of {\"subject\": \"...\", \"predicate\": \"...\", \"object\": \"...\"}";

/// A triple stamped with the time span of the transcript chunk it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTriple {
    #[serde(flatten)]
    pub triple: Triple,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeExtraction {
    pub graph: KnowledgeGraph,
    pub timed_triples: Vec<TimedTriple>,
    /// Chunks skipped because generation or recovery failed
    pub skipped_chunks: usize,
}

/// Word index ranges `[start, end)` of overlapping chunks
pub fn chunk_ranges(word_count: usize, chunk_words: usize, overlap_words: usize) -> Vec<(usize, usize)> {
    let chunk_words = chunk_words.max(1);
    let step = chunk_words.saturating_sub(overlap_words).max(1);

    let mut ranges = Vec::new();
    let mut start = 0;
    while start < word_count {
        let end = (start + chunk_words).min(word_count);
        ranges.push((start, end));
        if end == word_count {
            break;
        }
        start += step;
    }
    ranges
}

pub struct SpoExtractor<'a> {
    llm: &'a dyn LLM,
    settings: &'a KnowledgeSettings,
    policy: RetryPolicy,
    recovery: RecoveryChain,
}

impl<'a> SpoExtractor<'a> {
    pub fn new(llm: &'a dyn LLM, settings: &'a KnowledgeSettings, policy: RetryPolicy) -> Self {
        Self {
            llm,
            settings,
            policy,
            recovery: RecoveryChain::structured(),
        }
    }

    fn request_for(&self, chunk: &str) -> GenerationRequest {
        GenerationRequest::new(format!("Transcript:\n{}", chunk))
            .with_system(SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_max_new_tokens(self.settings.max_tokens)
    }

    /// Extract triples chunk by chunk and build the graph.
    ///
    /// Generation is retried under the policy. A chunk whose output is still
    /// unusable is skipped rather than failing the whole transcript.
    pub async fn extract(&self, segments: &[TranscriptSegment]) -> KnowledgeExtraction {
        // Segment index of every word, so chunks can be mapped back to time
        let mut words: Vec<&str> = Vec::new();
        let mut word_segment: Vec<usize> = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            for word in segment.text.split_whitespace() {
                words.push(word);
                word_segment.push(index);
            }
        }

        let ranges = chunk_ranges(words.len(), self.settings.chunk_words, self.settings.overlap_words);
        info!("🧠 Extracting knowledge triples from {} words in {} chunks", words.len(), ranges.len());

        let mut all_triples = Vec::new();
        let mut timed_triples = Vec::new();
        let mut skipped_chunks = 0;

        for (chunk_index, &(start, end)) in ranges.iter().enumerate() {
            let chunk = words[start..end].join(" ");
            let request = self.request_for(&chunk);

            let raw = match generate_with_retry(self.llm, &request, &self.policy).await {
                Ok(response) => response.content,
                Err(e) => {
                    warn!("⚠️ Skipping chunk {}: generation failed: {}", chunk_index, e);
                    skipped_chunks += 1;
                    continue;
                }
            };

            let Some(triples) = self.recovery.recover(&raw).map(|v| triples_from_value(&v)) else {
                warn!(
                    "⚠️ Skipping chunk {}: no JSON in {} chars of output",
                    chunk_index,
                    raw.len()
                );
                skipped_chunks += 1;
                continue;
            };

            let start_time = segments[word_segment[start]].start;
            let end_time = segments[word_segment[end - 1]].end;
            debug!(
                "Chunk {} ({:.1}s-{:.1}s) yielded {} triples",
                chunk_index,
                start_time,
                end_time,
                triples.len()
            );

            timed_triples.extend(triples.iter().cloned().map(|triple| TimedTriple {
                triple,
                start_time,
                end_time,
            }));
            all_triples.extend(triples);
        }

        let graph = KnowledgeGraph::from_triples(&normalize_triples(&all_triples));
        info!(
            "✅ Knowledge graph: {} nodes, {} links ({} chunks skipped)",
            graph.nodes.len(),
            graph.links.len(),
            skipped_chunks
        );

        KnowledgeExtraction {
            graph,
            timed_triples,
            skipped_chunks,
        }
    }
}

/// Triples from a bare array or an object holding one under `triples`.
/// Entries that do not look like triples are ignored.
fn triples_from_value(value: &Value) -> Vec<Triple> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map
            .get("triples")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| serde_json::from_value::<Triple>(item.clone()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;
    use std::time::Duration;

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(0.0, 5.0, "backpropagation computes gradients"),
            TranscriptSegment::new(5.0, 9.0, "gradients update weights"),
        ]
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy::linear(3, Duration::ZERO)
    }

    #[test]
    fn test_chunk_ranges_overlap() {
        assert_eq!(chunk_ranges(2500, 1000, 200), vec![(0, 1000), (800, 1800), (1600, 2500)]);
        assert_eq!(chunk_ranges(10, 1000, 200), vec![(0, 10)]);
        assert!(chunk_ranges(0, 1000, 200).is_empty());
    }

    #[test]
    fn test_chunk_ranges_degenerate_overlap() {
        assert_eq!(chunk_ranges(3, 2, 5), vec![(0, 2), (1, 3)]);
    }

    #[tokio::test]
    async fn test_extraction_builds_graph_with_times() {
        let llm = ScriptedLLM::replying(&[r#"```json
[{"subject": "Backpropagation", "predicate": "computes", "object": "gradients"},
 {"subject": "gradients", "predicate": "update", "object": "weights"}]
```"#]);
        let settings = KnowledgeSettings::default();
        let extraction = SpoExtractor::new(&llm, &settings, no_wait()).extract(&segments()).await;

        assert_eq!(extraction.graph.nodes.len(), 3);
        assert_eq!(extraction.graph.links.len(), 2);
        assert_eq!(extraction.timed_triples.len(), 2);
        assert_eq!(extraction.timed_triples[0].start_time, 0.0);
        assert_eq!(extraction.timed_triples[0].end_time, 9.0);
        assert_eq!(extraction.skipped_chunks, 0);

        let gradients = extraction.graph.nodes.iter().find(|n| n.label == "gradients").unwrap();
        assert!(gradients.betweenness_centrality > 0.0);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let llm = ScriptedLLM::new(vec![
            Err("429 Too Many Requests".to_string()),
            Ok(r#"{"triples": [{"subject": "a", "predicate": "b", "object": "c"}]}"#.to_string()),
        ]);
        let settings = KnowledgeSettings::default();
        let extraction = SpoExtractor::new(&llm, &settings, no_wait()).extract(&segments()).await;

        assert_eq!(llm.call_count(), 2);
        assert_eq!(extraction.graph.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_unusable_chunk_skipped() {
        let llm = ScriptedLLM::replying(&["no triples here"]);
        let settings = KnowledgeSettings::default();
        let extraction = SpoExtractor::new(&llm, &settings, no_wait()).extract(&segments()).await;

        assert!(extraction.graph.is_empty());
        assert_eq!(extraction.skipped_chunks, 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_makes_no_calls() {
        let llm = ScriptedLLM::replying(&[]);
        let settings = KnowledgeSettings::default();
        let extraction = SpoExtractor::new(&llm, &settings, no_wait()).extract(&[]).await;

        assert!(extraction.graph.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_timed_triple_serializes_flat() {
        let timed = TimedTriple {
            triple: Triple {
                subject: crate::knowledge::graph::TermList::One("a".to_string()),
                predicate: "b".to_string(),
                object: crate::knowledge::graph::TermList::One("c".to_string()),
            },
            start_time: 1.0,
            end_time: 2.0,
        };
        let json = serde_json::to_value(&timed).unwrap();
        assert_eq!(json["subject"], "a");
        assert_eq!(json["start_time"], 1.0);
    }
}
