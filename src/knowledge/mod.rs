/// Knowledge graph module
///
/// Extracts subject-predicate-object triples from a transcript with the
/// language model and turns them into a centrality-scored graph.

pub mod graph;
pub mod spo;

pub use graph::{normalize_triples, GraphLink, GraphNode, KnowledgeGraph, NormalizedTriple, Triple};
pub use spo::{chunk_ranges, KnowledgeExtraction, SpoExtractor, TimedTriple};

use serde::{Deserialize, Serialize};

/// Chunking and sampling for triple extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    pub chunk_words: usize,
    /// Words shared by consecutive chunks
    pub overlap_words: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            chunk_words: 1000,
            overlap_words: 200,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}
