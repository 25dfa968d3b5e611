//! Cognitive load module
//!
//! Sliding-window aggregation of keyword importance over a transcript. A
//! window's load is the summed centrality of every known keyword spoken (or
//! shown) in it; the curve is reported both per window and cumulatively,
//! each normalized to a peak of 1.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

use crate::knowledge::KnowledgeGraph;
use crate::types::{format_timestamp, transcript_duration, CognitiveLoadSeries, TranscriptSegment};

/// Keyword importance, keyed by lower-cased keyword
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentralityMap {
    scores: HashMap<String, f64>,
}

impl CentralityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Betweenness plus eigenvector centrality of every graph node
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        let scores = graph
            .nodes
            .iter()
            .map(|node| {
                (
                    node.label.to_lowercase(),
                    (node.betweenness_centrality + node.eigenvector_centrality).max(0.0),
                )
            })
            .collect();
        Self { scores }
    }

    /// Add the `top_n` heaviest seed keywords. Scores already present from
    /// the graph are kept.
    pub fn with_seed(mut self, seed: &HashMap<String, f64>, top_n: usize) -> Self {
        let mut ranked: Vec<(&String, &f64)> = seed.iter().filter(|(_, w)| w.is_finite()).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (keyword, weight) in ranked.into_iter().take(top_n) {
            self.scores
                .entry(keyword.to_lowercase())
                .or_insert_with(|| weight.max(0.0));
        }
        self
    }

    pub fn insert(&mut self, keyword: &str, score: f64) {
        self.scores.insert(keyword.to_lowercase(), score.max(0.0));
    }

    pub fn get(&self, keyword: &str) -> Option<f64> {
        self.scores.get(keyword).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(String, f64)> for CentralityMap {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (keyword, score) in iter {
            map.insert(&keyword, score);
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Window length and step in seconds
    pub window_size: f64,
    /// Sub-range to analyse; used only when `segment_end > segment_start`
    pub segment_start: f64,
    pub segment_end: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            window_size: 15.0,
            segment_start: 0.0,
            segment_end: 0.0,
        }
    }
}

impl LoadOptions {
    pub fn segment(start: f64, end: f64) -> Self {
        Self {
            segment_start: start,
            segment_end: end,
            ..Self::default()
        }
    }

    pub fn is_segment_mode(&self) -> bool {
        self.segment_end > self.segment_start
    }

    /// Time range the windows cover: the segment range, or the whole transcript
    pub fn range(&self, segments: &[TranscriptSegment]) -> (f64, f64) {
        if self.is_segment_mode() {
            (self.segment_start, self.segment_end)
        } else {
            (0.0, transcript_duration(segments))
        }
    }

    /// Number of windows [`compute_load`] would produce
    pub fn window_count(&self, segments: &[TranscriptSegment]) -> f64 {
        let (start, end) = self.range(segments);
        ((end - start) / self.window_size).ceil().max(0.0)
    }

    /// Reject caller-supplied options that are malformed or would produce
    /// more than [`MAX_WINDOWS`] windows.
    pub fn check(&self, segments: &[TranscriptSegment]) -> std::result::Result<(), String> {
        if !self.window_size.is_finite() || self.window_size < MIN_WINDOW_SIZE {
            return Err(format!(
                "window_size must be at least {} seconds, got {}",
                MIN_WINDOW_SIZE, self.window_size
            ));
        }
        if !(self.segment_start.is_finite() && self.segment_end.is_finite()) || self.segment_start < 0.0 {
            return Err(format!(
                "invalid segment range {}-{}",
                self.segment_start, self.segment_end
            ));
        }
        let windows = self.window_count(segments);
        if windows > MAX_WINDOWS as f64 {
            return Err(format!(
                "{} windows requested, at most {} allowed",
                windows, MAX_WINDOWS
            ));
        }
        Ok(())
    }
}

/// Smallest window accepted from callers, in seconds
pub const MIN_WINDOW_SIZE: f64 = 1.0;

/// Upper bound on windows per request
pub const MAX_WINDOWS: usize = 10_000;

/// Aggregation tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveLoadSettings {
    pub window_size: f64,
    /// Seed keywords kept when a seed weighting is supplied
    pub seed_top_n: usize,
}

impl Default for CognitiveLoadSettings {
    fn default() -> Self {
        Self {
            window_size: 15.0,
            seed_top_n: 50,
        }
    }
}

impl CognitiveLoadSettings {
    /// Whole-transcript options at the configured window size
    pub fn options(&self) -> LoadOptions {
        LoadOptions {
            window_size: self.window_size,
            ..LoadOptions::default()
        }
    }
}

/// Stable merge of several segment streams into start order
pub fn combine_segments(streams: &[&[TranscriptSegment]]) -> Vec<TranscriptSegment> {
    let mut combined: Vec<TranscriptSegment> = streams.iter().flat_map(|s| s.iter().cloned()).collect();
    combined.sort_by(|a, b| a.start.total_cmp(&b.start));
    combined
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w+\b").expect("valid regex"))
}

fn text_load(text: &str, centrality: &CentralityMap) -> f64 {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .filter_map(|word| centrality.get(word.as_str()))
        .sum()
}

fn normalize(series: &mut [f64]) {
    let max = series.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        for value in series.iter_mut() {
            *value /= max;
        }
    }
}

/// Instantaneous and cumulative load over non-overlapping windows.
///
/// `segments` must be sorted by start (see [`combine_segments`]). Windows
/// start at the range start and step by `window_size` while they begin
/// before the range end, so the last one may extend past it.
pub fn compute_load(
    segments: &[TranscriptSegment],
    centrality: &CentralityMap,
    options: &LoadOptions,
) -> CognitiveLoadSeries {
    let window_size = if options.window_size.is_finite() && options.window_size > 0.0 {
        options.window_size
    } else {
        LoadOptions::default().window_size
    };

    let (range_start, range_end) = options.range(segments);

    let mut labels = Vec::new();
    let mut instantaneous = Vec::new();

    let mut window_index = 0u64;
    loop {
        let window_start = range_start + window_size * window_index as f64;
        if window_start >= range_end {
            break;
        }
        let window_end = window_start + window_size;

        let mut load = 0.0;
        for segment in segments {
            if segment.start >= window_end {
                break;
            }
            let in_window = segment.end > window_start;
            let in_range = segment.end > range_start && segment.start < range_end;
            if in_window && in_range {
                load += text_load(&segment.text, centrality);
            }
        }

        labels.push(format_timestamp(window_start - range_start));
        instantaneous.push(load);
        window_index += 1;
    }

    let mut cumulative: Vec<f64> = instantaneous
        .iter()
        .scan(0.0, |total, load| {
            *total += load;
            Some(*total)
        })
        .collect();

    normalize(&mut instantaneous);
    normalize(&mut cumulative);

    debug!(
        "Cognitive load over {:.1}s-{:.1}s: {} windows of {:.0}s",
        range_start,
        range_end,
        labels.len(),
        window_size
    );

    CognitiveLoadSeries {
        labels,
        instantaneous_load_data: instantaneous,
        cumulative_load_data: cumulative,
    }
}
