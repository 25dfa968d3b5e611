use serde::{Deserialize, Serialize};

use crate::error::{AnalyzerError, Result};

/// A transcript fragment as produced by speech-to-text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Spoken (or on-screen) text
    #[serde(default)]
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// True when the segment lies entirely inside `[start, end]`
    pub fn is_within(&self, start: f64, end: f64) -> bool {
        self.start >= start && self.end <= end
    }

    /// True when the segment shares any time with `[start, end)`
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start < end && self.end > start
    }
}

/// Check segments coming from a collaborator and put them in start order.
///
/// Rejects non-finite or negative timestamps and segments that end before
/// they start. Sorting is stable so equal starts keep their input order.
pub fn validate_segments(mut segments: Vec<TranscriptSegment>) -> Result<Vec<TranscriptSegment>> {
    for (index, segment) in segments.iter().enumerate() {
        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(AnalyzerError::InvalidSegment {
                index,
                reason: "timestamps must be finite".to_string(),
            });
        }
        if segment.start < 0.0 {
            return Err(AnalyzerError::InvalidSegment {
                index,
                reason: format!("negative start {}", segment.start),
            });
        }
        if segment.end < segment.start {
            return Err(AnalyzerError::InvalidSegment {
                index,
                reason: format!("end {} precedes start {}", segment.end, segment.start),
            });
        }
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}

/// Latest end time over all segments, or 0 for an empty transcript
pub fn transcript_duration(segments: &[TranscriptSegment]) -> f64 {
    segments.iter().map(|s| s.end).fold(0.0, f64::max)
}

/// A candidate or finalized chapter time range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TimeBoundary {
    pub start: f64,
    pub end: f64,
}

impl TimeBoundary {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A boundary enriched with a title and summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
    pub title: String,
    pub summary: String,
}

impl Chapter {
    pub fn new(boundary: TimeBoundary, metadata: ChapterMetadata) -> Self {
        Self {
            start: boundary.start,
            end: boundary.end,
            title: metadata.title,
            summary: metadata.summary,
        }
    }
}

/// Title and summary for one chapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterMetadata {
    pub title: String,
    pub summary: String,
}

/// Normalized cognitive-load curves, one entry per sliding window
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveLoadSeries {
    pub labels: Vec<String>,
    pub instantaneous_load_data: Vec<f64>,
    pub cumulative_load_data: Vec<f64>,
}

impl CognitiveLoadSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Format seconds as `MM:SS` (minutes are not wrapped into hours)
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, secs)
}

/// Parse `SS`, `MM:SS`, `HH:MM:SS` or a plain float into seconds
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_end_matches('s');
    if raw.is_empty() {
        return None;
    }

    if !raw.contains(':') {
        return raw.parse::<f64>().ok().filter(|v| v.is_finite());
    }

    let mut total = 0.0;
    for part in raw.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        total = total * 60.0 + value;
    }
    Some(total).filter(|v: &f64| v.is_finite())
}

/// Round to millisecond precision, as timestamps are stored
pub fn round_time(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
