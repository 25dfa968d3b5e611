use crate::types::{round_time, TranscriptSegment};

/// Indices of at most `max_lines` segments, evenly spread over the input
pub fn sample_indices(len: usize, max_lines: usize) -> Vec<usize> {
    if len <= max_lines {
        return (0..len).collect();
    }
    if max_lines == 0 {
        return Vec::new();
    }

    let step = len as f64 / max_lines as f64;
    (0..max_lines).map(|i| (i as f64 * step) as usize).collect()
}

/// Render the transcript as `start|end|text` lines, sampled down to
/// `max_lines` when it is longer
pub fn pack_segments(segments: &[TranscriptSegment], max_lines: usize) -> String {
    sample_indices(segments.len(), max_lines)
        .into_iter()
        .map(|i| {
            let segment = &segments[i];
            format!(
                "{:.3}|{:.3}|{}",
                round_time(segment.start),
                round_time(segment.end),
                segment.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `text` to at most `max_chars` characters without splitting one
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// Concatenated text of the segments fully inside `[start, end]`
pub fn slice_text(segments: &[TranscriptSegment], start: f64, end: f64) -> String {
    segments
        .iter()
        .filter(|s| s.is_within(start, end))
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
