//! Turning free text from a language model into JSON.
//!
//! Model output carries no structural guarantee: it can be wrapped in prose
//! or markdown fences, contain broken escape sequences or trailing commas, or
//! stop mid-array when the token budget runs out. A [`RecoveryChain`] tries an
//! ordered list of [`RecoveryStrategy`] implementations and returns the first
//! JSON object or array any of them produces. Nothing here panics or errors;
//! total failure is `None` and the caller falls back to its own default.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// One way of getting JSON out of model text
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns an object or array, or `None` if this strategy does not apply
    fn recover(&self, text: &str) -> Option<Value>;
}

/// Ordered list of strategies, tried until one succeeds
pub struct RecoveryChain {
    strategies: Vec<Box<dyn RecoveryStrategy>>,
}

impl RecoveryChain {
    pub fn new(strategies: Vec<Box<dyn RecoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// Parsing strategies only, without key extraction
    pub fn structured() -> Self {
        Self::new(vec![
            Box::new(FullParse),
            Box::new(BraceSlice),
            Box::new(EscapeRepair),
            Box::new(TruncationRepair),
        ])
    }

    /// Parsing strategies followed by a regex pull of the given string keys
    pub fn with_keys(keys: &[&str]) -> Self {
        let mut chain = Self::structured();
        chain.strategies.push(Box::new(KeyExtraction::new(keys)));
        chain
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn recover(&self, raw: &str) -> Option<Value> {
        if raw.trim().is_empty() {
            return None;
        }

        for strategy in &self.strategies {
            if let Some(value) = strategy.recover(raw) {
                debug!("JSON recovered by strategy '{}'", strategy.name());
                return Some(value);
            }
        }

        debug!("JSON recovery failed for {} chars of model output", raw.len());
        None
    }
}

impl Default for RecoveryChain {
    fn default() -> Self {
        Self::with_keys(&["title", "summary"])
    }
}

/// Recover a JSON object or array from arbitrary model output
pub fn recover_json(raw: &str) -> Option<Value> {
    RecoveryChain::default().recover(raw)
}

fn parse_container(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Byte offset of the first fence that opens a line. Raw newlines cannot
/// occur inside a JSON string, so backticks within string values never match.
fn line_fence(text: &str) -> Option<usize> {
    text.match_indices("```")
        .map(|(at, _)| at)
        .find(|&at| text[..at].rsplit('\n').next().is_some_and(|line| line.trim().is_empty()))
}

/// Remove surrounding markdown code fences, keeping the fenced body
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = line_fence(text) else {
        return text;
    };

    let after_open = &text[open + 3..];
    // Skip the info string (```json) up to the end of that line
    let body_start = match after_open.find('\n') {
        Some(newline) if after_open[..newline].chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') => {
            newline + 1
        }
        _ => 0,
    };
    let body = &after_open[body_start..];

    match line_fence(body) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Slice from the first opening delimiter to the last matching closer.
///
/// Whichever of `{` and `[` comes first decides the container kind, so an
/// array nested in a truncated object is never mistaken for the root.
fn outer_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Fenced or bare text parsed as a whole
pub struct FullParse;

impl RecoveryStrategy for FullParse {
    fn name(&self) -> &'static str {
        "full_parse"
    }

    fn recover(&self, text: &str) -> Option<Value> {
        parse_container(text).or_else(|| parse_container(strip_code_fences(text)))
    }
}

/// Object (or array) embedded in surrounding prose
pub struct BraceSlice;

impl RecoveryStrategy for BraceSlice {
    fn name(&self) -> &'static str {
        "brace_slice"
    }

    fn recover(&self, text: &str) -> Option<Value> {
        outer_slice(strip_code_fences(text)).and_then(parse_container)
    }
}

/// Broken escapes and trailing commas repaired before parsing
pub struct EscapeRepair;

impl RecoveryStrategy for EscapeRepair {
    fn name(&self) -> &'static str {
        "escape_repair"
    }

    fn recover(&self, text: &str) -> Option<Value> {
        let text = strip_code_fences(text);
        let candidate = outer_slice(text).unwrap_or(text);
        parse_container(&repair_json_text(candidate))
    }
}

/// Apply escape and trailing-comma repairs to JSON-ish text
pub fn repair_json_text(text: &str) -> String {
    remove_trailing_commas(&sanitize_escapes(text))
}

fn is_hex4(chars: &[char]) -> Option<u32> {
    if chars.len() < 4 || !chars[..4].iter().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digits: String = chars[..4].iter().collect();
    u32::from_str_radix(&digits, 16).ok()
}

/// Drop escape sequences serde_json would reject.
///
/// Valid escapes are kept verbatim. A `\u` must carry four hex digits and
/// must not be an unpaired surrogate, otherwise the `\u` and whatever hex
/// digits follow it are removed. Unknown escapes lose their backslash.
pub fn sanitize_escapes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let Some(&next) = chars.get(i + 1) else {
            // Dangling backslash at the end
            i += 1;
            continue;
        };

        match next {
            '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            'u' => {
                let rest = &chars[i + 2..];
                match is_hex4(rest) {
                    Some(code) if (0xD800..0xDC00).contains(&code) => {
                        // High surrogate needs a low surrogate right after it
                        let paired = rest.len() >= 10
                            && rest[4] == '\\'
                            && rest[5] == 'u'
                            && matches!(is_hex4(&rest[6..]), Some(low) if (0xDC00..0xE000).contains(&low));
                        if paired {
                            out.extend(&chars[i..i + 12]);
                            i += 12;
                        } else {
                            i += 6;
                        }
                    }
                    Some(code) if (0xDC00..0xE000).contains(&code) => {
                        i += 6;
                    }
                    Some(_) => {
                        out.extend(&chars[i..i + 6]);
                        i += 6;
                    }
                    None => {
                        i += 2;
                        while i < chars.len() && chars[i].is_ascii_hexdigit() {
                            i += 1;
                        }
                    }
                }
            }
            _ => {
                // Unknown escape: keep the character, drop the backslash
                i += 1;
            }
        }
    }

    out
}

fn remove_trailing_commas(text: &str) -> String {
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_COMMA.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));
    re.replace_all(text, "$1").into_owned()
}

/// Output cut off mid-structure, closed at the last complete array element
pub struct TruncationRepair;

impl RecoveryStrategy for TruncationRepair {
    fn name(&self) -> &'static str {
        "truncation_repair"
    }

    fn recover(&self, text: &str) -> Option<Value> {
        let text = strip_code_fences(text);
        let start = text.find(['{', '['])?;
        let candidate = sanitize_escapes(&text[start..]);
        close_truncated(&candidate)
    }
}

/// A place where the text can be cut and closed again
struct CutPoint {
    /// Byte offset to cut at (exclusive)
    offset: usize,
    /// Closing delimiters needed after the cut, innermost first
    closers: String,
}

fn closers_for(stack: &[char]) -> String {
    stack
        .iter()
        .rev()
        .map(|open| if *open == '{' { '}' } else { ']' })
        .collect()
}

/// Scan the structure, remembering every point where an array element has
/// just completed (or an array has just opened), then cut at the latest such
/// point that parses once the open containers are closed.
fn close_truncated(text: &str) -> Option<Value> {
    let mut stack: Vec<char> = Vec::new();
    let mut cuts: Vec<CutPoint> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('{'),
            '[' => {
                stack.push('[');
                cuts.push(CutPoint {
                    offset: offset + 1,
                    closers: closers_for(&stack),
                });
            }
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    // Root closed: the prefix is complete JSON
                    return parse_container(&remove_trailing_commas(&text[..=offset]));
                }
                if stack.last() == Some(&'[') {
                    cuts.push(CutPoint {
                        offset: offset + 1,
                        closers: closers_for(&stack),
                    });
                }
            }
            ',' if stack.last() == Some(&'[') => {
                cuts.push(CutPoint {
                    offset,
                    closers: closers_for(&stack),
                });
            }
            _ => {}
        }
    }

    for cut in cuts.iter().rev() {
        let mut repaired = text[..cut.offset].trim_end().to_string();
        if repaired.ends_with(',') {
            repaired.pop();
        }
        repaired.push_str(&cut.closers);
        if let Some(value) = parse_container(&remove_trailing_commas(&repaired)) {
            return Some(value);
        }
    }

    None
}

/// Regex extraction of known string keys, bypassing JSON parsing
pub struct KeyExtraction {
    keys: Vec<String>,
}

impl KeyExtraction {
    pub fn new(keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl RecoveryStrategy for KeyExtraction {
    fn name(&self) -> &'static str {
        "key_extraction"
    }

    fn recover(&self, text: &str) -> Option<Value> {
        let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        let fields = extract_string_fields(text, &keys);
        (!fields.is_empty()).then(|| Value::Object(fields))
    }
}

/// Pull `"key": "value"` pairs out of text that is not valid JSON.
///
/// An unterminated value (output cut off mid-string) runs to the end of the
/// text. Empty values are skipped.
pub fn extract_string_fields(text: &str, keys: &[&str]) -> Map<String, Value> {
    let mut fields = Map::new();

    for key in keys {
        let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)"?"#, regex::escape(key));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        let Some(captures) = re.captures(text) else {
            continue;
        };

        let raw = &captures[1];
        let value = serde_json::from_str::<String>(&format!("\"{}\"", raw))
            .unwrap_or_else(|_| raw.replace("\\\"", "\"").replace("\\n", "\n"));
        let value = value.trim().trim_end_matches(['}', '`']).trim().to_string();

        if !value.is_empty() {
            fields.insert(key.to_string(), Value::String(value));
        }
    }

    fields
}
