use serde::{Deserialize, Serialize};

const FALLBACK_LABEL: &str = "the same language as the transcript";

/// Human-readable language name for a transcript language code
pub fn language_label(code: &str) -> Option<&'static str> {
    let label = match code.trim().to_lowercase().as_str() {
        "ko" => "Korean",
        "en" => "English",
        "ja" => "Japanese",
        "zh" | "zh-cn" => "Simplified Chinese",
        "zh-tw" => "Traditional Chinese",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "th" => "Thai",
        "hi" => "Hindi",
        "ar" => "Arabic",
        _ => return None,
    };
    Some(label)
}

/// Output language for every generated title, summary and explanation of
/// one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLanguage {
    code: Option<String>,
}

impl TargetLanguage {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into().trim().to_lowercase();
        Self {
            code: (!code.is_empty()).then_some(code),
        }
    }

    /// No preference; prompts ask for the transcript's own language
    pub fn unspecified() -> Self {
        Self { code: None }
    }

    /// The requested language wins; otherwise the language detected in the
    /// transcript.
    pub fn resolve(requested: Option<&str>, detected: Option<&str>) -> Self {
        fn pick(code: Option<&str>) -> Option<&str> {
            code.map(str::trim).filter(|c| !c.is_empty())
        }
        match pick(requested).or_else(|| pick(detected)) {
            Some(code) => Self::new(code),
            None => Self::unspecified(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn label(&self) -> &'static str {
        self.code
            .as_deref()
            .and_then(language_label)
            .unwrap_or(FALLBACK_LABEL)
    }

    pub fn is_korean(&self) -> bool {
        self.code.as_deref() == Some("ko")
    }

    pub fn is_english(&self) -> bool {
        matches!(self.code.as_deref(), Some("en") | Some("en-us") | Some("en-gb"))
    }
}

impl Default for TargetLanguage {
    fn default() -> Self {
        Self::unspecified()
    }
}
