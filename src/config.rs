use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chapters::ChapterSettings;
use crate::cognitive::{CognitiveLoadSettings, MIN_WINDOW_SIZE};
use crate::error::{AnalyzerError, Result};
use crate::knowledge::KnowledgeSettings;
use crate::llm::{LLMConfig, LLMProvider};
use crate::transcription::TranscriptionSettings;

/// Configuration for the lecture analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language model provider and sampling defaults
    pub llm: LLMConfig,

    /// Chapter boundary and metadata tunables
    pub chapters: ChapterSettings,

    /// Sliding-window load aggregation
    pub cognitive_load: CognitiveLoadSettings,

    /// Triple extraction chunking
    pub knowledge: KnowledgeSettings,

    /// Speech-to-text settings
    pub transcription: TranscriptionSettings,

    /// Output and storage settings
    pub output: OutputConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding per-job JSON artifacts
    pub jobs_dir: PathBuf,

    /// Log level used when neither RUST_LOG nor --verbose is given
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("./jobs"),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

const CONFIG_PATHS: [&str; 2] = ["lecture-lens.toml", "config/lecture-lens.toml"];

impl Config {
    /// Load configuration from `path`, or from the first default location
    /// that exists, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let mut found = None;
                for candidate in CONFIG_PATHS {
                    let candidate = Path::new(candidate);
                    if candidate.exists() {
                        found = Some(Self::from_file(candidate)?);
                        break;
                    }
                }
                found.unwrap_or_else(|| {
                    tracing::debug!("No configuration file found, using defaults");
                    Self::default()
                })
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| AnalyzerError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnalyzerError::Config(e.to_string()))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `LECTURE_LENS_*` and the service-level variable names. Values
    /// that do not parse are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));

        if let Some(provider) = first(&["LECTURE_LENS_LLM_PROVIDER", "LLM_PROVIDER"]) {
            match parse_provider(&provider) {
                Some(provider) => self.llm.provider = provider,
                None => tracing::warn!("Ignoring unknown LLM provider '{}'", provider),
            }
        }
        if let Some(endpoint) = first(&["LECTURE_LENS_LLM_ENDPOINT", "LLM_BASE_URL"]) {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(model) = first(&["LECTURE_LENS_LLM_MODEL", "LLM_MODEL"]) {
            self.llm.model = model;
        }
        if let Some(api_key) = first(&["LECTURE_LENS_LLM_API_KEY", "LLM_API_KEY"]) {
            self.llm.api_key = Some(api_key);
        }
        if let Some(model) = first(&["LECTURE_LENS_WHISPER_MODEL", "WHISPER_MODEL"]) {
            self.transcription.model = model;
        }
        if let Some(fp16) = first(&["LECTURE_LENS_WHISPER_FP16", "WHISPER_FP16"]) {
            self.transcription.fp16 = matches!(fp16.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(lines) = first(&["LECTURE_LENS_MAX_PROMPT_LINES", "MAX_SEGMENTS_FOR_PROMPT"]) {
            parse_into(&lines, "max prompt lines", &mut self.chapters.max_prompt_lines);
        }
        if let Some(window) = first(&["LECTURE_LENS_WINDOW_SIZE"]) {
            parse_into(&window, "window size", &mut self.cognitive_load.window_size);
        }
        if let Some(dir) = first(&["LECTURE_LENS_JOBS_DIR"]) {
            self.output.jobs_dir = PathBuf::from(dir);
        }
        if let Some(level) = first(&["LECTURE_LENS_LOG_LEVEL"]) {
            self.output.log_level = level;
        }
        if let Some(port) = first(&["LECTURE_LENS_PORT", "PORT"]) {
            parse_into(&port, "port", &mut self.server.port);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| AnalyzerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(AnalyzerError::Config(msg.to_string()));

        if !(self.cognitive_load.window_size.is_finite() && self.cognitive_load.window_size >= MIN_WINDOW_SIZE) {
            return fail("cognitive_load.window_size must be at least 1 second");
        }
        if self.chapters.min_chapters > self.chapters.max_chapters {
            return fail("chapters.min_chapters must not exceed chapters.max_chapters");
        }
        if self.chapters.max_chapters == 0 {
            return fail("chapters.max_chapters must be greater than 0");
        }
        if !(self.chapters.min_duration.is_finite() && self.chapters.min_duration > 0.0) {
            return fail("chapters.min_duration must be greater than 0");
        }
        if self.chapters.fallback_parts == 0 {
            return fail("chapters.fallback_parts must be greater than 0");
        }
        if self.chapters.max_prompt_lines == 0 {
            return fail("chapters.max_prompt_lines must be greater than 0");
        }
        if self.llm.retry.max_attempts == 0 {
            return fail("llm.retry.max_attempts must be greater than 0");
        }
        if self.llm.timeout_seconds == 0 {
            return fail("llm.timeout_seconds must be greater than 0");
        }
        if self.knowledge.chunk_words == 0 || self.knowledge.overlap_words >= self.knowledge.chunk_words {
            return fail("knowledge.overlap_words must be smaller than a non-zero knowledge.chunk_words");
        }
        if self.transcription.timeout_seconds == 0 {
            return fail("transcription.timeout_seconds must be greater than 0");
        }
        if matches!(self.llm.provider, LLMProvider::OpenAI | LLMProvider::Gemini) && self.llm.api_key.is_none() {
            tracing::warn!("⚠️ No API key configured for {:?}; generation calls will fail", self.llm.provider);
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Lecture Lens Configuration:\n\
            - LLM: {:?} / {}\n\
            - Chapters: {}-{} (min {}s)\n\
            - Load Window: {}s\n\
            - Whisper Model: {}\n\
            - Jobs Directory: {}",
            self.llm.provider,
            self.llm.model,
            self.chapters.min_chapters,
            self.chapters.max_chapters,
            self.chapters.min_duration,
            self.cognitive_load.window_size,
            self.transcription.model,
            self.output.jobs_dir.display()
        )
    }
}

fn parse_provider(raw: &str) -> Option<LLMProvider> {
    match raw.trim().to_lowercase().as_str() {
        "lmstudio" | "remote" | "local" | "vllm" => Some(LLMProvider::LMStudio),
        "openai" => Some(LLMProvider::OpenAI),
        "gemini" => Some(LLMProvider::Gemini),
        _ => None,
    }
}

fn parse_into<T: std::str::FromStr>(raw: &str, what: &str, target: &mut T) {
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!("Ignoring invalid {} '{}'", what, raw),
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn with_chapters(mut self, chapters: ChapterSettings) -> Self {
        self.config.chapters = chapters;
        self
    }

    pub fn with_window_size(mut self, window_size: f64) -> Self {
        self.config.cognitive_load.window_size = window_size;
        self
    }

    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output.jobs_dir = dir.into();
        self
    }

    pub fn with_whisper_model(mut self, model: impl Into<String>) -> Self {
        self.config.transcription.model = model.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
