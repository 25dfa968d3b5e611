pub mod gateway;
pub mod language;
pub mod providers;
pub mod recovery;
pub mod retry;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gateway::{GatewayKey, GenerationGateway};
pub use language::TargetLanguage;
pub use recovery::{recover_json, RecoveryChain, RecoveryStrategy};
pub use retry::{generate_with_retry, Backoff, RetryPolicy};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LLMProvider {
    LMStudio,
    Gemini,
    OpenAI,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    /// Token budget used when a request does not set its own
    pub max_tokens: u32,
    /// Temperature used when a request does not set its own
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::LMStudio,
            endpoint: Some("http://127.0.0.1:8000/v1/chat/completions".to_string()),
            api_key: None,
            model: "meta-llama/Llama-3.2-3B-Instruct".to_string(),
            max_tokens: 2048,
            temperature: 0.2,
            timeout_seconds: 120,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings for generation calls that need high-fidelity output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 10_000,
            backoff: Backoff::Linear,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            std::time::Duration::from_millis(self.base_delay_ms),
            self.backoff,
        )
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One text-generation call: prompt plus sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_new_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.2,
            max_new_tokens: 512,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    /// Chat-style rendering used by the OpenAI-compatible providers
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<LLMResponse>;
    async fn is_available(&self) -> bool;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::LMStudio => Ok(Box::new(providers::LMStudioProvider::new(config.clone())?)),
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
        LLMProvider::OpenAI => Ok(Box::new(providers::OpenAIProvider::new(config.clone())?)),
    }
}

/// Stand-in used when no provider could be built. Every call fails, which
/// sends each pipeline stage down its fallback path.
pub struct UnavailableLLM {
    pub reason: String,
}

#[async_trait]
impl LLM for UnavailableLLM {
    async fn generate(&self, _request: &GenerationRequest) -> Result<LLMResponse> {
        Err(anyhow::anyhow!("language model unavailable: {}", self.reason))
    }

    async fn is_available(&self) -> bool {
        false
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}
