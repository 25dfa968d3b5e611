use super::{ChatMessage, GenerationRequest, LLMConfig, LLMProvider, LLMResponse, LLM};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// LMStudio / any OpenAI-compatible chat completions server
pub struct LMStudioProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

/// Request body shared by LMStudio and OpenAI
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionUsage {
    total_tokens: u32,
}

impl ChatCompletionRequest {
    fn from_request(model: &str, request: &GenerationRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: request.messages(),
            max_tokens: request.max_new_tokens,
            temperature: request.temperature,
        }
    }
}

impl ChatCompletionResponse {
    fn into_llm_response(self, provider: &str) -> Result<LLMResponse> {
        let content = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No response from {}", provider))?
            .message
            .content;

        Ok(LLMResponse {
            content,
            tokens_used: self.usage.map(|u| u.total_tokens),
        })
    }
}

fn build_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

impl LMStudioProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for LMStudioProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LLMResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("LMStudio endpoint not configured"))?;

        let body = ChatCompletionRequest::from_request(&self.config.model, request);

        debug!(
            "Sending request to LMStudio at {} ({} prompt chars, max {} tokens)",
            endpoint,
            request.prompt.len(),
            request.max_new_tokens
        );

        let mut builder = self.client.post(endpoint).json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("LMStudio API error {}: {}", status, text));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion.into_llm_response("LMStudio")
    }

    async fn is_available(&self) -> bool {
        let endpoint = match &self.config.endpoint {
            Some(ep) => ep,
            None => return false,
        };

        let models_endpoint = endpoint.replace("/chat/completions", "/models");

        match self.client.get(&models_endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::LMStudio
    }
}

/// Gemini provider implementation
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
    #[serde(rename = "candidateCount")]
    candidate_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

impl GeminiContent {
    fn text(text: String) -> Self {
        Self {
            parts: vec![GeminiPart { text }],
        }
    }
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("Gemini API key required"));
        }

        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key not configured"))?;

        let body = GeminiRequest {
            contents: vec![GeminiContent::text(request.prompt.clone())],
            system_instruction: request.system.clone().map(GeminiContent::text),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_new_tokens,
                temperature: request.temperature,
                candidate_count: 1,
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.config.model, api_key
        );

        debug!("Sending request to Gemini API ({} prompt chars)", request.prompt.len());

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, text));
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let content = gemini_response
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| anyhow!("No response from Gemini"))?;

        Ok(LLMResponse {
            content,
            tokens_used: gemini_response.usage_metadata.map(|u| u.total_token_count),
        })
    }

    async fn is_available(&self) -> bool {
        if let Some(api_key) = &self.config.api_key {
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models?key={}",
                api_key
            );

            match self.client.get(&url).send().await {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        } else {
            false
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

/// OpenAI provider implementation
pub struct OpenAIProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("OpenAI API key required"));
        }

        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("OpenAI API key not configured"))?;

        let body = ChatCompletionRequest::from_request(&self.config.model, request);
        let url = "https://api.openai.com/v1/chat/completions";

        debug!("Sending request to OpenAI API ({} prompt chars)", request.prompt.len());

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, text));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion.into_llm_response("OpenAI")
    }

    async fn is_available(&self) -> bool {
        if let Some(api_key) = &self.config.api_key {
            let url = "https://api.openai.com/v1/models";

            match self
                .client
                .get(url)
                .header("Authorization", format!("Bearer {}", api_key))
                .send()
                .await
            {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        } else {
            false
        }
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::OpenAI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_completion_body_uses_request_parameters() {
        let request = GenerationRequest::new("split this")
            .with_system("you are a chapterizer")
            .with_temperature(0.2)
            .with_max_new_tokens(800);
        let body = ChatCompletionRequest::from_request("local-model", &request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "local-model");
        assert_eq!(json["max_tokens"], 800);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "split this");
    }

    #[test]
    fn test_chat_completion_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{}"}}],"usage":{"total_tokens":12}}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let response = parsed.into_llm_response("test").unwrap();
        assert_eq!(response.content, "{}");
        assert_eq!(response.tokens_used, Some(12));
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parsed.into_llm_response("test").is_err());
    }

    #[test]
    fn test_gemini_body_carries_system_instruction() {
        let body = GeminiRequest {
            contents: vec![GeminiContent::text("hi".to_string())],
            system_instruction: Some(GeminiContent::text("sys".to_string())),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: 10,
                temperature: 0.1,
                candidate_count: 1,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
    }
}
