use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation is disabled: no API key configured")]
    Disabled,

    #[error("network error: {0}")]
    Network(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("rate limited by generation API")]
    RateLimited,

    #[error("generation API error: {0}")]
    Api(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

/// System and user messages for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Chat-completions backend turning a prompt into raw text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, api_key: &str, prompt: &Prompt) -> Result<String, GenerationError>;
}

pub const PERPLEXITY_URL: &str = "https://api.perplexity.ai/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl ChatResponse {
    fn into_content(self) -> Result<String, GenerationError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("No choices in response".to_string()))
    }
}

/// Perplexity chat completions (OpenAI-compatible request/response shape).
pub struct PerplexityProvider {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
}

impl PerplexityProvider {
    pub fn new(model: String, temperature: f32, timeout: Duration) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: PERPLEXITY_URL.to_string(),
            model,
            temperature,
        })
    }

    /// Point the provider at another OpenAI-compatible endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl GenerationProvider for PerplexityProvider {
    fn name(&self) -> &str {
        "Perplexity"
    }

    async fn complete(&self, api_key: &str, prompt: &Prompt) -> Result<String, GenerationError> {
        info!("Requesting generation (model: {}, temperature: {})", self.model, self.temperature);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            return Err(GenerationError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        if let Some(usage) = &body.usage {
            info!(
                "Generation finished. Tokens: {} prompt + {} completion",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        body.into_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_openai_shape() {
        let request = ChatRequest {
            model: "sonar-pro",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "sonar-pro");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!((json["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_response_content_is_first_choice() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"ticker\":\"VNM\"}"}}],"citations":[]}"#,
        )
        .unwrap();

        assert_eq!(body.into_content().unwrap(), r#"{"ticker":"VNM"}"#);
    }

    #[test]
    fn test_response_without_choices_is_invalid() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(body.into_content(), Err(GenerationError::InvalidResponse(_))));
    }

    #[test]
    fn test_provider_builds() {
        let provider = PerplexityProvider::new("sonar-pro".into(), 0.2, Duration::from_secs(60))
            .unwrap()
            .with_url("http://localhost:9/chat");
        assert_eq!(provider.url, "http://localhost:9/chat");
        assert_eq!(provider.name(), "Perplexity");
    }
}
