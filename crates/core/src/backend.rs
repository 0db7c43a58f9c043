//! Generative backend client.
//!
//! [`GenerativeBackend`] is the seam the orchestrator talks to. [`ChatCompletionsBackend`] is
//! the production implementation for any OpenAI-compatible `/chat/completions` endpoint.

use crate::config::{GenerationConfig, ModelConfig};
use crate::prompt::Prompt;
use crate::{StackError, StackResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Token accounting for one or more backend calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Raw text returned by one backend call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Fail fast when credentials are missing, before any attempt is made.
    fn ensure_configured(&self) -> StackResult<()>;

    async fn generate(&self, prompt: &Prompt, model: &ModelConfig) -> StackResult<Completion>;
}

/// OpenAI-compatible chat-completions client.
pub struct ChatCompletionsBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatCompletionsBackend {
    pub fn new(config: &GenerationConfig) -> StackResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(StackError::HttpClient)?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().map(|k| k.as_str().to_string()),
        })
    }

    fn api_key(&self) -> StackResult<&str> {
        self.api_key
            .as_deref()
            .ok_or(StackError::MissingConfig("GENERATION_API_KEY"))
    }
}

#[async_trait]
impl GenerativeBackend for ChatCompletionsBackend {
    fn ensure_configured(&self) -> StackResult<()> {
        self.api_key().map(|_| ())
    }

    async fn generate(&self, prompt: &Prompt, model: &ModelConfig) -> StackResult<Completion> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: &model.name,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: model.max_tokens,
            temperature: model.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(StackError::BackendRequest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StackError::BackendStatus {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(StackError::BackendRequest)?;
        completion_from_response(parsed)
    }
}

fn completion_from_response(response: ChatResponse) -> StackResult<Completion> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StackError::BackendResponse("completion had no content".into()))?;

    let usage = response.usage.unwrap_or_default();
    Ok(Completion {
        text,
        usage: TokenUsage {
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
            total_tokens: usage.total_tokens.unwrap_or(0),
        },
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(api_key: Option<&str>) -> GenerationConfig {
        GenerationConfig::new(
            api_key.map(|k| stack_types::NonEmptyText::new(k).unwrap()),
            "https://llm.example/v1/".into(),
            vec![ModelConfig::new("fast")],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        let backend = ChatCompletionsBackend::new(&config(None)).unwrap();
        assert!(matches!(
            backend.ensure_configured(),
            Err(StackError::MissingConfig("GENERATION_API_KEY"))
        ));

        let backend = ChatCompletionsBackend::new(&config(Some("sk-test"))).unwrap();
        assert!(backend.ensure_configured().is_ok());
        assert_eq!(backend.base_url, "https://llm.example/v1");
    }

    #[test]
    fn test_completion_from_response_reads_text_and_usage() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "  ## Summary\n"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
            }"#,
        )
        .unwrap();
        let completion = completion_from_response(response).unwrap();
        assert_eq!(completion.text, "## Summary");
        assert_eq!(completion.usage.total_tokens, 30);
    }

    #[test]
    fn test_completion_without_content_is_rejected() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap();
        assert!(matches!(
            completion_from_response(response),
            Err(StackError::BackendResponse(_))
        ));

        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(completion_from_response(response).is_err());
    }

    #[test]
    fn test_token_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        });
        total.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 20,
            total_tokens: 30,
        });
        assert_eq!(total.total_tokens, 33);
        assert_eq!(total.prompt_tokens, 11);
    }
}
