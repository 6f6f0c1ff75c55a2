use std::time::Duration;

use async_trait::async_trait;
use deskpilot_core::config::LlmConfig;
use deskpilot_core::errors::{UpstreamError, UpstreamService};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prompt-in, text-out access to a language model.
///
/// No retries happen at this layer. Output is untrusted text and callers
/// must parse or validate it before acting on it.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, UpstreamError>;
}

/// OpenAI-compatible chat-completions client (Groq by default).
#[derive(Clone)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| UpstreamError::Transport {
                service: UpstreamService::LanguageModel,
                message: error.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout {
                service: UpstreamService::LanguageModel,
                after_secs: self.timeout_secs,
            }
        } else {
            UpstreamError::Transport {
                service: UpstreamService::LanguageModel,
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|error| self.map_send_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service: UpstreamService::LanguageModel,
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                self.map_send_error(error)
            } else {
                UpstreamError::Decode {
                    service: UpstreamService::LanguageModel,
                    message: error.to_string(),
                }
            }
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| UpstreamError::Decode {
                service: UpstreamService::LanguageModel,
                message: "response contained no choices".to_string(),
            })?;

        debug!(
            event_name = "agent.llm.completed",
            model = %self.model,
            response_chars = content.len(),
            "language model completion received"
        );
        Ok(content)
    }
}
