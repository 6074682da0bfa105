use serde::{Deserialize, Serialize};

use super::types::LlmClient;
use super::StructuringError;
use crate::config::AnalyzerConfig;

/// OpenRouter-compatible chat-completion endpoint.
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "anthropic/claude-3-sonnet";

/// Sent as `X-Title` so requests are attributed in the provider dashboard.
const CLIENT_TITLE: &str = "Project Report Analyzer";

/// Blocking chat-completion client for OpenRouter.
pub struct OpenRouterClient {
    api_url: String,
    api_key: String,
    model: String,
    referer: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenRouterClient {
    pub fn new(
        api_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        if api_key.trim().is_empty() {
            return Err(StructuringError::MissingApiKey);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            referer: None,
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, StructuringError> {
        let api_key = config.api_key.as_deref().ok_or(StructuringError::MissingApiKey)?;
        let client = Self::new(&config.api_url, api_key, &config.model, config.timeout_secs)?;
        Ok(match config.referer.as_deref() {
            Some(referer) => client.with_referer(referer),
            None => client,
        })
    }

    /// Set the `HTTP-Referer` header OpenRouter uses for app attribution.
    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Pull `choices[0].message.content` out of a chat-completion envelope.
fn extract_content(body: &str) -> Result<String, StructuringError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| StructuringError::MalformedEnvelope(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or_else(|| {
            StructuringError::MalformedEnvelope("missing choices[0].message.content".into())
        })
}

impl LlmClient for OpenRouterClient {
    fn complete(&self, prompt: &str) -> Result<String, StructuringError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
        };

        let mut request = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("X-Title", CLIENT_TITLE)
            .json(&body);
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                StructuringError::Connection(self.api_url.clone())
            } else if e.is_timeout() {
                StructuringError::HttpClient(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                StructuringError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;
        if !status.is_success() {
            return Err(StructuringError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        extract_content(&text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock client for testing; returns a configurable response.
pub struct MockLlmClient {
    response: String,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
        }
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _prompt: &str) -> Result<String, StructuringError> {
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
