//! OpenAI-compatible chat-completion client.
//!
//! Works against any `/v1/chat/completions` endpoint (SiliconFlow by default).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::extract::ExtractionError;

pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-7B-Instruct";

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Request body; `model` is filled in by the client when empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// Deterministic JSON-object request
    pub fn json(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Something that can answer a chat request with the first choice's content
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, ExtractionError>;
}

/// reqwest client for OpenAI-compatible endpoints
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Blank keeps the default
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url;
        }
        self
    }

    /// Blank keeps the default
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// `<base>/v1/chat/completions`, tolerating a base that already ends in `/v1`
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/v1/{}", base, path)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn api_key(&self) -> Result<&str, ExtractionError> {
        self.api_key.as_deref().ok_or(ExtractionError::NotConfigured)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, mut request: ChatRequest) -> Result<String, ExtractionError> {
        let api_key = self.api_key()?;
        if request.model.is_empty() {
            request.model = self.model.clone();
        }

        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat completion error: {} - {}", status, body);
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ExtractionError::EmptyChoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalization() {
        let c = OpenAiCompatibleClient::new(None);
        assert_eq!(
            c.endpoint("chat/completions"),
            "https://api.siliconflow.cn/v1/chat/completions"
        );

        let c = OpenAiCompatibleClient::new(None).with_base_url("https://example.com/v1/");
        assert_eq!(c.endpoint("audio/transcriptions"), "https://example.com/v1/audio/transcriptions");
    }

    #[test]
    fn test_blank_key_is_unconfigured() {
        assert!(!OpenAiCompatibleClient::new(Some("  ".into())).is_configured());
        assert!(OpenAiCompatibleClient::new(Some("sk-1".into())).is_configured());
    }

    #[test]
    fn test_request_shape() {
        let req = ChatRequest::json("sys", "hello");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_fast() {
        let c = OpenAiCompatibleClient::new(None);
        let err = c.complete(ChatRequest::json("s", "u")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NotConfigured));
    }
}
