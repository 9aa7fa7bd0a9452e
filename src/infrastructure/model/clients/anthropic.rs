//! Anthropic messages-API client

use super::base::HttpClientBase;
use crate::infrastructure::model::{ModelProvider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1000;

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, model)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: String, model: String) -> Self {
        Self {
            base: HttpClientBase::new("anthropic", endpoint, api_key),
            model,
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn label(&self) -> &str {
        "Anthropic Claude"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.base.build_url(API_PATH);
        let payload = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };
        info!(model = self.model.as_str(), url = %url, "Sending request to Anthropic");

        let response: MessagesResponse = self
            .base
            .post_with_key_header(&url, "x-api-key", &[("anthropic-version", API_VERSION)], &payload)
            .await?;
        debug!("Received response from Anthropic");

        response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ProviderError::invalid_response(&self.base.id, "missing text content"))
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_model_and_token_cap() {
        let payload = MessagesRequest {
            model: "claude-2".into(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: "hi".into(),
            }],
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["model"], "claude-2");
        assert_eq!(value["max_tokens"], 1000);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn first_text_block_wins() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "answer"}]}"#,
        )
        .expect("parse");
        let text = response.content.into_iter().find_map(|block| block.text);
        assert_eq!(text.as_deref(), Some("answer"));
    }
}
