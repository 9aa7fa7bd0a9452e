//! OpenAI chat-completions client

use super::base::HttpClientBase;
use crate::infrastructure::model::{ModelProvider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const API_PATH: &str = "/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    base: HttpClientBase,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, model)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: String, model: String) -> Self {
        Self {
            base: HttpClientBase::new("openai", endpoint, api_key),
            model,
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    fn id(&self) -> &str {
        &self.base.id
    }

    fn label(&self) -> &str {
        "OpenAI GPT"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = self.base.build_url(API_PATH);
        let payload = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
        };
        info!(model = self.model.as_str(), url = %url, "Sending request to OpenAI");

        let response: ChatResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| ProviderError::invalid_response(&self.base.id, "missing message content"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_a_single_user_message() {
        let payload = ChatRequest {
            model: "gpt-3.5-turbo".into(),
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".into(),
            }],
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn response_without_choices_is_invalid() {
        let response: ChatResponse = serde_json::from_str("{}").expect("parse");
        assert!(response.choices.is_empty());
    }
}
