pub mod clients;

pub use clients::{AnthropicClient, OpenAiClient};

use crate::config::ProviderSettings;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no provider is registered under key '{key}'")]
    UnknownProvider { key: String },
    #[error("provider '{provider}' has no API key configured")]
    MissingApiKey { provider: String },
    #[error("provider '{provider}' request failed: {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' returned an invalid response: {detail}")]
    InvalidResponse { provider: String, detail: String },
}

impl ProviderError {
    pub(crate) fn network(provider: &str, source: reqwest::Error) -> Self {
        ProviderError::Network {
            provider: provider.to_string(),
            source,
        }
    }

    pub(crate) fn invalid_response(provider: &str, detail: impl Into<String>) -> Self {
        ProviderError::InvalidResponse {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    /// The message shown to the user in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::UnknownProvider { key } => format!(
                "Model '{key}' is not available. Configure its API key and restart the application."
            ),
            ProviderError::MissingApiKey { provider } => format!(
                "The {provider} API key is not configured. Set the corresponding environment variable."
            ),
            ProviderError::Network { provider, source } => {
                if source.is_connect() {
                    format!("Could not connect to the {provider} API. Check your network connection.")
                } else if source.is_timeout() {
                    format!("The request to the {provider} API timed out. Try again shortly.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!(
                            "The {provider} API rejected the configured API key."
                        ),
                        StatusCode::TOO_MANY_REQUESTS => format!(
                            "The {provider} API rate limit or quota was exceeded. Try again later."
                        ),
                        _ => format!(
                            "The {provider} API request failed with status {}.",
                            status.as_u16()
                        ),
                    }
                } else {
                    format!("A network error occurred while contacting the {provider} API.")
                }
            }
            ProviderError::InvalidResponse { provider, .. } => format!(
                "The {provider} API returned a response that could not be processed. Try again."
            ),
        }
    }
}

/// One LLM backend: send a prompt, get completion text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Opaque selection key (`openai`, `anthropic`, ...).
    fn id(&self) -> &str;

    /// Human-readable name for selection lists.
    fn label(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Resolve a provider credential from the environment. A missing or empty
/// variable means the provider is simply not selectable.
pub fn resolve_api_key(provider: &str, var: &str) -> Option<String> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            warn!(provider, env_var = var, "API key is not set; provider will be unavailable");
            None
        }
    }
}

/// The selectable set of providers, keyed by opaque string. Providers whose
/// credentials are absent at startup never enter the set.
#[derive(Default)]
pub struct ProviderRegistry {
    backends: Vec<Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn from_env(settings: &ProviderSettings) -> Self {
        let mut registry = Self::default();
        if let Some(api_key) = resolve_api_key("openai", "OPENAI_API_KEY") {
            registry = registry.with_backend(Arc::new(OpenAiClient::new(
                api_key,
                settings.openai_model.clone(),
            )));
        }
        if let Some(api_key) = resolve_api_key("anthropic", "ANTHROPIC_API_KEY") {
            registry = registry.with_backend(Arc::new(AnthropicClient::new(
                api_key,
                settings.anthropic_model.clone(),
            )));
        }
        info!(providers = registry.backends.len(), "provider registry initialized");
        registry
    }

    pub fn with_backend(mut self, backend: Arc<dyn ModelProvider>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.backends.iter().any(|backend| backend.id() == key)
    }

    /// `(key, label)` pairs in registration order.
    pub fn available(&self) -> Vec<(String, String)> {
        self.backends
            .iter()
            .map(|backend| (backend.id().to_string(), backend.label().to_string()))
            .collect()
    }

    pub async fn complete(&self, key: &str, prompt: &str) -> Result<String, ProviderError> {
        let backend = self
            .backends
            .iter()
            .find(|backend| backend.id() == key)
            .ok_or_else(|| ProviderError::UnknownProvider {
                key: key.to_string(),
            })?;
        backend.complete(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider;

    #[async_trait]
    impl ModelProvider for StaticProvider {
        fn id(&self) -> &str {
            "static"
        }

        fn label(&self) -> &str {
            "Static"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("ack".to_string())
        }
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let registry = ProviderRegistry::default().with_backend(Arc::new(StaticProvider));
        let result = registry.complete("missing", "hi").await;
        assert!(matches!(
            result,
            Err(ProviderError::UnknownProvider { key }) if key == "missing"
        ));
    }

    #[tokio::test]
    async fn registered_backend_answers() {
        let registry = ProviderRegistry::default().with_backend(Arc::new(StaticProvider));
        assert!(registry.contains("static"));
        assert_eq!(registry.available(), vec![("static".into(), "Static".into())]);
        assert_eq!(registry.complete("static", "hi").await.expect("ok"), "ack");
    }

    #[test]
    fn unknown_provider_message_names_the_key() {
        let error = ProviderError::UnknownProvider {
            key: "mistral".into(),
        };
        assert!(error.user_message().contains("mistral"));
    }
}
