use crate::application::context::ContextAggregator;
use crate::infrastructure::model::ProviderRegistry;
use std::sync::Arc;
use tracing::{error, info};

/// The outcome of one answered prompt. `content` is always present: a
/// provider failure degrades to its user-facing message, never an error.
#[derive(Debug, Clone)]
pub struct Answer {
    pub model: String,
    pub content: String,
    pub full_prompt: String,
    pub context: Option<String>,
}

/// Thin composition layer: gather context, splice it into the prompt, ask
/// the selected provider.
pub struct Orchestrator {
    aggregator: ContextAggregator,
    providers: Arc<ProviderRegistry>,
}

impl Orchestrator {
    pub fn new(aggregator: ContextAggregator, providers: Arc<ProviderRegistry>) -> Self {
        Self {
            aggregator,
            providers,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub async fn answer(&self, model: &str, prompt: &str) -> Answer {
        let aggregated = self.aggregator.build(prompt).await;
        let context = aggregated.render();
        let full_prompt = compose_prompt(context.as_deref(), prompt);
        info!(
            model,
            context_items = aggregated.items().len(),
            degraded_tools = aggregated.failures().len(),
            "dispatching prompt to provider"
        );

        let content = match self.providers.complete(model, &full_prompt).await {
            Ok(text) => text,
            Err(err) => {
                error!(model, %err, "provider request failed");
                err.user_message()
            }
        };

        Answer {
            model: model.to_string(),
            content,
            full_prompt,
            context,
        }
    }
}

/// Empty context falls back to the bare prompt; otherwise the context block
/// precedes the question.
pub fn compose_prompt(context: Option<&str>, prompt: &str) -> String {
    match context {
        Some(context) if !context.is_empty() => format!("{context}\n\nQuestion: {prompt}"),
        _ => prompt.to_string(),
    }
}
