mod query;

pub use query::{MAX_ITEMS_PER_TOOL, QueryError, ToolQueryClient};

use crate::application::supervisor::ToolDirectory;
use crate::domain::types::ContextItem;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed first line of every non-empty rendered context block.
pub const CONTEXT_HEADER: &str = "## Additional context from tool servers";

/// The merged result of one fan-out: items in configured tool order plus the
/// per-tool failures that were degraded to diagnostics.
#[derive(Debug, Default)]
pub struct AggregatedContext {
    items: Vec<ContextItem>,
    failures: Vec<QueryError>,
}

impl AggregatedContext {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    pub fn failures(&self) -> &[QueryError] {
        &self.failures
    }

    /// Render to a single block: header line, then one entry per item joined
    /// by blank lines. `None` when no tool contributed anything.
    pub fn render(&self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let body = self
            .items
            .iter()
            .map(ContextItem::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(format!("{CONTEXT_HEADER}\n\n{body}"))
    }
}

/// Fans a prompt out to every running tool server and merges whatever comes
/// back. One tool's failure never aborts the others: partial success is the
/// normal case, and an empty merge simply means the caller falls back to the
/// bare prompt.
pub struct ContextAggregator {
    directory: Arc<dyn ToolDirectory>,
    client: ToolQueryClient,
    deadline: Duration,
}

impl ContextAggregator {
    pub fn new(directory: Arc<dyn ToolDirectory>, deadline: Duration) -> Self {
        let client = ToolQueryClient::new(Arc::clone(&directory));
        Self {
            directory,
            client,
            deadline,
        }
    }

    pub async fn build(&self, prompt: &str) -> AggregatedContext {
        let running = self.directory.running_tools().await;
        if running.is_empty() {
            debug!("no tool servers running; context is empty");
            return AggregatedContext::default();
        }

        // join_all preserves input order, so the merge follows the configured
        // tool order no matter which server answers first.
        let calls = running.iter().map(|descriptor| {
            let name = descriptor.name.clone();
            async move {
                let outcome = self.client.query(&name, prompt, self.deadline).await;
                (name, outcome)
            }
        });
        let outcomes = join_all(calls).await;

        let mut aggregated = AggregatedContext::default();
        for (tool, outcome) in outcomes {
            match outcome {
                Ok(items) => {
                    debug!(tool = tool.as_str(), count = items.len(), "tool contributed context");
                    aggregated.items.extend(items);
                }
                Err(error) => {
                    warn!(tool = tool.as_str(), %error, "tool query failed; omitting its contribution");
                    aggregated.failures.push(error);
                }
            }
        }
        aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(tool: &str, title: &str) -> ContextItem {
        ContextItem {
            tool: tool.into(),
            title: title.into(),
            body: "D".into(),
            url: "U".into(),
            source: "brave_search".into(),
        }
    }

    #[test]
    fn empty_context_renders_to_none() {
        let aggregated = AggregatedContext::default();
        assert!(aggregated.is_empty());
        assert_eq!(aggregated.render(), None);
    }

    #[test]
    fn rendering_joins_items_under_the_header() {
        let aggregated = AggregatedContext {
            items: vec![item("alpha", "T"), item("beta", "S")],
            failures: Vec::new(),
        };
        let rendered = aggregated.render().expect("non-empty");
        assert_eq!(
            rendered,
            "## Additional context from tool servers\n\n\
             alpha result: T. D [source: U]\n\n\
             beta result: S. D [source: U]"
        );
    }
}
