// Orchestrator composition tests with a recording provider in place of a
// real LLM backend.

use async_trait::async_trait;
use augur::config::ToolDescriptor;
use augur::context::{CONTEXT_HEADER, ContextAggregator};
use augur::model::{ModelProvider, ProviderError, ProviderRegistry};
use augur::orchestrator::Orchestrator;
use augur::supervisor::ToolDirectory;
use axum::{Json, Router, routing::post};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

struct StaticDirectory {
    tools: Vec<ToolDescriptor>,
}

#[async_trait]
impl ToolDirectory for StaticDirectory {
    async fn running_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    async fn find_running(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name).cloned()
    }
}

#[derive(Clone, Default)]
struct RecordingProvider {
    prompts: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ModelProvider for RecordingProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn label(&self) -> &str {
        "Mock"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.prompts.lock().await.push(prompt.to_string());
        Ok("ack".to_string())
    }
}

struct FailingProvider;

#[async_trait]
impl ModelProvider for FailingProvider {
    fn id(&self) -> &str {
        "mock"
    }

    fn label(&self) -> &str {
        "Mock"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::InvalidResponse {
            provider: "mock".to_string(),
            detail: "scrambled".to_string(),
        })
    }
}

fn orchestrator_with(
    tools: Vec<ToolDescriptor>,
    provider: Arc<dyn ModelProvider>,
) -> Orchestrator {
    let directory: Arc<dyn ToolDirectory> = Arc::new(StaticDirectory { tools });
    let aggregator = ContextAggregator::new(directory, Duration::from_secs(2));
    let providers = Arc::new(ProviderRegistry::default().with_backend(provider));
    Orchestrator::new(aggregator, providers)
}

async fn spawn_tool_server(reply: Value) -> u16 {
    let app = Router::new().route(
        "/search",
        post(move |Json(_body): Json<Value>| {
            let reply = reply.clone();
            async move { Json(reply) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("serve");
    });
    port
}

fn descriptor(name: &str, port: u16) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        command: PathBuf::from("unused"),
        args: Vec::new(),
        env: HashMap::new(),
        port,
        health_path: Some("/".to_string()),
        query_path: "/search".to_string(),
    }
}

#[tokio::test]
async fn empty_context_falls_back_to_the_bare_prompt() {
    let provider = RecordingProvider::default();
    let orchestrator = orchestrator_with(Vec::new(), Arc::new(provider.clone()));

    let answer = orchestrator.answer("mock", "what is rust").await;
    assert_eq!(answer.content, "ack");
    assert_eq!(answer.full_prompt, "what is rust");
    assert_eq!(answer.context, None);
    assert_eq!(*provider.prompts.lock().await, vec!["what is rust".to_string()]);
}

#[tokio::test]
async fn context_is_spliced_before_the_question() {
    let port = spawn_tool_server(
        json!({"results": [{"title": "T", "description": "D", "url": "U"}]}),
    )
    .await;
    let provider = RecordingProvider::default();
    let orchestrator =
        orchestrator_with(vec![descriptor("alpha", port)], Arc::new(provider.clone()));

    let answer = orchestrator.answer("mock", "what is rust").await;
    let expected = format!(
        "{CONTEXT_HEADER}\n\nalpha result: T. D [source: U]\n\nQuestion: what is rust"
    );
    assert_eq!(answer.full_prompt, expected);
    assert_eq!(*provider.prompts.lock().await, vec![expected]);
}

#[tokio::test]
async fn provider_failure_becomes_the_answer_text() {
    let orchestrator = orchestrator_with(Vec::new(), Arc::new(FailingProvider));

    let answer = orchestrator.answer("mock", "anything").await;
    assert!(answer.content.contains("could not be processed"));
}

#[tokio::test]
async fn unknown_model_key_becomes_the_answer_text() {
    let orchestrator = orchestrator_with(Vec::new(), Arc::new(FailingProvider));

    let answer = orchestrator.answer("missing", "anything").await;
    assert!(answer.content.contains("'missing'"));
    assert!(answer.content.contains("not available"));
}

#[tokio::test]
async fn broken_tool_still_yields_an_answer() {
    // No server listens on the descriptor's port; the tool degrades away and
    // the provider still answers the bare prompt.
    let provider = RecordingProvider::default();
    let orchestrator =
        orchestrator_with(vec![descriptor("alpha", 1)], Arc::new(provider.clone()));

    let answer = orchestrator.answer("mock", "resilient").await;
    assert_eq!(answer.content, "ack");
    assert_eq!(answer.full_prompt, "resilient");
}
