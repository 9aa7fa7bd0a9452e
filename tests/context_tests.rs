// Fan-out and merge tests. Tool servers are stood in by in-process axum
// listeners on ephemeral ports; the running-tools view is a fixed directory
// so no child processes are involved.

use async_trait::async_trait;
use augur::config::ToolDescriptor;
use augur::context::{CONTEXT_HEADER, ContextAggregator, QueryError, ToolQueryClient};
use augur::supervisor::ToolDirectory;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

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

/// Serve a fixed `/search` response after an optional delay; returns the port.
async fn spawn_tool_server(reply: Value, delay: Duration) -> u16 {
    let app = Router::new().route(
        "/search",
        post(move |Json(_body): Json<Value>| {
            let reply = reply.clone();
            async move {
                tokio::time::sleep(delay).await;
                Json(reply)
            }
        }),
    );
    spawn_app(app).await
}

async fn spawn_failing_tool_server(error: &str) -> u16 {
    let error = error.to_string();
    let app = Router::new().route(
        "/search",
        post(move |Json(_body): Json<Value>| {
            let error = error.clone();
            async move {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": error})),
                )
            }
        }),
    );
    spawn_app(app).await
}

async fn spawn_app(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("serve");
    });
    port
}

fn aggregator(tools: Vec<ToolDescriptor>, deadline: Duration) -> ContextAggregator {
    let directory: Arc<dyn ToolDirectory> = Arc::new(StaticDirectory { tools });
    ContextAggregator::new(directory, deadline)
}

#[tokio::test]
async fn zero_running_tools_yield_empty_context() {
    let aggregator = aggregator(Vec::new(), Duration::from_secs(1));
    let context = aggregator.build("any prompt").await;
    assert!(context.is_empty());
    assert_eq!(context.render(), None);
}

#[tokio::test]
async fn single_tool_renders_header_and_item() {
    let port = spawn_tool_server(
        json!({"results": [{"title": "T", "description": "D", "url": "U"}]}),
        Duration::ZERO,
    )
    .await;
    let aggregator = aggregator(vec![descriptor("alpha", port)], Duration::from_secs(2));

    let context = aggregator.build("what is rust").await;
    assert_eq!(
        context.render().expect("non-empty"),
        format!("{CONTEXT_HEADER}\n\nalpha result: T. D [source: U]")
    );
}

#[tokio::test]
async fn timed_out_tool_degrades_to_empty_context() {
    let port = spawn_tool_server(json!({"results": []}), Duration::from_secs(5)).await;
    let aggregator = aggregator(vec![descriptor("alpha", port)], Duration::from_millis(300));

    let context = aggregator.build("slow").await;
    assert!(context.is_empty());
    assert_eq!(context.failures().len(), 1);
    assert!(matches!(
        context.failures()[0],
        QueryError::ToolUnavailable { .. }
    ));
}

#[tokio::test]
async fn merge_preserves_configured_order_not_completion_order() {
    // alpha answers slowly, beta instantly; alpha must still come first.
    let alpha_port = spawn_tool_server(
        json!({"results": [{"title": "A", "description": "a", "url": "ua"}]}),
        Duration::from_millis(300),
    )
    .await;
    let beta_port = spawn_tool_server(
        json!({"results": [{"title": "B", "description": "b", "url": "ub"}]}),
        Duration::ZERO,
    )
    .await;
    let aggregator = aggregator(
        vec![descriptor("alpha", alpha_port), descriptor("beta", beta_port)],
        Duration::from_secs(2),
    );

    let context = aggregator.build("ordered").await;
    let tools: Vec<_> = context.items().iter().map(|item| item.tool.as_str()).collect();
    assert_eq!(tools, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn failing_tool_does_not_block_the_healthy_one() {
    let bad_port = spawn_failing_tool_server("boom").await;
    let good_port = spawn_tool_server(
        json!({"results": [{"title": "T", "description": "D", "url": "U"}]}),
        Duration::ZERO,
    )
    .await;
    let aggregator = aggregator(
        vec![descriptor("alpha", bad_port), descriptor("beta", good_port)],
        Duration::from_secs(2),
    );

    let context = aggregator.build("partial").await;
    assert_eq!(context.items().len(), 1);
    assert_eq!(context.items()[0].tool, "beta");
    assert!(matches!(
        &context.failures()[0],
        QueryError::ToolError { tool, detail } if tool == "alpha" && detail == "boom"
    ));
}

#[tokio::test]
async fn contributions_are_capped_per_tool() {
    let results: Vec<Value> = (0..5)
        .map(|n| json!({"title": format!("T{n}"), "description": "D", "url": "U"}))
        .collect();
    let port = spawn_tool_server(json!({"results": results}), Duration::ZERO).await;
    let aggregator = aggregator(vec![descriptor("alpha", port)], Duration::from_secs(2));

    let context = aggregator.build("many").await;
    assert_eq!(context.items().len(), 3);
}

#[tokio::test]
async fn querying_a_tool_that_is_not_running_fails() {
    let directory: Arc<dyn ToolDirectory> = Arc::new(StaticDirectory { tools: Vec::new() });
    let client = ToolQueryClient::new(directory);

    let result = client.query("alpha", "prompt", Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(QueryError::ToolNotRunning { tool }) if tool == "alpha"
    ));
}

#[tokio::test]
async fn unreachable_tool_reports_unavailable() {
    // Nothing listens on this port.
    let directory: Arc<dyn ToolDirectory> = Arc::new(StaticDirectory {
        tools: vec![descriptor("alpha", 1)],
    });
    let client = ToolQueryClient::new(directory);

    let result = client.query("alpha", "prompt", Duration::from_secs(1)).await;
    assert!(matches!(result, Err(QueryError::ToolUnavailable { .. })));
}

#[tokio::test]
async fn code_results_normalize_name_to_title() {
    let port = spawn_tool_server(
        json!({"results": [{
            "name": "owner/repo",
            "description": "a repo",
            "url": "https://example.test/repo",
            "source": "github_repo"
        }]}),
        Duration::ZERO,
    )
    .await;
    let aggregator = aggregator(vec![descriptor("github", port)], Duration::from_secs(2));

    let context = aggregator.build("find repo").await;
    assert_eq!(context.items().len(), 1);
    let item = &context.items()[0];
    assert_eq!(item.title, "owner/repo");
    assert_eq!(item.source, "github_repo");
    assert_eq!(
        item.render(),
        "github result: owner/repo. a repo [source: https://example.test/repo]"
    );
}
