//! HTTP 客户端测试
//!
//! 使用 wiremock 模拟 Tavily 搜索与 OpenAI Assistants 端点。

use std::sync::Arc;
use std::time::Duration;

use assistant_relay::assistant::{
    AssistantClient, OpenAiAssistantClient, RunStatus, SortOrder, ThreadId,
};
use assistant_relay::config::AppConfig;
use assistant_relay::core::RelayError;
use assistant_relay::memory::{AnnotationKind, Role, Turn};
use assistant_relay::run::{RetryPolicy, RunDriver, RunOutcome, RunPolicy};
use assistant_relay::tools::{
    TavilySearchTool, Tool, ToolCallOutcome, ToolError, ToolExecutor, ToolRegistry,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Tavily search
// ============================================================================

fn search_tool(server: &MockServer) -> TavilySearchTool {
    TavilySearchTool::new(&format!("{}/search", server.uri()), "tvly-test", 5)
}

#[tokio::test]
async fn test_search_posts_query_and_returns_raw_payload() {
    let server = MockServer::start().await;
    let payload = json!({
        "query": "LangGraph release notes",
        "results": [{ "title": "Release v0.2", "url": "https://example.com", "score": 0.9 }]
    });
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("authorization", "Bearer tvly-test"))
        .and(body_json(json!({
            "query": "LangGraph release notes",
            "search_depth": "advanced",
            "include_images": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let result = search_tool(&server)
        .execute(json!({ "query": "LangGraph release notes" }))
        .await
        .unwrap();
    assert_eq!(result, payload);
}

#[tokio::test]
async fn test_search_http_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = search_tool(&server)
        .execute(json!({ "query": "LangGraph" }))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ToolError::Status {
            status: 500,
            body: "upstream exploded".to_string()
        }
    );
}

#[tokio::test]
async fn test_search_failure_becomes_error_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let mut registry = ToolRegistry::new();
    registry.register(search_tool(&server));
    let executor = ToolExecutor::new(registry, 5, 16000);
    let call = assistant_relay::assistant::ToolCall {
        id: "call_9".into(),
        name: "tavily_search".into(),
        arguments: r#"{"query":"LangGraph"}"#.into(),
    };

    let report = executor.execute(&call).await;
    assert!(matches!(report.outcome, ToolCallOutcome::ToolFailed { .. }));
    let output = report.output().unwrap();
    assert_eq!(output.tool_call_id, "call_9");
    let body: Value = serde_json::from_str(&output.output).unwrap();
    assert_eq!(body["error"]["status"], 401);
}

// ============================================================================
// OpenAI Assistants
// ============================================================================

fn assistant_client(server: &MockServer) -> OpenAiAssistantClient {
    OpenAiAssistantClient::new(&server.uri(), "sk-test", 5).unwrap()
}

fn run_json(status: &str) -> Value {
    json!({
        "id": "run_1",
        "object": "thread.run",
        "thread_id": "thread_abc",
        "assistant_id": "asst_1",
        "status": status,
        "required_action": null,
        "last_error": null
    })
}

fn message_json(id: &str, role: &str, text: &str) -> Value {
    json!({
        "id": id,
        "object": "thread.message",
        "role": role,
        "content": [{ "type": "text", "text": { "value": text, "annotations": [] } }]
    })
}

#[tokio::test]
async fn test_create_thread_sends_auth_and_beta_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(header("authorization", "Bearer sk-test"))
        .and(header("openai-beta", "assistants=v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "thread_abc", "object": "thread" })))
        .expect(1)
        .mount(&server)
        .await;

    let thread = assistant_client(&server).create_thread().await.unwrap();
    assert_eq!(thread, ThreadId("thread_abc".into()));
}

#[tokio::test]
async fn test_list_turns_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/messages"))
        .and(query_param("order", "asc"))
        .and(query_param_is_missing("after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                message_json("msg_1", "user", "What is LangGraph?"),
                message_json("msg_2", "assistant", "A graph runtime."),
            ],
            "first_id": "msg_1",
            "last_id": "msg_2",
            "has_more": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/messages"))
        .and(query_param("after", "msg_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{
                "id": "msg_3",
                "role": "assistant",
                "content": [{ "type": "text", "text": {
                    "value": "See the docs.",
                    "annotations": [{ "type": "file_citation", "text": "【4:0†docs.md】" }]
                }}]
            }],
            "first_id": "msg_3",
            "last_id": "msg_3",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let turns = assistant_client(&server)
        .list_turns(&ThreadId("thread_abc".into()), SortOrder::Asc)
        .await
        .unwrap();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[0], Turn::user("What is LangGraph?"));
    assert_eq!(turns[2].role, Role::Assistant);
    assert_eq!(turns[2].annotations[0].kind, AnnotationKind::FileCitation);
}

#[tokio::test]
async fn test_get_run_exposes_pending_tool_calls() {
    let server = MockServer::start().await;
    let mut body = run_json("requires_action");
    body["required_action"] = json!({
        "type": "submit_tool_outputs",
        "submit_tool_outputs": { "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": { "name": "tavily_search", "arguments": "{\"query\":\"LangGraph release notes\"}" }
        }]}
    });
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let run = assistant_client(&server)
        .get_run(&ThreadId("thread_abc".into()), "run_1")
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::RequiresAction);
    assert_eq!(run.pending_tool_calls[0].id, "call_1");
}

#[tokio::test]
async fn test_api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_missing/messages"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "No thread found with id 'thread_missing'.", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let err = assistant_client(&server)
        .post_user_turn(&ThreadId("thread_missing".into()), "hello")
        .await
        .unwrap_err();
    match err {
        RelayError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No thread found with id 'thread_missing'.");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_driver_against_http_backend_retries_5xx_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/messages"))
        .and(body_json(json!({ "role": "user", "content": "What is LangGraph?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_json("msg_1", "user", "What is LangGraph?")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/runs"))
        .and(body_json(json!({ "assistant_id": "asst_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_abc/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("completed")))
        .mount(&server)
        .await;

    let policy = RunPolicy {
        poll_interval: Duration::from_millis(1),
        max_tool_rounds: 2,
        deadline: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        },
    };
    let driver = RunDriver::new(
        Arc::new(assistant_client(&server)),
        Arc::new(ToolExecutor::new(ToolRegistry::new(), 5, 16000)),
        "asst_1",
        policy,
    );

    let thread = ThreadId("thread_abc".into());
    let handle = driver.submit(&thread, "What is LangGraph?").await.unwrap();
    let outcome = driver.wait(handle).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed(ref s) if s.run_id == "run_1"));
}

#[tokio::test]
async fn test_default_config_creates_run_without_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_json("msg_1", "user", "hi")))
        .mount(&server)
        .await;
    // 请求体必须完全等于 {"assistant_id": ...}，不带 tools 字段
    Mock::given(method("POST"))
        .and(path("/threads/thread_abc/runs"))
        .and(body_json(json!({ "assistant_id": "asst_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_json("queued")))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = AppConfig::default();
    let mut registry = ToolRegistry::new();
    registry.register(search_tool(&server));
    let driver = RunDriver::new(
        Arc::new(assistant_client(&server)),
        Arc::new(ToolExecutor::new(registry, 5, 16000)),
        "asst_1",
        RunPolicy::from(&cfg.run),
    )
    .with_advertised_tools(cfg.assistant.advertise_tools);

    let handle = driver
        .submit(&ThreadId("thread_abc".into()), "hi")
        .await
        .unwrap();
    drop(handle);

    let requests = server.received_requests().await.unwrap();
    let run_request = requests
        .iter()
        .find(|r| r.url.path() == "/threads/thread_abc/runs")
        .unwrap();
    let body: Value = serde_json::from_slice(&run_request.body).unwrap();
    assert!(body.get("tools").is_none());
}
