//! OpenAI Assistants (v2) HTTP 客户端
//!
//! 通过 reqwest 调用 threads / messages / runs 端点（可配置 base_url，便于代理或测试服务器）；
//! 线上 JSON 结构只在本模块内解析，对外统一转为 Run / Turn 等领域类型。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::assistant::{AssistantClient, Run, RunStatus, SortOrder, ThreadId, ToolCall, ToolOutput};
use crate::core::RelayError;
use crate::memory::{Annotation, AnnotationKind, Role, Turn};

/// 单页消息数上限（API 允许的最大值）
const PAGE_LIMIT: &str = "100";
/// 错误响应体写入错误信息时的最大字符数
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    thread_id: String,
    status: RunStatus,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<LastError>,
}

#[derive(Deserialize)]
struct RequiredAction {
    #[serde(default)]
    submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Deserialize)]
struct SubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<ToolCallObject>,
}

#[derive(Deserialize)]
struct ToolCallObject {
    id: String,
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct LastError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct MessageObject {
    role: Role,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextContent {
    value: String,
    #[serde(default)]
    annotations: Vec<AnnotationObject>,
}

#[derive(Deserialize)]
struct AnnotationObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl From<RunObject> for Run {
    fn from(r: RunObject) -> Self {
        let pending_tool_calls = r
            .required_action
            .and_then(|a| a.submit_tool_outputs)
            .map(|s| {
                s.tool_calls
                    .into_iter()
                    .map(|c| ToolCall {
                        id: c.id,
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let last_error = r.last_error.map(|e| match e.code {
            Some(code) => format!("{code}: {}", e.message),
            None => e.message,
        });
        Run {
            id: r.id,
            thread_id: ThreadId(r.thread_id),
            status: r.status,
            pending_tool_calls,
            last_error,
        }
    }
}

impl From<MessageObject> for Turn {
    /// 多个 text 段以空行拼接，注解按出现顺序合并；图片等非文本段忽略
    fn from(m: MessageObject) -> Self {
        let mut texts = Vec::new();
        let mut annotations = Vec::new();
        for part in m.content {
            if let ContentPart::Text { text } = part {
                texts.push(text.value);
                annotations.extend(text.annotations.into_iter().filter_map(|a| {
                    let kind = match a.kind.as_str() {
                        "file_citation" => AnnotationKind::FileCitation,
                        "file_path" => AnnotationKind::FilePath,
                        _ => return None,
                    };
                    Some(Annotation { kind, text: a.text })
                }));
            }
        }
        Turn {
            role: m.role,
            content: texts.join("\n\n"),
            annotations,
        }
    }
}

/// 从错误响应体中提取 error.message，失败时截断原文
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

/// Assistants v2 客户端：持有带鉴权头的 reqwest Client 与 base_url
pub struct OpenAiAssistantClient {
    client: Client,
    base_url: String,
}

impl OpenAiAssistantClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| RelayError::Config("OpenAI API key contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("openai-beta", HeaderValue::from_static("assistants=v2"));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| RelayError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RelayError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| RelayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssistantClient for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<ThreadId, RelayError> {
        let thread: ThreadObject = self
            .send(self.client.post(self.url("/threads")).json(&json!({})))
            .await?;
        tracing::info!(thread_id = %thread.id, "thread created");
        Ok(ThreadId(thread.id))
    }

    async fn post_user_turn(&self, thread: &ThreadId, content: &str) -> Result<(), RelayError> {
        let body = json!({ "role": "user", "content": content });
        let _: Value = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread}/messages")))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread: &ThreadId,
        assistant_id: &str,
        tools: &[Value],
    ) -> Result<Run, RelayError> {
        let mut body = json!({ "assistant_id": assistant_id });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }
        let run: RunObject = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread}/runs")))
                    .json(&body),
            )
            .await?;
        Ok(run.into())
    }

    async fn get_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run, RelayError> {
        let run: RunObject = self
            .send(
                self.client
                    .get(self.url(&format!("/threads/{thread}/runs/{run_id}"))),
            )
            .await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread: &ThreadId,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RelayError> {
        let body = json!({ "tool_outputs": outputs });
        let run: RunObject = self
            .send(
                self.client
                    .post(self.url(&format!(
                        "/threads/{thread}/runs/{run_id}/submit_tool_outputs"
                    )))
                    .json(&body),
            )
            .await?;
        Ok(run.into())
    }

    async fn list_turns(&self, thread: &ThreadId, order: SortOrder) -> Result<Vec<Turn>, RelayError> {
        let url = self.url(&format!("/threads/{thread}/messages"));
        let mut turns = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut query = vec![("order", order.as_str().to_string()), ("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }
            let page: MessageList = self.send(self.client.get(&url).query(&query)).await?;
            turns.extend(page.data.into_iter().map(Turn::from));
            match (page.has_more, page.last_id) {
                (true, Some(last)) => after = Some(last),
                _ => break,
            }
        }
        tracing::debug!(thread_id = %thread, count = turns.len(), "listed turns");
        Ok(turns)
    }
}
