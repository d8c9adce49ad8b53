//! Tavily 联网搜索工具
//!
//! 每次调用只发一次 POST（不重试）；2xx 响应体原样作为结果（不解析其结构），
//! 非 2xx 转为带状态码的 ToolError，由执行器序列化后交给远端。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::schema::parameters_schema_for;
use crate::tools::{Tool, ToolError};

pub const TAVILY_SEARCH: &str = "tavily_search";

/// 错误响应体保留的最大字符数
const MAX_ERROR_BODY_CHARS: usize = 500;

/// 搜索参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// The search query to look up on the web.
    pub query: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_images: bool,
}

/// Tavily 搜索：持有带超时的 Client、端点与凭据
pub struct TavilySearchTool {
    client: Client,
    endpoint: String,
    api_key: String,
    search_depth: String,
    include_images: bool,
}

impl TavilySearchTool {
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            search_depth: "advanced".to_string(),
            include_images: false,
        }
    }

    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    pub fn with_include_images(mut self, include: bool) -> Self {
        self.include_images = include;
        self
    }

    /// 执行一次搜索，返回提供方的原始 JSON
    pub async fn search(&self, query: &str) -> Result<Value, ToolError> {
        let body = SearchRequest {
            query,
            search_depth: &self.search_depth,
            include_images: self.include_images,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "tavily search failed");
            return Err(ToolError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ToolError::Request(format!("Read body: {e}")))
    }
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        TAVILY_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information (documentation, release notes, news). Args: {\"query\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<SearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("Missing query".to_string()));
        }
        tracing::info!(query = %query, "tavily search");
        self.search(query).await
    }
}
