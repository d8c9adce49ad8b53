//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并把结果或 ToolError 转为提交给远端的 ToolOutput。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// 工具执行失败；不会上抛给用户，而是序列化为 ToolOutput 交给远端推理
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::Status { .. } => "http_status",
            ToolError::Request(_) => "request_failed",
            ToolError::Timeout(_) => "timeout",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 提交给远端的错误对象
    pub fn to_payload(&self) -> Value {
        json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
                "status": self.status(),
            }
        })
    }
}

/// 工具 trait：名称、描述（供远端理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 ToolCall.name）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>（BTreeMap 保证声明顺序稳定）
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 生成远端 Run 所需的 function 工具定义
    pub fn to_function_tools(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[async_trait]
    impl Tool for Ping {
        fn name(&self) -> &str {
            "ping"
        }

        fn description(&self) -> &str {
            "Reply with pong"
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(json!("pong"))
        }
    }

    #[test]
    fn test_function_tools_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Ping);
        let tools = registry.to_function_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "ping");
        assert_eq!(tools[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_error_payload_carries_status() {
        let err = ToolError::Status { status: 500, body: "boom".into() };
        let payload = err.to_payload();
        assert_eq!(payload["error"]["status"], 500);
        assert_eq!(payload["error"]["kind"], "http_status");
        assert!(payload["error"]["message"].as_str().unwrap().contains("500"));

        let payload = ToolError::Timeout("tavily_search".into()).to_payload();
        assert!(payload["error"]["status"].is_null());
    }
}
