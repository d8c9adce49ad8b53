//! 工具执行器
//!
//! 持有 ToolRegistry、单次超时与输出长度上限；把远端的 ToolCall 解析、执行并归类为 ToolCallOutcome。
//! 工具失败（含超时）会变成错误对象形式的 ToolOutput；参数不是合法 JSON 或工具未注册时不产出 ToolOutput，
//! 但结果里会明确记录。每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::assistant::{ToolCall, ToolOutput};
use crate::tools::{ToolError, ToolRegistry};

/// 单个 ToolCall 的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    Succeeded(ToolOutput),
    /// 工具报错，output 为序列化的错误对象
    ToolFailed { output: ToolOutput, error: ToolError },
    /// arguments 不是合法 JSON，不提交输出
    MalformedArguments(String),
    /// 未注册的工具名，不提交输出
    UnknownTool,
}

/// 单个 ToolCall 的处理记录
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallReport {
    pub call_id: String,
    pub tool: String,
    pub outcome: ToolCallOutcome,
}

impl ToolCallReport {
    /// 需要提交给远端的输出（若有）
    pub fn output(&self) -> Option<&ToolOutput> {
        match &self.outcome {
            ToolCallOutcome::Succeeded(output) | ToolCallOutcome::ToolFailed { output, .. } => {
                Some(output)
            }
            ToolCallOutcome::MalformedArguments(_) | ToolCallOutcome::UnknownTool => None,
        }
    }
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolOutput
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    max_output_chars: usize,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64, max_output_chars: usize) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            max_output_chars,
        }
    }

    /// 处理一个 ToolCall；不会返回错误，所有情况都归入 ToolCallOutcome
    pub async fn execute(&self, call: &ToolCall) -> ToolCallReport {
        let report = |outcome| ToolCallReport {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            outcome,
        };

        let Some(tool) = self.registry.get(&call.name) else {
            tracing::warn!(tool = %call.name, call_id = %call.id, "unknown tool requested, no output");
            return report(ToolCallOutcome::UnknownTool);
        };

        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %e,
                    "malformed tool arguments, no output"
                );
                return report(ToolCallOutcome::MalformedArguments(e.to_string()));
            }
        };

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = match timeout(self.timeout, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(call.name.clone())),
        };

        let (ok, outcome): (bool, &str) = match &result {
            Ok(_) => (true, "ok"),
            Err(ToolError::Timeout(_)) => (false, "timeout"),
            Err(_) => (false, "error"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.name,
            "call_id": call.id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(payload) => report(ToolCallOutcome::Succeeded(self.output_for(call, &payload))),
            Err(error) => {
                let output = self.output_for(call, &error.to_payload());
                report(ToolCallOutcome::ToolFailed { output, error })
            }
        }
    }

    /// 对远端声明的 function 工具定义
    pub fn function_tools(&self) -> Vec<Value> {
        self.registry.to_function_tools()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    fn output_for(&self, call: &ToolCall, payload: &Value) -> ToolOutput {
        ToolOutput {
            tool_call_id: call.id.clone(),
            output: truncate_chars(&payload.to_string(), self.max_output_chars),
        }
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        s.to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
