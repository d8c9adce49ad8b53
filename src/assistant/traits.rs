//! 远端 Assistant 客户端抽象
//!
//! 所有后端（OpenAI Assistants HTTP / Mock）实现 AssistantClient：建 Thread、写用户消息、
//! 创建与查询 Run、提交工具结果、按顺序列出消息。

use async_trait::async_trait;
use serde_json::Value;

use crate::assistant::{Run, SortOrder, ThreadId, ToolOutput};
use crate::core::RelayError;
use crate::memory::Turn;

#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn create_thread(&self) -> Result<ThreadId, RelayError>;

    async fn post_user_turn(&self, thread: &ThreadId, content: &str) -> Result<(), RelayError>;

    /// tools 为对远端声明的工具定义（function schema），为空时沿用 Assistant 自身配置
    async fn create_run(
        &self,
        thread: &ThreadId,
        assistant_id: &str,
        tools: &[Value],
    ) -> Result<Run, RelayError>;

    async fn get_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run, RelayError>;

    async fn submit_tool_outputs(
        &self,
        thread: &ThreadId,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RelayError>;

    /// 列出 Thread 的全部消息（实现负责翻页）
    async fn list_turns(&self, thread: &ThreadId, order: SortOrder) -> Result<Vec<Turn>, RelayError>;
}
