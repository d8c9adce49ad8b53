//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（阶段、历史、锁、错误）；会话与 Run 状态由编排器维护并投影到 UiState。

use serde::Serialize;

use crate::memory::Turn;

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug, Serialize)]
pub struct UiState {
    pub phase: AgentPhase,
    pub history: Vec<Turn>,
    pub active_tool: Option<String>,
    pub input_locked: bool,
    pub error_message: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            phase: AgentPhase::Idle,
            history: Vec::new(),
            active_tool: None,
            input_locked: false,
            error_message: None,
        }
    }
}

impl UiState {
    /// 空闲状态（可输入）
    pub fn idle(history: Vec<Turn>) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    /// 等待远端回复（锁定输入）
    pub fn thinking(history: Vec<Turn>) -> Self {
        Self {
            phase: AgentPhase::Thinking,
            history,
            input_locked: true,
            ..Self::default()
        }
    }

    /// 出错，解锁输入并展示原因
    pub fn error(history: Vec<Turn>, message: impl Into<String>) -> Self {
        Self {
            phase: AgentPhase::Error,
            history,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// 会话阶段（UI 投影用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    Idle,
    Thinking,
    ToolExecuting,
    Error,
}
