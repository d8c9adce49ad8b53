//! 中继错误类型
//!
//! 远端协议错误（网络、HTTP 状态、解码）、配置错误、Run 循环的上限错误。
//! 工具错误不在此处：它们由 ToolError 表示并被序列化回远端，不会上抛给用户。

use std::time::Duration;

use thiserror::Error;

/// 中继运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),

    /// 连接失败、读超时等传输层错误（可重试）
    #[error("Transport error: {0}")]
    Transport(String),

    /// 远端返回非成功状态码
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    /// 同一 Thread 上已有未结束的 Run
    #[error("A run is already in flight on thread {0}")]
    RunInFlight(String),

    #[error("Run {run_id} exceeded {rounds} tool rounds; the next message starts a new thread")]
    TooManyToolRounds { run_id: String, rounds: usize },

    #[error("Run {run_id} did not settle within {elapsed:?}; the next message starts a new thread")]
    Timeout { run_id: String, elapsed: Duration },
}

impl RelayError {
    /// 传输错误、429 与 5xx 视为暂时性错误，可退避后重试
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport(_) => true,
            RelayError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RelayError::Decode(e.to_string())
        } else {
            RelayError::Transport(e.to_string())
        }
    }
}
