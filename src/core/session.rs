//! 会话控制器
//!
//! 一个会话对应一个远端 Thread（首次交互时创建）和一份本地 Transcript。
//! 每条用户输入：乐观写入本地 -> submit -> wait -> 完成则拉取远端全量记录合并；失败则不新增消息，
//! 而是返回带原因的 RunFailed，由上层展示。工具轮数超限或超时后远端 Run 仍在进行，
//! 会话放弃该 Thread，下次输入时新建（本地记录保留）。

use std::sync::Arc;

use crate::assistant::ThreadId;
use crate::core::RelayError;
use crate::memory::{Role, TranscriptStore, Turn};
use crate::run::{RunDriver, RunOutcome, RunSummary};

/// 一次用户输入的处理结果
#[derive(Debug, Clone)]
pub enum InteractionOutcome {
    /// 空白输入，未发送
    Ignored,
    /// Run 完成，appended 为本次合并进本地记录的消息
    Replied {
        appended: Vec<Turn>,
        summary: RunSummary,
    },
    /// Run 以失败结束，本地记录不新增助手消息
    RunFailed { reason: String, summary: RunSummary },
}

pub struct SessionController {
    driver: Arc<RunDriver>,
    thread: Option<ThreadId>,
    transcript: TranscriptStore,
}

impl SessionController {
    pub fn new(driver: Arc<RunDriver>) -> Self {
        Self {
            driver,
            thread: None,
            transcript: TranscriptStore::new(),
        }
    }

    /// 处理一条用户输入；&mut self 保证同一会话内不会并发提交
    pub async fn handle_user_input(&mut self, text: &str) -> Result<InteractionOutcome, RelayError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(InteractionOutcome::Ignored);
        }

        let thread = self.ensure_thread().await?;
        self.transcript.push(Turn::user(text));

        let handle = self.driver.submit(&thread, text).await?;
        let outcome = match self.driver.wait(handle).await {
            Ok(outcome) => outcome,
            Err(e @ (RelayError::TooManyToolRounds { .. } | RelayError::Timeout { .. })) => {
                // 远端 Run 仍未结束，原 Thread 在其过期前拒绝新消息；下次输入改用新 Thread
                tracing::warn!(thread_id = %thread, error = %e, "abandoning thread with unsettled run");
                self.thread = None;
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        match outcome {
            RunOutcome::Completed(summary) => {
                let remote: Vec<Turn> = self
                    .driver
                    .fetch_transcript(&thread)
                    .await?
                    .into_iter()
                    .filter(|t| matches!(t.role, Role::User | Role::Assistant))
                    .collect();
                let appended = self.transcript.merge(&remote);
                tracing::info!(
                    thread_id = %thread,
                    run_id = %summary.run_id,
                    appended = appended.len(),
                    "transcript merged"
                );
                Ok(InteractionOutcome::Replied { appended, summary })
            }
            RunOutcome::Failed { summary, reason } => {
                Ok(InteractionOutcome::RunFailed { reason, summary })
            }
        }
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread.as_ref()
    }

    /// 开始新对话：丢弃本地记录，下次输入时新建 Thread（旧 Thread 留在远端）
    pub fn reset(&mut self) {
        if let Some(thread) = self.thread.take() {
            tracing::info!(thread_id = %thread, "session reset");
        }
        self.transcript.clear();
    }

    /// 结束会话，返回最终的本地记录
    pub fn close(self) -> Vec<Turn> {
        tracing::info!(
            thread_id = ?self.thread.as_ref().map(|t| t.as_str()),
            turns = self.transcript.len(),
            "session closed"
        );
        self.transcript.into_turns()
    }

    async fn ensure_thread(&mut self) -> Result<ThreadId, RelayError> {
        if let Some(thread) = &self.thread {
            return Ok(thread.clone());
        }
        let thread = self.driver.client().create_thread().await?;
        tracing::info!(thread_id = %thread, "session thread created");
        self.thread = Some(thread.clone());
        Ok(thread)
    }
}
