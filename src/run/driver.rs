//! Run 驱动：submit -> 轮询 -> (执行工具 -> 提交结果)* -> 结束
//!
//! 固定间隔轮询远端 Run；requires_action 时通过 ToolExecutor 执行工具并提交 ToolOutput 后继续轮询。
//! 工具轮数有上限，整个等待过程有总时限；查询与提交结果遇到暂时性错误时按指数退避重试。
//! 同一 Thread 同时只允许一个未结束的 Run（RunHandle 持有占用标记，结束或丢弃时释放）。

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::assistant::{AssistantClient, Run, RunStatus, SortOrder, ThreadId, ToolCall, ToolOutput};
use crate::config::RunSection;
use crate::core::RelayError;
use crate::memory::Turn;
use crate::tools::{ToolCallReport, ToolExecutor};

/// 暂时性错误的重试策略；max_attempts 为总尝试次数（含首次）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// 第 attempt 次失败后的等待：base * 2^(attempt-1)，不超过 max_backoff
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Run 等待策略
#[derive(Debug, Clone)]
pub struct RunPolicy {
    pub poll_interval: Duration,
    pub max_tool_rounds: usize,
    pub deadline: Duration,
    pub retry: RetryPolicy,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self::from(&RunSection::default())
    }
}

impl From<&RunSection> for RunPolicy {
    fn from(section: &RunSection) -> Self {
        Self {
            poll_interval: section.poll_interval(),
            max_tool_rounds: section.max_tool_rounds,
            deadline: section.deadline(),
            retry: RetryPolicy {
                max_attempts: section.retry_attempts.max(1),
                base_backoff: Duration::from_millis(section.retry_backoff_ms),
                max_backoff: Duration::from_millis(section.retry_backoff_max_ms),
            },
        }
    }
}

/// 推送给前端的进度事件
#[derive(Debug, Clone)]
pub enum RunEvent {
    StatusChanged { run_id: String, status: RunStatus },
    ToolStarted { call_id: String, tool: String },
    ToolFinished(ToolCallReport),
}

/// 一次 Run 的执行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: String,
    pub tool_rounds: usize,
    pub tool_calls: Vec<ToolCallReport>,
}

/// Run 的结束方式
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// 远端以 failed（或 cancelled / expired / incomplete）结束
    Failed { summary: RunSummary, reason: String },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Failed { summary, .. } => summary,
        }
    }
}

struct InFlightGuard {
    active: Arc<Mutex<HashSet<ThreadId>>>,
    thread: ThreadId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.thread);
    }
}

/// 已提交、尚未结束的 Run
pub struct RunHandle {
    run: Run,
    _guard: InFlightGuard,
}

/// Run 驱动器：持有远端客户端、工具执行器与策略，可被多个会话共享
pub struct RunDriver {
    client: Arc<dyn AssistantClient>,
    executor: Arc<ToolExecutor>,
    assistant_id: String,
    policy: RunPolicy,
    advertise_tools: bool,
    active: Arc<Mutex<HashSet<ThreadId>>>,
    event_tx: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunDriver {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        executor: Arc<ToolExecutor>,
        assistant_id: impl Into<String>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            client,
            executor,
            assistant_id: assistant_id.into(),
            policy,
            advertise_tools: false,
            active: Arc::new(Mutex::new(HashSet::new())),
            event_tx: None,
        }
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 为 true 时在 create_run 中声明本地工具（替换远端 Assistant 的工具配置）
    pub fn with_advertised_tools(mut self, advertise: bool) -> Self {
        self.advertise_tools = advertise;
        self
    }

    pub fn client(&self) -> &Arc<dyn AssistantClient> {
        &self.client
    }

    /// 写入用户消息并创建 Run；同一 Thread 已有未结束的 Run 时返回 RunInFlight
    pub async fn submit(&self, thread: &ThreadId, content: &str) -> Result<RunHandle, RelayError> {
        let guard = self.acquire(thread)?;
        self.client.post_user_turn(thread, content).await?;
        let tools = if self.advertise_tools {
            self.executor.function_tools()
        } else {
            Vec::new()
        };
        let run = self
            .client
            .create_run(thread, &self.assistant_id, &tools)
            .await?;
        tracing::info!(thread_id = %thread, run_id = %run.id, status = %run.status, "run submitted");
        self.emit(RunEvent::StatusChanged {
            run_id: run.id.clone(),
            status: run.status,
        });
        Ok(RunHandle { run, _guard: guard })
    }

    /// 等待 Run 结束；超过总时限返回 Timeout，工具轮数超限返回 TooManyToolRounds
    pub async fn wait(&self, handle: RunHandle) -> Result<RunOutcome, RelayError> {
        let RunHandle { run, _guard } = handle;
        let run_id = run.id.clone();
        let started = Instant::now();
        match tokio::time::timeout(self.policy.deadline, self.settle(run)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(run_id = %run_id, "run did not settle before deadline");
                Err(RelayError::Timeout {
                    run_id,
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    /// 读取 Thread 全部消息（旧到新），暂时性错误重试
    pub async fn fetch_transcript(&self, thread: &ThreadId) -> Result<Vec<Turn>, RelayError> {
        self.with_retry("list_turns", || self.client.list_turns(thread, SortOrder::Asc))
            .await
    }

    async fn settle(&self, mut run: Run) -> Result<RunOutcome, RelayError> {
        let thread = run.thread_id.clone();
        let run_id = run.id.clone();
        let mut summary = RunSummary {
            run_id: run_id.clone(),
            ..RunSummary::default()
        };
        let mut last_status = run.status;

        loop {
            match run.status {
                status if status.is_pending() => {
                    tokio::time::sleep(self.policy.poll_interval).await;
                    run = self
                        .with_retry("get_run", || self.client.get_run(&thread, &run_id))
                        .await?;
                }
                RunStatus::RequiresAction => {
                    if summary.tool_rounds >= self.policy.max_tool_rounds {
                        tracing::warn!(run_id = %run_id, rounds = summary.tool_rounds, "tool round limit reached");
                        return Err(RelayError::TooManyToolRounds {
                            run_id,
                            rounds: summary.tool_rounds,
                        });
                    }
                    summary.tool_rounds += 1;
                    let outputs = self
                        .resolve_tool_calls(&run.pending_tool_calls, &mut summary)
                        .await;
                    tracing::info!(
                        run_id = %run_id,
                        round = summary.tool_rounds,
                        outputs = outputs.len(),
                        "submitting tool outputs"
                    );
                    run = self
                        .with_retry("submit_tool_outputs", || {
                            self.client.submit_tool_outputs(&thread, &run_id, &outputs)
                        })
                        .await?;
                }
                RunStatus::Completed => {
                    tracing::info!(run_id = %run_id, tool_rounds = summary.tool_rounds, "run completed");
                    return Ok(RunOutcome::Completed(summary));
                }
                status => {
                    let reason = run
                        .last_error
                        .clone()
                        .unwrap_or_else(|| format!("run ended with status {status}"));
                    tracing::warn!(run_id = %run_id, status = %status, reason = %reason, "run failed");
                    return Ok(RunOutcome::Failed { summary, reason });
                }
            }

            if run.status != last_status {
                tracing::debug!(run_id = %run_id, from = %last_status, to = %run.status, "run status changed");
                last_status = run.status;
                self.emit(RunEvent::StatusChanged {
                    run_id: run_id.clone(),
                    status: run.status,
                });
            }
        }
    }

    /// 执行本轮全部 ToolCall，返回需提交的输出；每个调用的处理结果记入 summary
    async fn resolve_tool_calls(
        &self,
        calls: &[ToolCall],
        summary: &mut RunSummary,
    ) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            self.emit(RunEvent::ToolStarted {
                call_id: call.id.clone(),
                tool: call.name.clone(),
            });
            let report = self.executor.execute(call).await;
            if let Some(output) = report.output() {
                outputs.push(output.clone());
            }
            self.emit(RunEvent::ToolFinished(report.clone()));
            summary.tool_calls.push(report);
        }
        outputs
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, RelayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let retry = &self.policy.retry;
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    let delay = retry.backoff(attempt);
                    tracing::warn!(
                        op = %op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient remote error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn acquire(&self, thread: &ThreadId) -> Result<InFlightGuard, RelayError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(thread.clone()) {
            return Err(RelayError::RunInFlight(thread.to_string()));
        }
        Ok(InFlightGuard {
            active: self.active.clone(),
            thread: thread.clone(),
        })
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
        };
        assert_eq!(retry.backoff(1), Duration::from_millis(500));
        assert_eq!(retry.backoff(2), Duration::from_millis(1000));
        assert_eq!(retry.backoff(3), Duration::from_millis(1500));
        assert_eq!(retry.backoff(30), Duration::from_millis(1500));
    }

    #[test]
    fn test_policy_from_section() {
        let mut section = RunSection::default();
        section.retry_attempts = 0;
        let policy = RunPolicy::from(&section);
        assert_eq!(policy.poll_interval, Duration::from_millis(500));
        assert_eq!(policy.retry.max_attempts, 1);
    }
}
