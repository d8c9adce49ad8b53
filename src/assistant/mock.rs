//! Mock Assistant 客户端（用于测试与离线演示，无需 API）
//!
//! 每次 create_run 取出一段预设脚本（MockStep 序列），get_run 每调用一次推进一步；
//! 没有脚本时直接回显用户最后一条消息。记录提交的工具结果，便于断言。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::assistant::{AssistantClient, Run, RunStatus, SortOrder, ThreadId, ToolCall, ToolOutput};
use crate::core::RelayError;
use crate::memory::{Role, Turn};

/// 脚本中的一步：get_run 被调用时应用
#[derive(Clone, Debug)]
pub enum MockStep {
    /// 切换到指定状态（如 InProgress）
    Status(RunStatus),
    /// 进入 requires_action，等待这些工具调用的结果
    RequireTools(Vec<ToolCall>),
    /// 写入助手回复并完成
    Complete(Turn),
    /// 以给定原因失败
    Fail(String),
    /// 本次 get_run 返回传输错误，状态不变
    TransportError(String),
}

struct MockRun {
    thread: ThreadId,
    status: RunStatus,
    pending: Vec<ToolCall>,
    last_error: Option<String>,
    steps: VecDeque<MockStep>,
}

#[derive(Default)]
struct MockState {
    threads: HashMap<ThreadId, Vec<Turn>>,
    runs: HashMap<String, MockRun>,
    scripts: VecDeque<Vec<MockStep>>,
    submitted: Vec<(String, Vec<ToolOutput>)>,
    advertised_tools: Vec<Value>,
    get_run_calls: usize,
}

/// Mock 客户端：状态放在 Mutex 中，所有方法不跨 await 持锁
#[derive(Default)]
pub struct MockAssistantClient {
    state: Mutex<MockState>,
}

impl MockAssistantClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一段脚本，供下一次 create_run 使用
    pub fn push_script(&self, steps: Vec<MockStep>) {
        self.lock().scripts.push_back(steps);
    }

    pub fn with_script(self, steps: Vec<MockStep>) -> Self {
        self.push_script(steps);
        self
    }

    /// 已提交的工具结果：(run_id, outputs)，按提交顺序
    pub fn submitted_outputs(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.lock().submitted.clone()
    }

    /// 最近一次 create_run 声明的工具定义
    pub fn advertised_tools(&self) -> Vec<Value> {
        self.lock().advertised_tools.clone()
    }

    pub fn get_run_calls(&self) -> usize {
        self.lock().get_run_calls
    }

    /// 远端 Thread 中的全部消息
    pub fn thread_turns(&self, thread: &ThreadId) -> Vec<Turn> {
        self.lock().threads.get(thread).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // 测试中 panic 后锁中毒时仍可读取状态
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn snapshot(id: &str, run: &MockRun) -> Run {
    Run {
        id: id.to_string(),
        thread_id: run.thread.clone(),
        status: run.status,
        pending_tool_calls: run.pending.clone(),
        last_error: run.last_error.clone(),
    }
}

fn not_found(what: &str, id: &str) -> RelayError {
    RelayError::Api {
        status: 404,
        message: format!("No {what} found with id '{id}'"),
    }
}

#[async_trait]
impl AssistantClient for MockAssistantClient {
    async fn create_thread(&self) -> Result<ThreadId, RelayError> {
        let thread = ThreadId(format!("thread_{}", uuid::Uuid::new_v4().simple()));
        self.lock().threads.insert(thread.clone(), Vec::new());
        Ok(thread)
    }

    async fn post_user_turn(&self, thread: &ThreadId, content: &str) -> Result<(), RelayError> {
        let mut state = self.lock();
        let turns = state
            .threads
            .get_mut(thread)
            .ok_or_else(|| not_found("thread", thread.as_str()))?;
        turns.push(Turn::user(content));
        Ok(())
    }

    async fn create_run(
        &self,
        thread: &ThreadId,
        _assistant_id: &str,
        tools: &[Value],
    ) -> Result<Run, RelayError> {
        let mut state = self.lock();
        if !state.threads.contains_key(thread) {
            return Err(not_found("thread", thread.as_str()));
        }
        state.advertised_tools = tools.to_vec();
        let steps = state.scripts.pop_front().unwrap_or_default();
        let id = format!("run_{}", uuid::Uuid::new_v4().simple());
        let run = MockRun {
            thread: thread.clone(),
            status: RunStatus::Queued,
            pending: Vec::new(),
            last_error: None,
            steps: steps.into(),
        };
        let snap = snapshot(&id, &run);
        state.runs.insert(id, run);
        Ok(snap)
    }

    async fn get_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run, RelayError> {
        let mut state = self.lock();
        state.get_run_calls += 1;
        let MockState { threads, runs, .. } = &mut *state;
        let run = runs
            .get_mut(run_id)
            .filter(|r| &r.thread == thread)
            .ok_or_else(|| not_found("run", run_id))?;

        // 等待工具结果或已结束时不推进
        if run.status == RunStatus::RequiresAction || run.status.is_terminal() {
            return Ok(snapshot(run_id, run));
        }

        match run.steps.pop_front() {
            Some(MockStep::Status(status)) => run.status = status,
            Some(MockStep::RequireTools(calls)) => {
                run.status = RunStatus::RequiresAction;
                run.pending = calls;
            }
            Some(MockStep::Complete(reply)) => {
                threads.entry(thread.clone()).or_default().push(reply);
                run.status = RunStatus::Completed;
            }
            Some(MockStep::Fail(reason)) => {
                run.status = RunStatus::Failed;
                run.last_error = Some(reason);
            }
            Some(MockStep::TransportError(msg)) => return Err(RelayError::Transport(msg)),
            None => {
                let turns = threads.entry(thread.clone()).or_default();
                let last_user = turns
                    .iter()
                    .rev()
                    .find(|t| t.role == Role::User)
                    .map(|t| t.content.clone())
                    .unwrap_or_else(|| "(no input)".to_string());
                turns.push(Turn::assistant(format!("Echo from Mock: {last_user}")));
                run.status = RunStatus::Completed;
            }
        }
        Ok(snapshot(run_id, run))
    }

    async fn submit_tool_outputs(
        &self,
        thread: &ThreadId,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, RelayError> {
        let mut state = self.lock();
        let run = state
            .runs
            .get_mut(run_id)
            .filter(|r| &r.thread == thread)
            .ok_or_else(|| not_found("run", run_id))?;
        if run.status != RunStatus::RequiresAction {
            return Err(RelayError::Api {
                status: 400,
                message: format!("Runs in status \"{}\" do not accept tool outputs.", run.status),
            });
        }
        run.status = RunStatus::InProgress;
        run.pending.clear();
        let snap = snapshot(run_id, run);
        state.submitted.push((run_id.to_string(), outputs.to_vec()));
        Ok(snap)
    }

    async fn list_turns(&self, thread: &ThreadId, order: SortOrder) -> Result<Vec<Turn>, RelayError> {
        let mut turns = self
            .lock()
            .threads
            .get(thread)
            .cloned()
            .ok_or_else(|| not_found("thread", thread.as_str()))?;
        if order == SortOrder::Desc {
            turns.reverse();
        }
        Ok(turns)
    }
}
