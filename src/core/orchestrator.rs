//! 会话编排器：主控循环
//!
//! 负责：根据配置创建远端客户端 / 工具 / RunDriver，建立 cmd/state 两通道，
//! 并在后台任务中逐条消费用户命令（Submit/Clear/Quit），驱动 SessionController 并更新 UI 状态。
//! 命令按顺序处理：Run 未结束时新的输入排在其后，不会交错。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::assistant::{AssistantClient, MockAssistantClient, OpenAiAssistantClient};
use crate::config::AppConfig;
use crate::core::{AgentPhase, InteractionOutcome, RelayError, SessionController, UiState};
use crate::memory::Turn;
use crate::run::{RunDriver, RunEvent, RunPolicy};
use crate::tools::{TavilySearchTool, ToolExecutor, ToolRegistry};

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone)]
pub enum Command {
    /// 提交用户输入
    Submit(String),
    /// 开始新对话（新 Thread）
    Clear,
    /// 退出应用
    Quit,
}

/// 预构建的组件：远端客户端、工具执行器、Assistant ID
pub struct Components {
    pub client: Arc<dyn AssistantClient>,
    pub executor: Arc<ToolExecutor>,
    pub assistant_id: String,
}

/// 根据配置创建组件；非 mock 模式下缺少凭据直接返回 Config 错误
pub fn create_components(cfg: &AppConfig, mock: bool) -> Result<Components, RelayError> {
    create_components_with(cfg, mock, |key| std::env::var(key).ok())
}

/// 同 create_components，凭据回退所用的环境变量读取可替换
pub fn create_components_with<F>(cfg: &AppConfig, mock: bool, env: F) -> Result<Components, RelayError>
where
    F: Fn(&str) -> Option<String>,
{
    let (client, assistant_id, search_key): (Arc<dyn AssistantClient>, String, String) = if mock {
        tracing::warn!("Using Mock assistant client (offline)");
        (
            Arc::new(MockAssistantClient::new()),
            "asst_mock".to_string(),
            cfg.tools
                .search
                .api_key
                .clone()
                .or_else(|| env("TAVILY_API_KEY"))
                .unwrap_or_default(),
        )
    } else {
        let creds = cfg.credentials_with(env)?;
        let client = OpenAiAssistantClient::new(
            &cfg.assistant.base_url,
            &creds.openai_api_key,
            cfg.assistant.request_timeout_secs,
        )?;
        tracing::info!(base_url = %cfg.assistant.base_url, assistant_id = %creds.assistant_id, "Using OpenAI assistant");
        (Arc::new(client), creds.assistant_id, creds.search_api_key)
    };

    let search = &cfg.tools.search;
    let mut tools = ToolRegistry::new();
    tools.register(
        TavilySearchTool::new(&search.endpoint, &search_key, search.timeout_secs)
            .with_search_depth(search.search_depth.clone())
            .with_include_images(search.include_images),
    );

    Ok(Components {
        client,
        executor: Arc::new(ToolExecutor::new(
            tools,
            cfg.tools.tool_timeout_secs,
            cfg.tools.max_output_chars,
        )),
        assistant_id,
    })
}

/// 创建会话运行时：返回命令发送端、状态接收端；后台任务消费命令并更新 state。
pub fn create_session(
    cfg: &AppConfig,
    components: Components,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let driver = RunDriver::new(
        components.client,
        components.executor,
        components.assistant_id,
        RunPolicy::from(&cfg.run),
    )
    .with_advertised_tools(cfg.assistant.advertise_tools)
    .with_events(event_tx);
    let mut controller = SessionController::new(Arc::new(driver));

    // 两通道：UI -> Core 命令；Core -> UI 状态快照
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(UiState::default());

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Submit(input) => {
                    if input.trim().is_empty() {
                        continue;
                    }
                    // 乐观展示用户消息，Run 期间锁定输入
                    let mut pending = controller.transcript().turns().to_vec();
                    pending.push(Turn::user(input.trim()));
                    let _ = state_tx.send(UiState::thinking(pending.clone()));

                    let result = {
                        let fut = controller.handle_user_input(&input);
                        tokio::pin!(fut);
                        loop {
                            tokio::select! {
                                res = &mut fut => break res,
                                Some(event) = event_rx.recv() => {
                                    let _ = state_tx.send(project_event(&pending, event));
                                }
                            }
                        }
                    };
                    while event_rx.try_recv().is_ok() {}

                    let history = controller.transcript().turns().to_vec();
                    let state = match result {
                        Ok(InteractionOutcome::RunFailed { reason, .. }) => {
                            UiState::error(history, format!("Assistant run failed: {reason}"))
                        }
                        Ok(_) => UiState::idle(history),
                        Err(e) => {
                            tracing::error!(error = %e, "interaction failed");
                            UiState::error(history, e.to_string())
                        }
                    };
                    let _ = state_tx.send(state);
                }
                Command::Clear => {
                    controller.reset();
                    let _ = state_tx.send(UiState::default());
                }
                Command::Quit => break,
            }
        }
        controller.close();
    });

    (cmd_tx, state_rx)
}

/// Run 进度事件 -> UI 状态：执行工具时显示工具名，其余保持「思考中」
fn project_event(history: &[Turn], event: RunEvent) -> UiState {
    match event {
        RunEvent::ToolStarted { tool, .. } => UiState {
            phase: AgentPhase::ToolExecuting,
            active_tool: Some(tool),
            ..UiState::thinking(history.to_vec())
        },
        RunEvent::StatusChanged { .. } | RunEvent::ToolFinished(_) => {
            UiState::thinking(history.to_vec())
        }
    }
}
