//! Assistant Relay - 远端 Assistant 对话中继
//!
//! 模块划分：
//! - **assistant**: 远端 Assistants 服务抽象（Thread / Run / Message）与 OpenAI、Mock 实现
//! - **config**: 应用配置加载（TOML + 环境变量）与凭据解析
//! - **core**: 错误类型、UI 状态投影、会话控制、主控循环
//! - **memory**: 本地对话记录（Turn / TranscriptStore）
//! - **observability**: tracing 日志初始化
//! - **run**: Run 驱动（轮询、工具轮次、重试、超时）
//! - **tools**: 工具注册表、参数 Schema、网页搜索工具与执行器
//! - **ui**: Ratatui TUI 界面

pub mod assistant;
pub mod config;
pub mod core;
pub mod memory;
pub mod observability;
pub mod run;
pub mod tools;
pub mod ui;

pub use crate::core::RelayError;
