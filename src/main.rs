//! Assistant Relay
//!
//! 入口：加载配置、初始化日志、创建远端客户端与工具、启动会话编排器与 TUI。

use std::path::PathBuf;

use anyhow::Context;
use assistant_relay::{
    config::load_config,
    core::{create_components, create_session},
    observability,
    ui::run_app,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "assistant-relay", about = "Chat with a hosted assistant from the terminal")]
struct Args {
    /// 配置文件路径（默认 config/default.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 使用离线 Mock 客户端，不访问远端服务
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = load_config(args.config).context("Failed to load config")?;

    observability::init(&cfg.app.log_file)
        .with_context(|| format!("Failed to open log file {}", cfg.app.log_file.display()))?;

    // 凭据缺失在进入 TUI 前失败
    let components = match create_components(&cfg, args.mock) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("assistant-relay: {e}");
            std::process::exit(1);
        }
    };

    let (cmd_tx, state_rx) = create_session(&cfg, components);

    run_app(state_rx, cmd_tx, &cfg.app)
        .await
        .context("App run failed")?;

    Ok(())
}
