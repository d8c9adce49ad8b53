//! 事件处理
//!
//! 轮询 crossterm 键盘事件，将 Ctrl+L / Ctrl+Q / Esc 映射为 Command（Clear/Quit），
//! 其余按键交给 run_app 拼 input_buffer。是否真正发送由 run_app 按输入锁决定。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::core::Command;

/// 应用事件：来自快捷键的 Command 或原始 KeyEvent
#[derive(Debug, Clone)]
pub enum AppEvent {
    Command(Command),
    Key(KeyEvent),
}

/// 按键 -> 应用事件，不产生副作用
pub fn map_key(key: KeyEvent) -> AppEvent {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('l') if ctrl => AppEvent::Command(Command::Clear),
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => AppEvent::Command(Command::Quit),
        KeyCode::Esc => AppEvent::Command(Command::Quit),
        _ => AppEvent::Key(key),
    }
}

/// 事件处理器：持有 cmd_tx，poll 时读键盘并返回 AppEvent，send 把命令交给编排器
pub struct EventHandler {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl EventHandler {
    pub fn new(cmd_tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { cmd_tx }
    }

    pub fn poll(&self) -> anyhow::Result<Option<AppEvent>> {
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(map_key(key)));
                }
            }
        }
        Ok(None)
    }

    pub fn send(&self, cmd: Command) {
        let _ = self.cmd_tx.send(cmd);
    }
}
