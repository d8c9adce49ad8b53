//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，将用户输入与快捷键转为 Command 发送给编排器，
//! 每帧用 draw 渲染 UiState 与输入缓冲。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::config::AppSection;
use crate::core::{Command, UiState};
use crate::ui::event::{AppEvent, EventHandler};
use crate::ui::render::{draw, Labels};

/// 输入框与滚动位置
#[derive(Debug, Default)]
struct InputState {
    buffer: String,
    scroll: usize,
}

/// 处理一个事件，返回需要发给编排器的命令（若有）
///
/// Run 未结束（input_locked）时不接受新输入，也不接受 Ctrl+L：Clear 会排在当前 Run 之后执行，
/// 刚到的回复会被清掉。Quit 始终放行。
fn apply_event(ev: AppEvent, state: &UiState, input: &mut InputState) -> Option<Command> {
    match ev {
        AppEvent::Command(Command::Quit) => Some(Command::Quit),
        AppEvent::Command(_) if state.input_locked => None,
        AppEvent::Command(cmd) => {
            input.buffer.clear();
            Some(cmd)
        }
        AppEvent::Key(key) => {
            match key.code {
                KeyCode::Enter if !state.input_locked => {
                    let text = input.buffer.trim().to_string();
                    input.buffer.clear();
                    if !text.is_empty() {
                        return Some(Command::Submit(text));
                    }
                }
                KeyCode::Backspace if !state.input_locked => {
                    input.buffer.pop();
                }
                KeyCode::Char(c) if !state.input_locked => {
                    input.buffer.push(c);
                }
                KeyCode::Up => input.scroll = input.scroll.saturating_sub(1),
                KeyCode::Down => input.scroll = input.scroll.saturating_add(1),
                KeyCode::PageUp => input.scroll = input.scroll.saturating_sub(10),
                KeyCode::PageDown => input.scroll = input.scroll.saturating_add(10),
                KeyCode::Home => input.scroll = 0,
                KeyCode::End => input.scroll = usize::MAX,
                _ => {}
            }
            None
        }
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    app: &AppSection,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, state_rx, cmd_tx, app).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state_rx: watch::Receiver<UiState>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    app: &AppSection,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::new(cmd_tx);
    let labels = Labels {
        title: &app.title,
        about: &app.about,
        placeholder: &app.input_placeholder,
    };
    let mut input = InputState::default();
    let mut last_history_len = 0usize;
    let mut tick = 0usize;

    loop {
        let state = state_rx.borrow().clone();

        if state.history.len() != last_history_len {
            last_history_len = state.history.len();
            input.scroll = usize::MAX;
        }

        if let Some(ev) = event_handler.poll()? {
            if let Some(cmd) = apply_event(ev, &state, &mut input) {
                let quit = matches!(cmd, Command::Quit);
                event_handler.send(cmd);
                if quit {
                    break;
                }
            }
        }

        tick = tick.wrapping_add(1);
        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| {
            draw(
                f,
                &state,
                &input.buffer,
                input.scroll,
                tick,
                &labels,
                &mut scroll_info,
            );
        })?;
        let (total_lines, viewport_height) = scroll_info;
        input.scroll = input.scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }

    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Turn;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_clear_ignored_while_run_in_flight() {
        let busy = UiState::thinking(vec![Turn::user("q")]);
        let mut input = InputState::default();
        assert!(apply_event(AppEvent::Command(Command::Clear), &busy, &mut input).is_none());

        let idle = UiState::idle(vec![Turn::user("q"), Turn::assistant("a")]);
        assert!(matches!(
            apply_event(AppEvent::Command(Command::Clear), &idle, &mut input),
            Some(Command::Clear)
        ));
    }

    #[test]
    fn test_quit_allowed_while_run_in_flight() {
        let busy = UiState::thinking(Vec::new());
        let mut input = InputState::default();
        assert!(matches!(
            apply_event(AppEvent::Command(Command::Quit), &busy, &mut input),
            Some(Command::Quit)
        ));
    }

    #[test]
    fn test_typing_and_submit() {
        let idle = UiState::default();
        let mut input = InputState::default();
        for c in " hi ".chars() {
            assert!(apply_event(key(KeyCode::Char(c)), &idle, &mut input).is_none());
        }
        match apply_event(key(KeyCode::Enter), &idle, &mut input) {
            Some(Command::Submit(text)) => assert_eq!(text, "hi"),
            other => panic!("Expected Submit, got {other:?}"),
        }
        assert!(input.buffer.is_empty());

        let busy = UiState::thinking(Vec::new());
        apply_event(key(KeyCode::Char('x')), &busy, &mut input);
        assert!(input.buffer.is_empty());
    }
}
