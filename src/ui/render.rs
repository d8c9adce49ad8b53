//! 界面渲染
//!
//! 根据 UiState（phase、history、error）与 input_buffer 绘制：左侧 About 侧栏，
//! 右侧上方为对话历史（按角色着色、助手回复下列出引用、按宽度换行），下方为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::core::{AgentPhase, UiState};
use crate::memory::{AnnotationKind, Role, Turn};

const SPINNER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];
const SIDEBAR_WIDTH: u16 = 32;

/// 界面上的固定文案（来自 [app] 配置）
pub struct Labels<'a> {
    pub title: &'a str,
    pub about: &'a str,
    pub placeholder: &'a str,
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn phase_label(state: &UiState, tick: usize) -> String {
    let spin = SPINNER[tick / 2 % SPINNER.len()];
    match &state.phase {
        AgentPhase::Idle => "Ready".to_string(),
        AgentPhase::Thinking => format!("{spin} Assistant is thinking..."),
        AgentPhase::ToolExecuting => state
            .active_tool
            .as_deref()
            .map(|t| format!("{spin} Running tool: {t}"))
            .unwrap_or_else(|| format!("{spin} Running tool...")),
        AgentPhase::Error => "Error".to_string(),
    }
}

/// 单条 Turn 渲染为若干行：首行带角色前缀，助手回复下方附引用列表
fn turn_lines(turn: &Turn, width: usize) -> Vec<Line<'static>> {
    let (prefix, color) = match turn.role {
        Role::User => ("You       ", Color::Cyan),
        Role::Assistant => ("Assistant ", Color::Green),
    };
    let mut lines = Vec::new();
    for (i, line) in wrap_text(&turn.content, width).into_iter().enumerate() {
        let pref = if i == 0 { prefix } else { "          " };
        lines.push(Line::from(vec![
            Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(line),
        ]));
    }
    for (n, ann) in turn.annotations.iter().enumerate() {
        let kind = match ann.kind {
            AnnotationKind::FileCitation => "cite",
            AnnotationKind::FilePath => "file",
        };
        lines.push(Line::from(Span::styled(
            format!("          [{}] {kind}: {}", n + 1, ann.text),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

/// 绘制一帧：左侧 About；右侧对话区（标题 + 历史 + 滚动条）与输入区；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
pub fn draw(
    f: &mut Frame,
    state: &UiState,
    input_buffer: &str,
    conversation_scroll: usize,
    tick: usize,
    labels: &Labels<'_>,
    out: &mut (usize, usize),
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)])
        .split(f.area());

    let about = Paragraph::new(labels.about)
        .block(
            Block::default()
                .title(" About ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(about, columns[0]);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(columns[1]);

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条
    let text_width = content_width.saturating_sub(10).max(20);

    let title = format!(" {} │ {} ", labels.title, phase_label(state, tick));
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, turn) in state.history.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        text_lines.extend(turn_lines(turn, text_width));
    }

    let content_height = conv_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines))
        .block(block)
        .scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, conv_area);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    let input_prompt = if let Some(err) = &state.error_message {
        format!(" Error: {} ", err.chars().take(60).collect::<String>())
    } else if state.input_locked {
        " Waiting for reply... ".to_string()
    } else {
        " Input ".to_string()
    };

    let border_color = if state.error_message.is_some() {
        Color::Red
    } else {
        Color::Blue
    };

    let hint = " Enter send │ ↑↓ PgUp/PgDn scroll │ Ctrl+L new chat │ Ctrl+Q/Esc quit ";
    let input_block = Block::default()
        .title(input_prompt)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = if input_buffer.is_empty() && !state.input_locked {
        Paragraph::new(labels.placeholder).style(Style::default().fg(Color::DarkGray))
    } else if state.input_locked {
        Paragraph::new(input_buffer).style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(input_buffer)
    };
    f.render_widget(input.block(input_block).wrap(Wrap { trim: false }), chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Annotation;

    #[test]
    fn test_wrap_text_by_chars() {
        assert_eq!(wrap_text("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_text("图谱图谱图", 2), vec!["图谱", "图谱", "图"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn test_turn_lines_list_annotations() {
        let turn = Turn::assistant("See docs").with_annotations(vec![Annotation {
            kind: AnnotationKind::FileCitation,
            text: "【4:0†source】".into(),
        }]);
        let lines = turn_lines(&turn, 40);
        assert_eq!(lines.len(), 2);
        let last: String = lines[1].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(last.contains("[1] cite: 【4:0†source】"));
    }

    #[test]
    fn test_phase_label_shows_tool() {
        let state = UiState {
            phase: AgentPhase::ToolExecuting,
            active_tool: Some("tavily_search".into()),
            ..UiState::default()
        };
        assert!(phase_label(&state, 0).ends_with("Running tool: tavily_search"));
        assert_eq!(phase_label(&UiState::default(), 0), "Ready");
    }
}
