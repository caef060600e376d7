//! The UI renders the application state: document editor, section outline, chat and status.
//!
//! ```text
//! ┌ Document ───────────────┐┌ Sections ─────┐
//! │                         │└───────────────┘
//! │                         │┌ Assistant ────┐
//! │                         ││               │
//! └─────────────────────────┘└───────────────┘
//! ┌ Message ─────────────────────────────────┐
//! ┌ help / :command ─────────────────────────┐
//! ```

use crate::app_state::{AppState, View};
use crate::assistant::AssistantState;
use crate::transcript::{Author, ChatTurn};
use edtui::{EditorTheme, EditorView};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

/// Renders every pane.
pub fn draw(f: &mut Frame, app: &mut AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Panes
            Constraint::Length(3), // Chat input
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);

    let sections = app.service.sections();
    let outline_height = u16::try_from(sections.len().clamp(1, 8) + 2).unwrap_or(10);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(outline_height), Constraint::Min(0)])
        .split(columns[1]);

    draw_document(f, app, columns[0]);
    draw_sections(f, app, side[0]);
    draw_chat(f, app, side[1]);
    draw_input(f, app, rows[1]);
    draw_help(f, app, rows[2]);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn draw_document(f: &mut Frame, app: &mut AppState, area: Rect) {
    let title = format!("Document: {}", app.path.display());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(app.current_view == View::Document))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let editor = EditorView::new(app.editor_state_mut())
        .theme(EditorTheme::default())
        .wrap(true);
    f.render_widget(editor, inner);
}

fn draw_sections(f: &mut Frame, app: &AppState, area: Rect) {
    let stale = app
        .service
        .snapshot()
        .is_some_and(|snap| snap.sections_stale);
    let items: Vec<ListItem> = app
        .service
        .sections()
        .iter()
        .map(|section| {
            let indent = "  ".repeat(section.level.saturating_sub(1));
            let style = if section.level == 1 {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(
                format!("{indent}{}", section.title),
                style,
            )))
        })
        .collect();
    let title = if stale { "Sections (updating)" } else { "Sections" };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn turn_lines(turn: &ChatTurn) -> Vec<Line<'static>> {
    let (who, colour) = match turn.author {
        Author::User => ("You", Color::Green),
        Author::Assistant => ("Assistant", Color::Magenta),
    };
    let mut header = vec![Span::styled(
        format!("[{}] {who}", turn.id),
        Style::default().fg(colour).add_modifier(Modifier::BOLD),
    )];
    if turn.applicable {
        header.push(Span::styled(
            format!("  :a {} to apply", turn.id),
            Style::default().fg(Color::Yellow),
        ));
    }
    if let Some(stars) = turn.rating {
        header.push(Span::raw(format!("  {}", "★".repeat(usize::from(stars)))));
    }
    let mut lines = vec![Line::from(header)];
    lines.extend(turn.content.lines().map(|text| Line::from(text.to_string())));
    if let Some(analysis) = &turn.analysis {
        for issue in &analysis.issues {
            lines.push(Line::from(Span::styled(
                format!("! {issue}"),
                Style::default().fg(Color::Red),
            )));
        }
        for suggestion in &analysis.suggestions {
            lines.push(Line::from(format!("+ {suggestion}")));
        }
    }
    lines.push(Line::default());
    lines
}

fn draw_chat(f: &mut Frame, app: &AppState, area: Rect) {
    let lines: Vec<Line> = app
        .assistant
        .transcript()
        .turns()
        .iter()
        .flat_map(turn_lines)
        .collect();

    let title = match app.assistant.state() {
        AssistantState::Idle => "Assistant",
        AssistantState::AwaitingDisambiguation => "Assistant (choose an occurrence)",
        AssistantState::AwaitingAssistantReply => "Assistant (thinking...)",
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let text_area = Rect {
        width: app.chat_width(inner.width),
        ..inner
    };

    // Scroll so the latest turn stays visible.
    let width = usize::from(text_area.width).max(1);
    let wrapped: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    let height = usize::from(text_area.height);
    let scroll = u16::try_from(wrapped.saturating_sub(height)).unwrap_or(u16::MAX);

    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(chat, text_area);
}

fn draw_input(f: &mut Frame, app: &AppState, area: Rect) {
    let focused = app.current_view == View::Chat;
    let text = if focused {
        format!("{}▏", app.chat_input)
    } else {
        app.chat_input.clone()
    };
    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(focus_style(focused))
            .title("Message"),
    );
    f.render_widget(input, area);
}

fn draw_help(f: &mut Frame, app: &AppState, area: Rect) {
    let help_text = if app.current_view == View::Command {
        format!(":{}", app.command_buffer)
    } else if let Some(ref msg) = app.message {
        msg.clone()
    } else if app.current_view == View::Chat {
        "Enter: Send | Esc/Tab: Document, then :a N Apply | :rate N S | :analyze".to_string()
    } else {
        "Tab: Chat | :w Save | :x Save & Quit | :q Quit | :a N / :ar N Apply | :docs | :open ID"
            .to_string()
    };
    let help = Paragraph::new(help_text).block(Block::default().borders(Borders::ALL));
    f.render_widget(help, area);
}
