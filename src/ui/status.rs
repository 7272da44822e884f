use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Focus, Model, ToastLevel};
use crate::submit::RenderResult;

use super::BUTTON_LABEL;

const HINTS: &str = "F5:generate  F1:help";

pub fn render_button(model: &Model, frame: &mut Frame, area: Rect) {
    let style = if model.controller.in_flight() > 0 {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    } else {
        Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    frame.render_widget(Paragraph::new(BUTTON_LABEL).style(style), area);
}

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let dirty_indicator = if model.editor.is_dirty() {
        " [modified]"
    } else {
        ""
    };
    let watch_indicator = if model.watch_enabled {
        " [watching]"
    } else {
        ""
    };
    let cursor = model.editor.cursor();
    let focus = match model.focus {
        Focus::Editor => "EDIT",
        Focus::Diagram => "VIEW",
    };

    let in_flight = model.controller.in_flight();
    let state = if in_flight > 0 {
        format!("generating ({in_flight})")
    } else {
        match model.controller.result() {
            RenderResult::None => "no diagram".to_string(),
            RenderResult::Markup(_) if model.diagram_error.is_some() => "display error".to_string(),
            RenderResult::Markup(_) => "diagram ready".to_string(),
            RenderResult::Error(_) => "error".to_string(),
        }
    };

    let status = format!(
        " {focus}  {}{dirty_indicator}{watch_indicator}  Ln {}, Col {}  [{state}]  {HINTS}",
        model.display_name(),
        cursor.line + 1,
        model.editor.cursor_display_col() + 1,
    );

    let status_bar =
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_bar, area);
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        ToastLevel::Info => (
            "[info]",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
        ToastLevel::Warning => (
            "[warn]",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        ToastLevel::Error => ("[error]", Style::default().bg(Color::Red).fg(Color::White)),
    };
    let toast = Paragraph::new(format!("{prefix} {message}")).style(style);
    frame.render_widget(toast, area);
}
