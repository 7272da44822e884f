use ratatui::prelude::*;
use ratatui::widgets::{Block, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::app::{Focus, Model};
use crate::editor::display_width;

use super::{BUTTON_LABEL, MAX_BANNER_ROWS, STACKED_BELOW_COLS, TITLE, diagram, overlays, status};

/// Where each part of the screen goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub title: Rect,
    pub editor: Rect,
    pub diagram: Rect,
    pub button: Rect,
    pub status: Rect,
}

/// Split the terminal into title row, the two panes, and the footer.
///
/// Panes sit side by side on wide terminals and stack on narrow ones.
pub fn screen_layout(area: Rect) -> ScreenLayout {
    let [title, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let direction = if area.width < STACKED_BELOW_COLS {
        Direction::Vertical
    } else {
        Direction::Horizontal
    };
    let panes = Layout::default()
        .direction(direction)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(body);

    #[allow(clippy::cast_possible_truncation)]
    let button_width = (BUTTON_LABEL.len() as u16).min(footer.width);
    let [button, _, status] = Layout::horizontal([
        Constraint::Length(button_width),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(footer);

    ScreenLayout {
        title,
        editor: panes[0],
        diagram: panes[1],
        button,
        status,
    }
}

/// The area inside a pane's border.
pub fn pane_inner(pane: Rect) -> Rect {
    Block::bordered().inner(pane)
}

/// The editor's text columns, right of the line-number gutter.
pub fn editor_text_area(pane: Rect, line_count: usize) -> Rect {
    let inner = pane_inner(pane);
    let gutter = line_number_width(line_count) + 1;
    Rect {
        x: inner.x + gutter.min(inner.width),
        width: inner.width.saturating_sub(gutter),
        ..inner
    }
}

/// Rows the error banner needs at `width` columns.
pub fn error_banner_rows(message: Option<&str>, width: u16) -> u16 {
    let Some(message) = message else {
        return 0;
    };
    if width == 0 {
        return 0;
    }
    let text_width = display_width(&banner_text(message));
    let rows = text_width.div_ceil(width as usize).max(1);
    u16::try_from(rows)
        .unwrap_or(MAX_BANNER_ROWS)
        .min(MAX_BANNER_ROWS)
}

/// The diagram pane area left for the image once the banner is placed.
pub fn diagram_content_area(pane: Rect, error: Option<&str>) -> Rect {
    let inner = pane_inner(pane);
    let banner = error_banner_rows(error, inner.width).min(inner.height);
    Rect {
        height: inner.height - banner,
        ..inner
    }
}

pub(super) fn banner_text(message: &str) -> String {
    format!("Error: {message}")
}

/// Render the complete UI.
pub fn render(model: &mut Model, frame: &mut Frame) {
    let area = frame.area();
    let layout = screen_layout(area);

    render_title(frame, layout.title);
    render_editor(model, frame, layout.editor);
    diagram::render_diagram_pane(model, frame, layout.diagram);
    status::render_button(model, frame, layout.button);
    if model.active_toast().is_some() {
        status::render_toast_bar(model, frame, layout.status);
    } else {
        status::render_status_bar(model, frame, layout.status);
    }

    if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    }
}

pub(super) fn pane_block(title: String, focused: bool) -> Block<'static> {
    Block::bordered()
        .title(title)
        .border_style(if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        })
}

fn render_title(frame: &mut Frame, area: Rect) {
    let title = Paragraph::new(TITLE)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(title, area);
}

fn render_editor(model: &mut Model, frame: &mut Frame, pane: Rect) {
    model.ensure_highlight();

    let focused = model.focus == Focus::Editor;
    let block = pane_block(format!(" {} ", model.display_name()), focused);
    let inner = block.inner(pane);
    frame.render_widget(block, pane);

    let total_lines = model.editor.line_count();
    let gutter_width = line_number_width(total_lines);
    let text_area = editor_text_area(pane, total_lines);
    let start = model.editor_viewport.offset();
    let end = (start + inner.height as usize).min(total_lines);
    let hscroll = model.editor_hscroll;

    let mut content: Vec<Line> = Vec::with_capacity(end.saturating_sub(start));
    for line_idx in start..end {
        let line_num = format!("{:>width$} ", line_idx + 1, width = gutter_width as usize);
        let mut spans = vec![Span::styled(line_num, Style::default().fg(Color::DarkGray))];
        let line_spans = model.highlighted_line(line_idx).map_or_else(
            || vec![Span::raw(model.editor.line_at(line_idx).unwrap_or_default())],
            Clone::clone,
        );
        spans.extend(clip_spans(line_spans, hscroll, text_area.width as usize));
        content.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(content), inner);

    if focused && !model.help_visible {
        let cursor = model.editor.cursor();
        let col = model.editor.cursor_display_col().saturating_sub(hscroll);
        if model.editor_viewport.visible_range().contains(&cursor.line)
            && col < text_area.width as usize
        {
            #[allow(clippy::cast_possible_truncation)]
            frame.set_cursor_position(Position::new(
                text_area.x + col as u16,
                text_area.y + (cursor.line - start) as u16,
            ));
        }
    }
}

/// Cut a styled line to the columns `skip..skip + width`.
fn clip_spans(spans: Vec<Span<'static>>, skip: usize, width: usize) -> Vec<Span<'static>> {
    let mut out = Vec::with_capacity(spans.len());
    let mut col = 0usize;
    for span in spans {
        let mut kept = String::new();
        for ch in span.content.chars() {
            let w = ch.width().unwrap_or(0);
            if col >= skip && col + w <= skip + width {
                kept.push(ch);
            }
            col += w;
        }
        if !kept.is_empty() {
            out.push(Span::styled(kept, span.style));
        }
        if col >= skip + width {
            break;
        }
    }
    out
}

pub const fn line_number_width(total_lines: usize) -> u16 {
    if total_lines < 10 {
        1
    } else if total_lines < 100 {
        2
    } else if total_lines < 1_000 {
        3
    } else if total_lines < 10_000 {
        4
    } else if total_lines < 100_000 {
        5
    } else {
        6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_terminal_puts_panes_side_by_side() {
        let layout = screen_layout(Rect::new(0, 0, 120, 40));
        assert_eq!(layout.editor.y, layout.diagram.y);
        assert!(layout.diagram.x > layout.editor.x);
        assert_eq!(layout.title.height, 1);
        assert_eq!(layout.button.y, 39);
    }

    #[test]
    fn test_narrow_terminal_stacks_panes() {
        let layout = screen_layout(Rect::new(0, 0, 80, 40));
        assert_eq!(layout.editor.x, layout.diagram.x);
        assert!(layout.diagram.y > layout.editor.y);
        assert_eq!(layout.editor.width, 80);
    }

    #[test]
    fn test_button_fits_its_label() {
        let layout = screen_layout(Rect::new(0, 0, 120, 40));
        assert_eq!(layout.button.width as usize, BUTTON_LABEL.len());
        assert!(layout.status.x > layout.button.x + layout.button.width - 1);
    }

    #[test]
    fn test_editor_text_area_leaves_room_for_gutter() {
        let pane = Rect::new(0, 1, 40, 20);
        let text = editor_text_area(pane, 120);
        // border + three digits + space
        assert_eq!(text.x, 5);
        assert_eq!(text.width, 34);
    }

    #[test]
    fn test_error_banner_rows_wraps_and_caps() {
        assert_eq!(error_banner_rows(None, 40), 0);
        assert_eq!(error_banner_rows(Some("short"), 40), 1);
        assert_eq!(error_banner_rows(Some(&"x".repeat(60)), 40), 2);
        assert_eq!(error_banner_rows(Some(&"x".repeat(500)), 40), MAX_BANNER_ROWS);
    }

    #[test]
    fn test_diagram_content_area_shrinks_for_banner() {
        let pane = Rect::new(0, 0, 42, 20);
        let clean = diagram_content_area(pane, None);
        let with_error = diagram_content_area(pane, Some("boom"));
        assert_eq!(clean.height, 18);
        assert_eq!(with_error.height, 17);
    }

    #[test]
    fn test_clip_spans_honours_scroll_and_width() {
        let spans = vec![Span::raw("Type: "), Span::raw("AWS::S3::Bucket")];
        let clipped: String = clip_spans(spans, 4, 6)
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert_eq!(clipped, ": AWS:");
    }
}
