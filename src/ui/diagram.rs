use ratatui::buffer::Buffer;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};
use ratatui_image::{CropOptions, Resize, StatefulImage};
use tracing::trace;

use crate::app::{Focus, Model};
use crate::diagram::{PLACEHOLDER_TEXT, PreparedDiagram};
use crate::image::{DiagramImage, rgb_to_xterm_256, supports_truecolor_terminal};

use super::render::{banner_text, pane_block};
use super::{diagram_content_area, pane_inner};

pub(super) fn render_diagram_pane(model: &mut Model, frame: &mut Frame, pane: Rect) {
    let focused = model.focus == Focus::Diagram;
    let title = if model.controller.in_flight() > 0 {
        " Diagram (generating...) ".to_string()
    } else {
        " Diagram ".to_string()
    };
    frame.render_widget(pane_block(title, focused), pane);

    let error = model.diagram_error.clone();
    let content = diagram_content_area(pane, error.as_deref());
    let offset = model.diagram_viewport.offset();

    if let Some(image) = model.diagram_image.as_mut() {
        render_image(image, offset, frame, content);
    } else if let Some(prepared) = &model.diagram {
        let reason = if model.images_enabled {
            "Terminal graphics unavailable; showing a summary."
        } else {
            "Images are off (--no-images)."
        };
        render_summary(prepared, reason, offset, frame, content);
    } else {
        render_placeholder(frame, content);
    }

    if let Some(message) = error {
        let inner = pane_inner(pane);
        let banner = Rect {
            y: content.y + content.height,
            height: inner.height - content.height,
            ..inner
        };
        render_error_banner(&message, frame, banner);
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }
    let row = Rect {
        y: area.y + area.height / 2,
        height: 1,
        ..area
    };
    let placeholder = Paragraph::new(PLACEHOLDER_TEXT)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Indexed(245)));
    frame.render_widget(placeholder, row);
}

fn render_summary(
    prepared: &PreparedDiagram,
    reason: &str,
    offset: usize,
    frame: &mut Frame,
    area: Rect,
) {
    let report = prepared.report();
    let mut lines = vec![
        Line::styled(
            "Diagram received",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::raw(format!("  {} bytes of markup", prepared.source_len())),
        Line::raw(format!("  {} elements", prepared.element_count())),
    ];
    if !report.is_clean() {
        lines.push(Line::raw(format!(
            "  {} elements and {} attributes removed as unsafe",
            report.removed_elements, report.removed_attributes
        )));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled(
        reason.to_string(),
        Style::default().fg(Color::Indexed(245)),
    ));
    lines.push(Line::styled(
        "Use --render-to FILE to save the SVG.",
        Style::default().fg(Color::Indexed(245)),
    ));

    let skip = offset.min(lines.len());
    let visible: Vec<Line> = lines.into_iter().skip(skip).collect();
    frame.render_widget(Paragraph::new(visible), area);
}

fn render_error_banner(message: &str, frame: &mut Frame, area: Rect) {
    if area.height == 0 {
        return;
    }
    let banner = Paragraph::new(banner_text(message))
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(Color::Red).fg(Color::White));
    frame.render_widget(banner, area);
}

/// Draw the rows of `image` that fall inside the pane's scroll window.
fn render_image(image: &mut DiagramImage, offset: usize, frame: &mut Frame, area: Rect) {
    let img_width = image.width_cols();
    let img_height = image.height_rows();
    let src_start = u16::try_from(offset).unwrap_or(u16::MAX).min(img_height);
    let visible_rows = img_height.saturating_sub(src_start).min(area.height);
    let visible_cols = img_width.min(area.width);
    if visible_rows == 0 || visible_cols == 0 {
        return;
    }

    if image.is_anchored() {
        let crop = if src_start > 0 {
            Resize::Crop(Some(CropOptions {
                clip_top: true,
                clip_left: false,
            }))
        } else {
            Resize::Crop(None)
        };
        StatefulImage::default().resize(crop).render(
            Rect::new(area.x, area.y, visible_cols, visible_rows),
            frame.buffer_mut(),
            image.protocol_mut(),
        );
        trace!(src_start, visible_rows, "diagram drawn with anchored crop");
        return;
    }

    // Draw the whole image off-screen, then copy the visible rows.
    let temp_area = Rect::new(0, 0, img_width, img_height);
    let mut temp_buf = Buffer::empty(temp_area);
    let resize = image.resize_mode();
    StatefulImage::default()
        .resize(resize)
        .render(temp_area, &mut temp_buf, image.protocol_mut());

    if image.is_halfblocks() && !supports_truecolor_terminal() {
        for row in 0..temp_area.height {
            for col in 0..temp_area.width {
                let cell = &mut temp_buf[(col, row)];
                if let Color::Rgb(r, g, b) = cell.fg {
                    cell.fg = Color::Indexed(rgb_to_xterm_256(r, g, b));
                }
                if let Color::Rgb(r, g, b) = cell.bg {
                    cell.bg = Color::Indexed(rgb_to_xterm_256(r, g, b));
                }
            }
        }
    }

    let frame_buf = frame.buffer_mut();
    for row in 0..visible_rows {
        let src_row = src_start + row;
        let dst_row = area.y + row;
        if src_row >= img_height || dst_row >= frame_buf.area.height {
            continue;
        }
        for col in 0..visible_cols {
            frame_buf[(area.x + col, dst_row)] = temp_buf[(col, src_row)].clone();
        }
    }
    trace!(src_start, visible_rows, visible_cols, "diagram rows blitted");
}
