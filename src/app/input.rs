use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::Frame;
use ratatui::layout::{Position, Rect};
use tracing::trace;

use crate::app::{App, Focus, Message, Model};
use crate::editor::Direction;

use super::event_loop::ResizeDebouncer;

/// Lines moved per mouse wheel notch.
const WHEEL_LINES: usize = 3;

impl App {
    pub(super) fn handle_event(
        &self,
        event: &Event,
        model: &Model,
        now_ms: u64,
        resize_debouncer: &mut ResizeDebouncer,
    ) -> Option<Message> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(*key, model),
            Event::Mouse(mouse) => self.handle_mouse(*mouse, model),
            Event::Paste(text) if model.focus == Focus::Editor && !model.help_visible => {
                Some(Message::EditorPaste(text.clone()))
            }
            Event::Resize(w, h) => {
                trace!(width = w, height = h, "resize queued");
                resize_debouncer.queue(*w, *h, now_ms);
                None
            }
            _ => None,
        }
    }

    pub(super) fn handle_key(&self, key: KeyEvent, model: &Model) -> Option<Message> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if model.help_visible {
            return match key.code {
                KeyCode::Char('j') | KeyCode::Down => Some(Message::HelpScrollDown(1)),
                KeyCode::Char('k') | KeyCode::Up => Some(Message::HelpScrollUp(1)),
                KeyCode::PageDown => Some(Message::HelpScrollDown(10)),
                KeyCode::PageUp => Some(Message::HelpScrollUp(10)),
                KeyCode::Char('c' | 'q') if ctrl => Some(Message::Quit),
                _ => Some(Message::HideHelp),
            };
        }

        // Bindings that work in both panes.
        match key.code {
            KeyCode::Char('q' | 'c') if ctrl => return Some(Message::Quit),
            KeyCode::Char('s') if ctrl => return Some(Message::EditorSave),
            KeyCode::Char('g') if ctrl => return Some(Message::Submit),
            KeyCode::F(5) => return Some(Message::Submit),
            KeyCode::F(6) => return Some(Message::SwitchFocus),
            KeyCode::F(1) => return Some(Message::ToggleHelp),
            _ => {}
        }

        match model.focus {
            Focus::Diagram => Self::handle_diagram_key(key),
            Focus::Editor => Self::handle_editor_key(key),
        }
    }

    fn handle_diagram_key(key: KeyEvent) -> Option<Message> {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => Some(Message::DiagramScrollDown(1)),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::DiagramScrollUp(1)),
            KeyCode::Char(' ') | KeyCode::PageDown => Some(Message::DiagramPageDown),
            KeyCode::Char('b') | KeyCode::PageUp => Some(Message::DiagramPageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::DiagramTop),
            KeyCode::Char('G') | KeyCode::End => Some(Message::DiagramBottom),
            KeyCode::Char('?') => Some(Message::ToggleHelp),
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc | KeyCode::Tab | KeyCode::BackTab => Some(Message::Focus(Focus::Editor)),
            _ => None,
        }
    }

    fn handle_editor_key(key: KeyEvent) -> Option<Message> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Char(c) if !ctrl && !alt => Some(Message::EditorInsertChar(c)),
            KeyCode::Enter => Some(Message::EditorSplitLine),
            KeyCode::Tab => Some(Message::EditorInsertTab),
            KeyCode::BackTab => Some(Message::Focus(Focus::Diagram)),
            KeyCode::Backspace => Some(Message::EditorDeleteBack),
            KeyCode::Delete => Some(Message::EditorDeleteForward),
            KeyCode::Left if ctrl || alt => Some(Message::EditorMoveWordLeft),
            KeyCode::Right if ctrl || alt => Some(Message::EditorMoveWordRight),
            KeyCode::Left => Some(Message::EditorMoveCursor(Direction::Left)),
            KeyCode::Right => Some(Message::EditorMoveCursor(Direction::Right)),
            KeyCode::Up => Some(Message::EditorMoveCursor(Direction::Up)),
            KeyCode::Down => Some(Message::EditorMoveCursor(Direction::Down)),
            KeyCode::Home if ctrl => Some(Message::EditorMoveToStart),
            KeyCode::End if ctrl => Some(Message::EditorMoveToEnd),
            KeyCode::Home => Some(Message::EditorMoveHome),
            KeyCode::End => Some(Message::EditorMoveEnd),
            KeyCode::PageUp => Some(Message::EditorPageUp),
            KeyCode::PageDown => Some(Message::EditorPageDown),
            _ => None,
        }
    }

    pub(super) fn handle_mouse(&self, mouse: MouseEvent, model: &Model) -> Option<Message> {
        if model.help_visible {
            return match mouse.kind {
                MouseEventKind::ScrollDown => Some(Message::HelpScrollDown(WHEEL_LINES)),
                MouseEventKind::ScrollUp => Some(Message::HelpScrollUp(WHEEL_LINES)),
                MouseEventKind::Down(MouseButton::Left) => Some(Message::HideHelp),
                _ => None,
            };
        }

        let layout = model.layout();
        let point = Position::new(mouse.column, mouse.row);
        let in_editor = layout.editor.contains(point);
        let in_diagram = layout.diagram.contains(point);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if layout.button.contains(point) {
                    return Some(Message::Submit);
                }
                if in_editor {
                    return Some(editor_click(model, point));
                }
                if in_diagram {
                    return Some(Message::Focus(Focus::Diagram));
                }
                None
            }
            MouseEventKind::ScrollDown if in_editor => {
                Some(Message::EditorScrollDown(WHEEL_LINES))
            }
            MouseEventKind::ScrollUp if in_editor => Some(Message::EditorScrollUp(WHEEL_LINES)),
            MouseEventKind::ScrollDown if in_diagram => {
                Some(Message::DiagramScrollDown(WHEEL_LINES))
            }
            MouseEventKind::ScrollUp if in_diagram => Some(Message::DiagramScrollUp(WHEEL_LINES)),
            _ => None,
        }
    }

    pub(super) fn view(model: &mut Model, frame: &mut Frame) {
        crate::ui::render(model, frame);
    }
}

/// Map a click in the editor pane to a cursor position.
///
/// Clicks on the border or gutter land on the nearest text cell.
fn editor_click(model: &Model, point: Position) -> Message {
    let text: Rect = model.editor_text_area();
    let row = point.y.clamp(text.y, text.y + text.height.saturating_sub(1));
    let line = model.editor_viewport.offset() + (row - text.y) as usize;
    let col = model.editor_hscroll + point.x.saturating_sub(text.x) as usize;
    Message::EditorMoveTo(line, col)
}
