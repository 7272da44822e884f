use crate::app::model::{Focus, ToastLevel};
use crate::app::Model;
use crate::editor::Direction;

/// All possible events and actions in the application.
///
/// These represent user input, system events, and internal actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Editor
    /// Insert a character at the cursor
    EditorInsertChar(char),
    /// Insert pasted text at the cursor
    EditorPaste(String),
    /// Insert one indentation step (Tab)
    EditorInsertTab,
    /// Delete character before cursor (Backspace)
    EditorDeleteBack,
    /// Delete character at cursor (Delete)
    EditorDeleteForward,
    /// Split line at cursor (Enter)
    EditorSplitLine,
    /// Move cursor in a direction
    EditorMoveCursor(Direction),
    /// Move cursor to beginning of line (Home)
    EditorMoveHome,
    /// Move cursor to end of line (End)
    EditorMoveEnd,
    /// Move cursor one word left (Ctrl+Left)
    EditorMoveWordLeft,
    /// Move cursor one word right (Ctrl+Right)
    EditorMoveWordRight,
    /// Move cursor to start of buffer (Ctrl+Home)
    EditorMoveToStart,
    /// Move cursor to end of buffer (Ctrl+End)
    EditorMoveToEnd,
    /// Move cursor up one page
    EditorPageUp,
    /// Move cursor down one page
    EditorPageDown,
    /// Place the cursor at (line, display column), e.g. from a click
    EditorMoveTo(usize, usize),
    /// Scroll editor viewport up by n lines
    EditorScrollUp(usize),
    /// Scroll editor viewport down by n lines
    EditorScrollDown(usize),
    /// Save editor buffer to file
    EditorSave,

    // Diagram
    DiagramScrollUp(usize),
    DiagramScrollDown(usize),
    DiagramPageUp,
    DiagramPageDown,
    DiagramTop,
    DiagramBottom,

    // Submission
    /// Send the current document to the backend
    Submit,
    /// The controller applied one or more completions
    SubmissionResolved,
    /// Icons for the current result finished downloading
    IconsReady,

    // Focus
    /// Toggle focus between editor and diagram
    SwitchFocus,
    /// Focus a specific pane
    Focus(Focus),

    // Other
    /// Toggle help overlay
    ToggleHelp,
    /// Hide help overlay
    HideHelp,
    HelpScrollUp(usize),
    HelpScrollDown(usize),
    /// File changed externally
    FileChanged,
    /// Terminal resized
    Resize(u16, u16),
    /// Quit the application
    Quit,
}

/// Pure function that updates the model based on a message.
///
/// Network, file and watcher work happens afterwards in the effects step.
pub fn update(mut model: Model, msg: Message) -> Model {
    if !matches!(msg, Message::Quit) {
        model.quit_confirmed = false;
    }

    match msg {
        Message::EditorInsertChar(ch) => model.editor.insert_char(ch),
        Message::EditorPaste(text) => {
            // Terminals send CR line breaks in bracketed paste.
            let text = text.replace("\r\n", "\n").replace('\r', "\n");
            model.editor.insert_str(&text);
        }
        Message::EditorInsertTab => model.editor.insert_tab(),
        Message::EditorDeleteBack => {
            model.editor.delete_back();
        }
        Message::EditorDeleteForward => {
            model.editor.delete_forward();
        }
        Message::EditorSplitLine => model.editor.split_line(),
        Message::EditorMoveCursor(direction) => model.editor.move_cursor(direction),
        Message::EditorMoveHome => model.editor.move_home(),
        Message::EditorMoveEnd => model.editor.move_end(),
        Message::EditorMoveWordLeft => model.editor.move_word_left(),
        Message::EditorMoveWordRight => model.editor.move_word_right(),
        Message::EditorMoveToStart => model.editor.move_to_start(),
        Message::EditorMoveToEnd => model.editor.move_to_end(),
        Message::EditorPageUp => {
            let page = model.editor_viewport.height().max(1) as isize;
            model.editor.move_lines(-page);
            model.editor_viewport.page_up();
        }
        Message::EditorPageDown => {
            let page = model.editor_viewport.height().max(1) as isize;
            model.editor.move_lines(page);
            model.editor_viewport.page_down();
        }
        Message::EditorMoveTo(line, display_col) => {
            model.focus = Focus::Editor;
            model.editor.move_to_display(line, display_col);
        }
        Message::EditorScrollUp(n) => {
            model.editor_viewport.scroll_up(n);
            return model;
        }
        Message::EditorScrollDown(n) => {
            model.editor_viewport.scroll_down(n);
            return model;
        }
        Message::EditorSave | Message::Submit | Message::FileChanged => return model,

        Message::DiagramScrollUp(n) => {
            model.diagram_viewport.scroll_up(n);
            return model;
        }
        Message::DiagramScrollDown(n) => {
            model.diagram_viewport.scroll_down(n);
            return model;
        }
        Message::DiagramPageUp => {
            model.diagram_viewport.page_up();
            return model;
        }
        Message::DiagramPageDown => {
            model.diagram_viewport.page_down();
            return model;
        }
        Message::DiagramTop => {
            model.diagram_viewport.go_to_top();
            return model;
        }
        Message::DiagramBottom => {
            model.diagram_viewport.go_to_bottom();
            return model;
        }

        Message::SubmissionResolved => {
            model.show_resolved_result();
            return model;
        }
        Message::IconsReady => {
            model.refresh_diagram_icons();
            return model;
        }

        Message::SwitchFocus => {
            model.focus = match model.focus {
                Focus::Editor => Focus::Diagram,
                Focus::Diagram => Focus::Editor,
            };
            return model;
        }
        Message::Focus(focus) => {
            model.focus = focus;
            return model;
        }

        Message::ToggleHelp => {
            model.help_visible = !model.help_visible;
            model.help_scroll_offset = 0;
            return model;
        }
        Message::HideHelp => {
            model.help_visible = false;
            model.help_scroll_offset = 0;
            return model;
        }
        Message::HelpScrollUp(n) => {
            model.help_scroll_offset = model.help_scroll_offset.saturating_sub(n);
            return model;
        }
        Message::HelpScrollDown(n) => {
            model.help_scroll_offset = model.help_scroll_offset.saturating_add(n);
            return model;
        }
        Message::Resize(width, height) => {
            model.resize(width, height);
            return model;
        }
        Message::Quit => {
            if model.editor_is_dirty() && !model.quit_confirmed {
                model.quit_confirmed = true;
                model.show_toast(
                    ToastLevel::Warning,
                    "Unsaved changes. Press Ctrl+Q again to quit without saving",
                );
            } else {
                model.should_quit = true;
            }
            return model;
        }
    }

    // Every edit reaches the controller before the next event is handled.
    model.sync_document();
    model.sync_layout();
    model
}
