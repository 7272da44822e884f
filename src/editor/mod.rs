//! Template editing surface.
//!
//! A rope-backed buffer with a cursor. The app watches the buffer's
//! revision and forwards changed text to the submission controller.

mod buffer;

pub use buffer::{
    Cursor, Direction, EditorBuffer, TAB_WIDTH, byte_col_for_display, display_width,
};
