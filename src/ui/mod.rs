//! Terminal UI components.
//!
//! - [`viewport`]: scroll state shared by both panes
//! - layout helpers used by rendering and mouse hit-testing
//! - `render`: the full frame, drawn from the [`Model`](crate::app::Model)

pub mod viewport;

mod diagram;
mod overlays;
mod render;
mod status;

pub use render::{
    ScreenLayout, diagram_content_area, editor_text_area, error_banner_rows, line_number_width,
    pane_inner, render, screen_layout,
};

/// Heading shown on the first row.
pub const TITLE: &str = "CloudFormation Diagram Generator";
/// The on-screen submit control.
pub const BUTTON_LABEL: &str = "[ Generate Diagram ]";
/// Terminals narrower than this stack the panes vertically.
pub const STACKED_BELOW_COLS: u16 = 100;
/// Upper bound on rows taken by the diagram error banner.
pub const MAX_BANNER_ROWS: u16 = 3;
