// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. submit::SubmitError)
    clippy::module_name_repetitions
)]

//! # Stackview
//!
//! A terminal editor that turns CloudFormation templates into architecture
//! diagrams.
//!
//! Stackview sends the template in the editor to a diagram-generation
//! service and shows the SVG it returns next to the text:
//! - YAML editing with syntax highlighting
//! - Submissions that never block typing, with stale results ignored
//! - An allow-list sanitizer between the service and the screen
//! - Diagram display through Kitty, Sixel, iTerm2 or half-block graphics
//!
//! ## Architecture
//!
//! Stackview uses The Elm Architecture (TEA) pattern:
//! - **Model**: Application state
//! - **Message**: Events and actions
//! - **Update**: Pure state transitions
//! - **View**: Render to terminal
//!
//! ## Modules
//!
//! - [`app`]: Main application loop and state
//! - [`editor`]: The template text buffer
//! - [`submit`]: Submission controller and rendering-service client
//! - [`diagram`]: Sanitizing, presentation overrides and rasterizing
//! - [`ui`]: Terminal UI components
//! - [`highlight`]: YAML syntax highlighting
//! - [`image`]: Terminal graphics protocols
//! - [`watcher`]: File watching
//! - [`config`]: Saved default flags
//! - [`logging`]: Tracing subscriber setup

pub mod app;
pub mod config;
pub mod diagram;
pub mod editor;
pub mod highlight;
pub mod image;
pub mod logging;
pub mod submit;
pub mod ui;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::diagram::{DiagramRenderer, PreparedDiagram};
    pub use crate::submit::{RenderResult, SubmissionController};
    pub use crate::ui::viewport::Viewport;
}
