use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use ratatui::layout::Rect;
use ratatui_image::picker::Picker;
use tracing::{debug, warn};

use crate::diagram::{DiagramRenderer, IconCache, PreparedDiagram};
use crate::editor::EditorBuffer;
use crate::highlight::{HighlightedLine, highlight_yaml};
use crate::image::DiagramImage;
use crate::submit::{RenderResult, SubmissionController, Unconfigured};
use crate::ui::viewport::Viewport;

/// Name shown for a template that has no file yet.
const UNTITLED: &str = "untitled.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// Which pane receives keyboard input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Editor,
    Diagram,
}

/// The complete application state.
///
/// All state lives here - no global or scattered state.
pub struct Model {
    /// Template file backing the editor, if any
    pub file_path: Option<PathBuf>,
    /// The template text and cursor
    pub editor: EditorBuffer,
    /// Vertical scroll over editor lines
    pub editor_viewport: Viewport,
    /// First visible display column in the editor
    pub editor_hscroll: usize,
    /// Editor revision last pushed to the controller
    synced_revision: u64,
    /// Owns the document text and the authoritative render result
    pub controller: SubmissionController,
    /// Turns markup into the display copy
    pub renderer: DiagramRenderer,
    /// Icons fetched from the backend, shared with request workers
    pub icons: IconCache,
    /// Controller revision last turned into display state
    shown_revision: u64,
    /// Last diagram that could be displayed
    pub diagram: Option<PreparedDiagram>,
    /// Message shown in the diagram pane's error banner
    pub diagram_error: Option<String>,
    /// Terminal image for `diagram`, built lazily for the current pane width
    pub diagram_image: Option<DiagramImage>,
    /// Pane width the image was last built (or attempted) for
    image_cols: Option<u16>,
    /// Vertical scroll over diagram rows
    pub diagram_viewport: Viewport,
    pub focus: Focus,
    /// Image picker for terminal rendering
    pub picker: Option<Picker>,
    /// Whether the diagram is drawn as an image
    pub images_enabled: bool,
    /// Whether highlighting may use 24-bit colors
    pub truecolor: bool,
    /// Whether file watching is enabled
    pub watch_enabled: bool,
    /// Global config path shown in help
    pub config_global_path: Option<PathBuf>,
    /// Local override path shown in help
    pub config_local_path: Option<PathBuf>,
    pub help_visible: bool,
    pub help_scroll_offset: usize,
    toast: Option<Toast>,
    pub should_quit: bool,
    /// Set after a first quit attempt with unsaved changes
    pub quit_confirmed: bool,
    size: (u16, u16),
    highlighted: Option<(u64, Vec<HighlightedLine>)>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("file_path", &self.file_path)
            .field("focus", &self.focus)
            .field("controller", &self.controller)
            .field("diagram_error", &self.diagram_error)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create a model editing `text`, submitting through `controller`.
    pub fn new(
        file_path: Option<PathBuf>,
        text: &str,
        mut controller: SubmissionController,
        terminal_size: (u16, u16),
    ) -> Self {
        let editor = EditorBuffer::from_text(text);
        controller.update_document(text);
        let mut model = Self {
            file_path,
            synced_revision: editor.revision(),
            editor,
            controller,
            size: terminal_size,
            ..Self::default()
        };
        model.sync_layout();
        model
    }

    #[must_use]
    pub fn with_picker(mut self, picker: Option<Picker>) -> Self {
        self.picker = picker;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: DiagramRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_icons(mut self, icons: IconCache) -> Self {
        self.icons = icons;
        self
    }

    pub const fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn display_name(&self) -> String {
        self.file_path
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| UNTITLED.to_string(), |s| s.to_string_lossy().to_string())
    }

    pub fn layout(&self) -> crate::ui::ScreenLayout {
        crate::ui::screen_layout(Rect::new(0, 0, self.size.0, self.size.1))
    }

    pub fn editor_text_area(&self) -> Rect {
        crate::ui::editor_text_area(self.layout().editor, self.editor.line_count())
    }

    pub fn diagram_content_area(&self) -> Rect {
        crate::ui::diagram_content_area(self.layout().diagram, self.diagram_error.as_deref())
    }

    pub(super) fn resize(&mut self, width: u16, height: u16) {
        self.size = (width, height);
        self.sync_layout();
    }

    /// Fit both viewports to the current layout and content.
    pub(super) fn sync_layout(&mut self) {
        let text = self.editor_text_area();
        self.editor_viewport.resize(text.width, text.height);
        self.editor_viewport.set_total_rows(self.editor.line_count());

        let content = self.diagram_content_area();
        self.diagram_viewport.resize(content.width, content.height);
        self.diagram_viewport.set_total_rows(self.diagram_rows());

        self.keep_cursor_visible();
    }

    fn diagram_rows(&self) -> usize {
        self.diagram_image
            .as_ref()
            .map_or(0, |image| image.height_rows() as usize)
    }

    /// Scroll the editor so the cursor is on screen.
    pub(super) fn keep_cursor_visible(&mut self) {
        let cursor = self.editor.cursor();
        self.editor_viewport.ensure_visible(cursor.line);

        let width = self.editor_viewport.width() as usize;
        if width == 0 {
            return;
        }
        let col = self.editor.cursor_display_col();
        if col < self.editor_hscroll {
            self.editor_hscroll = col;
        } else if col >= self.editor_hscroll + width {
            self.editor_hscroll = col + 1 - width;
        }
    }

    /// Push the editor text to the controller if it changed.
    pub(super) fn sync_document(&mut self) {
        let revision = self.editor.revision();
        if revision == self.synced_revision {
            return;
        }
        self.synced_revision = revision;
        self.controller.update_document(&self.editor.text());
    }

    /// Rebuild display state after the controller applied a completion.
    ///
    /// Returns false when nothing new was applied.
    pub(super) fn show_resolved_result(&mut self) -> bool {
        let revision = self.controller.revision();
        if revision == self.shown_revision {
            return false;
        }
        self.shown_revision = revision;

        let outcome = match self.controller.result() {
            RenderResult::None => return false,
            RenderResult::Markup(markup) => Ok(self.renderer.prepare(markup, &self.icons)),
            RenderResult::Error(message) => Err(message.clone()),
        };

        match outcome {
            Ok(Ok(prepared)) => {
                debug!(
                    bytes = prepared.source_len(),
                    elements = prepared.element_count(),
                    "diagram prepared for display"
                );
                self.diagram = Some(prepared);
                self.diagram_error = None;
                self.diagram_image = None;
                self.image_cols = None;
                self.diagram_viewport.go_to_top();
                self.show_toast(ToastLevel::Info, "Diagram updated");
            }
            Ok(Err(err)) => {
                warn!(error = %err, "received markup could not be displayed");
                self.diagram_error = Some(format!("Could not display diagram: {err}"));
                self.show_toast(ToastLevel::Error, "Diagram could not be displayed");
            }
            Err(message) => {
                self.show_toast(ToastLevel::Error, "Diagram generation failed");
                self.diagram_error = Some(message);
            }
        }
        self.sync_layout();
        true
    }

    /// Prepare the current markup again so newly cached icons are inlined.
    ///
    /// Leaves the display alone when the markup could not be shown before.
    pub(super) fn refresh_diagram_icons(&mut self) {
        if self.diagram_error.is_some() {
            return;
        }
        let RenderResult::Markup(markup) = self.controller.result() else {
            return;
        };
        match self.renderer.prepare(markup, &self.icons) {
            Ok(prepared) if self.diagram.as_ref() != Some(&prepared) => {
                debug!(cached = self.icons.len(), "diagram refreshed with icons");
                self.diagram = Some(prepared);
                self.diagram_image = None;
                self.image_cols = None;
                self.sync_layout();
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "diagram refresh failed"),
        }
    }

    /// Build the terminal image for the current diagram if the pane width
    /// changed since the last attempt.
    pub fn ensure_diagram_image(&mut self) {
        if !self.images_enabled {
            return;
        }
        let (Some(picker), Some(prepared)) = (self.picker.as_ref(), self.diagram.as_ref()) else {
            return;
        };
        let cols = self.diagram_viewport.width();
        if cols == 0 || self.image_cols == Some(cols) {
            return;
        }
        self.image_cols = Some(cols);

        match DiagramImage::build(picker, prepared, cols) {
            Ok(image) => self.diagram_image = Some(image),
            Err(err) => {
                warn!(error = %err, cols, "diagram rasterization failed");
                self.diagram_image = None;
                self.diagram_error = Some(format!("Could not display diagram: {err}"));
            }
        }
        self.sync_layout();
    }

    /// Refresh syntax highlighting if the text changed.
    pub fn ensure_highlight(&mut self) {
        let revision = self.editor.revision();
        if self
            .highlighted
            .as_ref()
            .is_some_and(|(rev, _)| *rev == revision)
        {
            return;
        }
        let lines = highlight_yaml(&self.editor.text(), self.truecolor);
        self.highlighted = Some((revision, lines));
    }

    /// Highlighted spans for `line_idx`, if highlighting is current.
    pub fn highlighted_line(&self, line_idx: usize) -> Option<&HighlightedLine> {
        let (revision, lines) = self.highlighted.as_ref()?;
        if *revision != self.editor.revision() {
            return None;
        }
        lines.get(line_idx)
    }

    pub fn editor_is_dirty(&self) -> bool {
        self.editor.is_dirty()
    }

    pub(super) fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + Duration::from_secs(4),
        });
    }

    pub(super) fn expire_toast(&mut self, now: Instant) -> bool {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }

    /// Replace the buffer with the file's contents.
    pub(super) fn reload_from_disk(&mut self) -> Result<()> {
        let Some(path) = self.file_path.clone() else {
            return Ok(());
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.editor.set_text(&text);
        self.sync_document();
        self.sync_layout();
        debug!(path = %path.display(), bytes = text.len(), "template reloaded");
        Ok(())
    }

    /// Write the buffer to its file, creating parent directories.
    pub(super) fn save_to_disk(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            bail!("no file to save to; start stackview with a FILE argument");
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, self.editor.text())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.editor.mark_clean();
        debug!(path = %path.display(), "template saved");
        Ok(path)
    }
}

// Implement Default for Model to allow std::mem::take
impl Default for Model {
    fn default() -> Self {
        Self {
            file_path: None,
            editor: EditorBuffer::empty(),
            editor_viewport: Viewport::default(),
            editor_hscroll: 0,
            synced_revision: 0,
            controller: SubmissionController::new(Arc::new(Unconfigured)),
            renderer: DiagramRenderer::default(),
            icons: IconCache::default(),
            shown_revision: 0,
            diagram: None,
            diagram_error: None,
            diagram_image: None,
            image_cols: None,
            diagram_viewport: Viewport::default(),
            focus: Focus::Editor,
            picker: None,
            images_enabled: true,
            truecolor: true,
            watch_enabled: false,
            config_global_path: None,
            config_local_path: None,
            help_visible: false,
            help_scroll_offset: 0,
            toast: None,
            should_quit: false,
            quit_confirmed: false,
            size: (80, 24),
            highlighted: None,
        }
    }
}
