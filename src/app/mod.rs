//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`App::run`]: Main event loop with rendering
//!
//! [`App::render_to_file`] is the headless path: one submission, no terminal.

mod effects;
mod event_loop;
mod headless;
mod input;
mod model;
mod update;

pub use model::{Focus, Model, ToastLevel};
pub use update::{Message, update};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::diagram::{DiagramRenderer, HrefPolicy, IconCache, RendererConfig, prefetch};
use crate::submit::{DEFAULT_ENDPOINT, HttpBackend, RenderBackend, SubmissionController};

/// Main application struct that owns the terminal and runs the event loop.
pub struct App {
    file_path: Option<PathBuf>,
    endpoint: String,
    timeout: Option<Duration>,
    watch_enabled: bool,
    images_enabled: bool,
    force_half_cell: bool,
    apply_stale: bool,
    renderer_config: RendererConfig,
    config_global_path: Option<PathBuf>,
    config_local_path: Option<PathBuf>,
}

impl App {
    /// Create a new application editing `file_path`, or an unsaved
    /// template when `None`.
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
            watch_enabled: false,
            images_enabled: true,
            force_half_cell: false,
            apply_stale: false,
            renderer_config: RendererConfig::default(),
            config_global_path: None,
            config_local_path: None,
        }
    }

    /// Set the diagram-generation endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Limit how long one request may take. `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable file watching.
    #[must_use]
    pub const fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    /// Enable or disable drawing the diagram as an image.
    #[must_use]
    pub const fn with_images_enabled(mut self, enabled: bool) -> Self {
        self.images_enabled = enabled;
        self
    }

    /// Force half-block rendering instead of a graphics protocol.
    #[must_use]
    pub const fn with_force_half_cell(mut self, force: bool) -> Self {
        self.force_half_cell = force;
        self
    }

    /// Apply every completion as it arrives, even when a newer
    /// submission already resolved.
    #[must_use]
    pub const fn with_apply_stale(mut self, apply_stale: bool) -> Self {
        self.apply_stale = apply_stale;
        self
    }

    #[must_use]
    pub fn with_renderer_config(mut self, config: RendererConfig) -> Self {
        self.renderer_config = config;
        self
    }

    /// Set config file paths for display in help.
    #[must_use]
    pub fn with_config_paths(mut self, global: PathBuf, local: Option<PathBuf>) -> Self {
        self.config_global_path = Some(global);
        self.config_local_path = local;
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn backend(&self) -> Result<Arc<dyn RenderBackend>> {
        let backend = HttpBackend::new(&self.endpoint, self.timeout)
            .with_context(|| format!("Failed to set up a client for {}", self.endpoint))?;
        Ok(Arc::new(backend))
    }

    /// Renderer whose href policy admits the backend's own origin.
    fn renderer_for(&self, backend: &dyn RenderBackend) -> DiagramRenderer {
        let policy = backend
            .origin()
            .map_or_else(HrefPolicy::local_only, HrefPolicy::with_origin);
        DiagramRenderer::new(self.renderer_config.clone(), policy)
    }

    /// Controller whose workers prefetch icons into `icons` once each
    /// successful submission has been delivered.
    fn controller_for(
        &self,
        backend: Arc<dyn RenderBackend>,
        icons: &IconCache,
    ) -> SubmissionController {
        let hook_backend = Arc::clone(&backend);
        let cache = icons.clone();
        SubmissionController::new(backend)
            .with_apply_stale(self.apply_stale)
            .with_markup_hook(Arc::new(move |markup: &str| {
                let fetched = prefetch(markup, hook_backend.as_ref(), &cache);
                debug!(fetched, cached = cache.len(), "icon prefetch finished");
            }))
    }

    /// Contents of the template file. A missing file is an empty template.
    fn read_initial_text(&self) -> Result<String> {
        let Some(path) = &self.file_path else {
            return Ok(String::new());
        };
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "template does not exist yet; starting empty");
                Ok(String::new())
            }
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}
