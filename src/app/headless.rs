use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::app::App;
use crate::submit::{RenderBackend, RenderResult, SubmissionController};

/// How long each wait for the worker lasts before checking again.
const WAIT_SLICE: Duration = Duration::from_millis(250);

impl App {
    /// Submit the template once and write the sanitized diagram to `out`.
    ///
    /// # Errors
    ///
    /// Returns the backend's message when the submission resolves to an
    /// error, or an I/O error if the template or output cannot be accessed.
    pub fn render_to_file(&self, out: &Path) -> Result<()> {
        let backend = self.backend()?;
        self.render_to_file_with(backend, out)
    }

    pub(super) fn render_to_file_with(
        &self,
        backend: Arc<dyn RenderBackend>,
        out: &Path,
    ) -> Result<()> {
        let Some(path) = &self.file_path else {
            bail!("--render-to needs a template FILE to read");
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let renderer = self.renderer_for(backend.as_ref());
        let mut controller = SubmissionController::new(backend);
        controller.update_document(&text);
        let generation = controller.submit();
        debug!(generation, template = %path.display(), "headless submission issued");

        while controller.in_flight() > 0 {
            controller.wait(WAIT_SLICE);
        }

        match controller.result() {
            RenderResult::Markup(markup) => {
                let clean = renderer
                    .sanitize(markup)
                    .context("The service returned markup that is not a usable SVG")?;
                if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                std::fs::write(out, &clean)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                info!(out = %out.display(), bytes = clean.len(), "diagram written");
                Ok(())
            }
            RenderResult::Error(message) => bail!("{message}"),
            RenderResult::None => bail!("no response from the rendering service"),
        }
    }
}
