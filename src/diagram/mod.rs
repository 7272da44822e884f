//! Turning service markup into something safe to display.
//!
//! The pipeline is sanitize, then apply presentation overrides, then
//! (optionally) rasterize. The raw markup held by the submission
//! controller is never modified.

mod icons;
mod present;
mod raster;
mod sanitize;

pub use icons::{DEFAULT_ICON_CAPACITY, IconCache, icon_hrefs, prefetch};
pub use present::{
    IconSource, LabelBaseline, NoIcons, RendererConfig, apply_presentation, data_uri,
};
pub use raster::{MAX_RASTER_HEIGHT, rasterize};
pub use sanitize::{HrefPolicy, SanitizeError, SanitizeReport, sanitize};

use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// Shown in the diagram pane before any submission has resolved.
pub const PLACEHOLDER_TEXT: &str = "Your diagram will appear here";

/// Errors from preparing or rasterizing a diagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error("could not rasterize diagram: {0}")]
    Rasterize(String),

    #[error("diagram has no drawable area")]
    EmptyCanvas,
}

/// A sanitized, restyled copy of a diagram, ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDiagram {
    svg: String,
    report: SanitizeReport,
    source_len: usize,
}

impl PreparedDiagram {
    pub fn svg(&self) -> &str {
        &self.svg
    }

    pub const fn report(&self) -> SanitizeReport {
        self.report
    }

    /// Size of the markup this was prepared from, in bytes.
    pub const fn source_len(&self) -> usize {
        self.source_len
    }

    /// Number of elements in the display copy.
    pub fn element_count(&self) -> usize {
        let bytes = self.svg.as_bytes();
        self.svg
            .match_indices('<')
            .filter(|(idx, _)| !matches!(bytes.get(idx + 1), Some(b'/' | b'!' | b'?')))
            .count()
    }

    pub fn rasterize(&self, target_width_px: u32) -> Result<DynamicImage, DiagramError> {
        rasterize(&self.svg, target_width_px)
    }
}

/// Renderer parameterized by [`RendererConfig`].
#[derive(Debug, Clone, Default)]
pub struct DiagramRenderer {
    config: RendererConfig,
    policy: HrefPolicy,
}

impl DiagramRenderer {
    pub const fn new(config: RendererConfig, policy: HrefPolicy) -> Self {
        Self { config, policy }
    }

    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub const fn policy(&self) -> &HrefPolicy {
        &self.policy
    }

    /// Sanitize `markup` without restyling it.
    pub fn sanitize(&self, markup: &str) -> Result<String, DiagramError> {
        let (clean, report) = sanitize(markup, &self.policy)?;
        log_report(report);
        Ok(clean)
    }

    /// Build the display copy of `markup`.
    pub fn prepare(
        &self,
        markup: &str,
        icons: &dyn IconSource,
    ) -> Result<PreparedDiagram, DiagramError> {
        let (clean, report) = sanitize(markup, &self.policy)?;
        log_report(report);
        let svg = apply_presentation(&clean, &self.config, icons)?;
        Ok(PreparedDiagram {
            svg,
            report,
            source_len: markup.len(),
        })
    }
}

fn log_report(report: SanitizeReport) {
    if !report.is_clean() {
        debug!(
            removed_elements = report.removed_elements,
            removed_attributes = report.removed_attributes,
            "sanitizer removed content from diagram"
        );
    }
}
