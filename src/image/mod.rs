//! Terminal graphics for the diagram pane.
//!
//! Picks the best protocol the terminal supports (Kitty, Sixel, iTerm2,
//! or Unicode half-blocks) and converts rasterized diagrams into it.

use std::fmt;
#[cfg(unix)]
use std::time::Duration;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use ratatui::layout::Rect;
use ratatui_image::Resize;
use ratatui_image::picker::{Picker, ProtocolType};
#[cfg(unix)]
use ratatui_image::picker::cap_parser::QueryStdioOptions;
use ratatui_image::protocol::{StatefulProtocol, StatefulProtocolType};
use tracing::debug;

use crate::diagram::{DiagramError, PreparedDiagram};

#[cfg(unix)]
const PICKER_QUERY_TIMEOUT_MS: u64 = 250;

/// Create a picker for terminal image rendering.
///
/// Returns `None` when the terminal cannot be queried.
pub fn create_picker(force_half_cell: bool) -> Option<Picker> {
    if force_half_cell {
        debug!(protocol = "halfblocks", "image picker forced to half-cell mode");
        return Some(Picker::halfblocks());
    }

    // The stdio capability query can wedge the console input buffer on
    // Windows terminals.
    #[cfg(not(unix))]
    {
        debug!(protocol = "halfblocks", "image picker uses half-cell mode on this platform");
        Some(Picker::halfblocks())
    }

    #[cfg(unix)]
    {
        let picker = Picker::from_query_stdio_with_options(query_options()).ok()?;
        debug!(
            term = %std::env::var("TERM").unwrap_or_default(),
            term_program = %std::env::var("TERM_PROGRAM").unwrap_or_default(),
            protocol = ?picker.protocol_type(),
            "image picker created"
        );
        Some(picker)
    }
}

#[cfg(unix)]
fn query_options() -> QueryStdioOptions {
    let mut options = QueryStdioOptions::default();
    options.timeout = Duration::from_millis(PICKER_QUERY_TIMEOUT_MS);
    options
}

pub fn is_halfblocks(picker: &Picker) -> bool {
    matches!(picker.protocol_type(), ProtocolType::Halfblocks)
}

/// Whether terminal output should be treated as truecolor-capable.
///
/// `STACKVIEW_TRUECOLOR` overrides detection.
pub fn supports_truecolor_terminal() -> bool {
    if let Ok(force) = std::env::var("STACKVIEW_TRUECOLOR") {
        return matches!(
            force.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if std::env::var("TERM_PROGRAM").is_ok_and(|program| program == "Apple_Terminal") {
        return false;
    }
    supports_truecolor_from_env(
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

fn supports_truecolor_from_env(colorterm: Option<&str>, term: Option<&str>) -> bool {
    let colorterm = colorterm.unwrap_or_default().to_ascii_lowercase();
    let term = term.unwrap_or_default().to_ascii_lowercase();
    colorterm.contains("truecolor")
        || colorterm.contains("24bit")
        || term.contains("direct")
        || term.contains("truecolor")
}

/// A diagram converted for the terminal's graphics protocol.
pub struct DiagramImage {
    protocol: StatefulProtocol,
    width_cols: u16,
    height_rows: u16,
}

impl DiagramImage {
    /// Rasterize `prepared` to fill `target_cols` terminal columns.
    pub fn build(
        picker: &Picker,
        prepared: &PreparedDiagram,
        target_cols: u16,
    ) -> Result<Self, DiagramError> {
        let target_px = u32::from(target_cols) * u32::from(picker.font_size().0);
        let mut raster = prepared.rasterize(target_px)?;
        let halfblocks = is_halfblocks(picker);
        if halfblocks && !supports_truecolor_terminal() {
            raster = quantize_to_ansi256(&raster);
        }

        let (width_px, height_px) = raster.dimensions();
        let protocol = picker.new_resize_protocol(raster);
        let rect = protocol.size_for(
            resize_mode(&protocol),
            Rect::new(0, 0, target_cols, u16::MAX),
        );
        debug!(
            target_cols,
            width_px,
            height_px,
            width_cols = rect.width,
            height_rows = rect.height,
            halfblocks,
            "diagram image built"
        );
        Ok(Self {
            protocol,
            width_cols: rect.width.max(1),
            height_rows: rect.height.max(1),
        })
    }

    pub const fn width_cols(&self) -> u16 {
        self.width_cols
    }

    pub const fn height_rows(&self) -> u16 {
        self.height_rows
    }

    pub const fn protocol_mut(&mut self) -> &mut StatefulProtocol {
        &mut self.protocol
    }

    pub fn is_halfblocks(&self) -> bool {
        matches!(
            self.protocol.protocol_type(),
            StatefulProtocolType::Halfblocks(_)
        )
    }

    /// iTerm2 stores the whole picture in one anchor cell, so it cannot be
    /// sliced row by row.
    pub fn is_anchored(&self) -> bool {
        matches!(self.protocol.protocol_type(), StatefulProtocolType::ITerm2(_))
    }

    pub fn resize_mode(&self) -> Resize {
        resize_mode(&self.protocol)
    }
}

impl fmt::Debug for DiagramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramImage")
            .field("width_cols", &self.width_cols)
            .field("height_rows", &self.height_rows)
            .finish_non_exhaustive()
    }
}

fn resize_mode(protocol: &StatefulProtocol) -> Resize {
    if matches!(
        protocol.protocol_type(),
        StatefulProtocolType::Halfblocks(_)
    ) {
        // Nearest-neighbour aliases badly at half-cell resolution.
        Resize::Scale(Some(image::imageops::FilterType::CatmullRom))
    } else {
        Resize::Scale(None)
    }
}

/// Quantize RGB channels to the ANSI-256 palette, keeping alpha.
pub fn quantize_to_ansi256(image: &DynamicImage) -> DynamicImage {
    let src = image.to_rgba8();
    let out = RgbaImage::from_fn(src.width(), src.height(), |x, y| {
        let px = src.get_pixel(x, y);
        let (r, g, b) = xterm_256_to_rgb(rgb_to_xterm_256(px[0], px[1], px[2]));
        Rgba([r, g, b, px[3]])
    });
    DynamicImage::ImageRgba8(out)
}

/// Nearest color in the 6x6x6 xterm cube.
#[allow(clippy::cast_possible_truncation)]
pub const fn rgb_to_xterm_256(r: u8, g: u8, b: u8) -> u8 {
    const fn to_cube(v: u8) -> u8 {
        ((v as u16 * 5) / 255) as u8
    }
    16 + 36 * to_cube(r) + 6 * to_cube(g) + to_cube(b)
}

const fn xterm_256_to_rgb(i: u8) -> (u8, u8, u8) {
    const fn level(c: u8) -> u8 {
        if c == 0 { 0 } else { 55 + c * 40 }
    }
    match i {
        0..=15 => {
            const BASE: [(u8, u8, u8); 16] = [
                (0, 0, 0),
                (205, 0, 0),
                (0, 205, 0),
                (205, 205, 0),
                (0, 0, 238),
                (205, 0, 205),
                (0, 205, 205),
                (229, 229, 229),
                (127, 127, 127),
                (255, 0, 0),
                (0, 255, 0),
                (255, 255, 0),
                (92, 92, 255),
                (255, 0, 255),
                (0, 255, 255),
                (255, 255, 255),
            ];
            BASE[i as usize]
        }
        16..=231 => {
            let i = i - 16;
            (level(i / 36), level((i / 6) % 6), level(i % 6))
        }
        232..=255 => {
            let gray = 8 + (i - 232) * 10;
            (gray, gray, gray)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{DiagramRenderer, NoIcons};

    #[cfg(unix)]
    #[test]
    fn test_picker_query_timeout_is_fast() {
        assert_eq!(query_options().timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_truecolor_detection_from_env() {
        assert!(supports_truecolor_from_env(Some("truecolor"), Some("xterm-256color")));
        assert!(supports_truecolor_from_env(Some("24BIT"), None));
        assert!(supports_truecolor_from_env(None, Some("xterm-direct")));
        assert!(!supports_truecolor_from_env(None, Some("xterm-256color")));
    }

    #[test]
    fn test_xterm_cube_corners() {
        assert_eq!(rgb_to_xterm_256(0, 0, 0), 16);
        assert_eq!(rgb_to_xterm_256(255, 255, 255), 231);
        assert_eq!(xterm_256_to_rgb(231), (255, 255, 255));
        assert_eq!(xterm_256_to_rgb(196), (255, 0, 0));
        assert_eq!(xterm_256_to_rgb(244), (128, 128, 128));
    }

    #[test]
    fn test_quantize_preserves_alpha_and_size() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([12, 34, 56, 77])));
        let quantized = quantize_to_ansi256(&image);
        assert_eq!(quantized.dimensions(), (3, 2));
        assert_eq!(quantized.to_rgba8().get_pixel(0, 0)[3], 77);
    }

    #[test]
    fn test_diagram_image_fills_target_columns_in_halfblocks() {
        let picker = Picker::halfblocks();
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100"><rect width="200" height="100" fill="blue"/></svg>"#;
        let prepared = DiagramRenderer::default().prepare(svg, &NoIcons).unwrap();
        let image = DiagramImage::build(&picker, &prepared, 40).unwrap();
        assert!(image.is_halfblocks());
        assert!(!image.is_anchored());
        assert!(image.width_cols() <= 40);
        assert!(image.height_rows() >= 1);
    }
}
