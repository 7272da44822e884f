//! SVG rasterization for terminal display.

use std::sync::{Arc, OnceLock};

use image::{DynamicImage, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use super::DiagramError;

/// Tallest raster produced, in pixels. Taller diagrams are scaled down.
pub const MAX_RASTER_HEIGHT: u32 = 16_384;

fn font_database() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    Arc::clone(FONTS.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts");
        Arc::new(db)
    }))
}

/// Render `svg` scaled to `target_width_px` pixels wide.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn rasterize(svg: &str, target_width_px: u32) -> Result<DynamicImage, DiagramError> {
    let _span = tracing::debug_span!("rasterize", target_width_px, svg_len = svg.len()).entered();
    let opts = usvg::Options {
        fontdb: font_database(),
        ..Default::default()
    };
    let tree =
        usvg::Tree::from_str(svg, &opts).map_err(|err| DiagramError::Rasterize(err.to_string()))?;
    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 || target_width_px == 0 {
        return Err(DiagramError::EmptyCanvas);
    }

    let mut scale = target_width_px as f32 / size.width();
    if size.height() * scale > MAX_RASTER_HEIGHT as f32 {
        scale = MAX_RASTER_HEIGHT as f32 / size.height();
    }

    let width = ((size.width() * scale).ceil() as u32).max(1);
    let height = ((size.height() * scale).ceil() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        DiagramError::Rasterize(format!("cannot allocate {width}x{height} pixmap"))
    })?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    let buffer = RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or_else(|| DiagramError::Rasterize("pixmap size mismatch".to_string()))?;
    Ok(DynamicImage::ImageRgba8(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_rasterize_scales_to_target_width() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="100" height="50" fill="red"/></svg>"#;
        let img = rasterize(svg, 200).unwrap();
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(img.to_rgba8().get_pixel(10, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_rasterize_caps_height() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="100000"/>"#;
        let img = rasterize(svg, 100).unwrap();
        assert!(img.height() <= MAX_RASTER_HEIGHT);
    }

    #[test]
    fn test_rasterize_rejects_garbage() {
        assert!(matches!(
            rasterize("not svg", 100),
            Err(DiagramError::Rasterize(_))
        ));
    }

    #[test]
    fn test_rasterize_zero_width_target_is_empty() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;
        assert!(matches!(rasterize(svg, 0), Err(DiagramError::EmptyCanvas)));
    }
}
