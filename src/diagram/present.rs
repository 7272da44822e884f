//! Presentation overrides applied to the display copy of a diagram.
//!
//! The service's markup is never modified in place; these rules rewrite a
//! sanitized copy so that icons and labels look the same regardless of
//! what the service emitted.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::SanitizeError;

/// Vertical placement of node labels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LabelBaseline {
    /// Centered on the anchor point.
    Central,
    /// Centered, then pushed down by `em` font heights.
    Offset { em: f32 },
}

impl LabelBaseline {
    pub const DEFAULT_OFFSET_EM: f32 = 3.0;

    /// Parse `central`, `offset` or `offset:<em>`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        match value.as_str() {
            "central" | "middle" => Some(Self::Central),
            "offset" => Some(Self::default()),
            _ => {
                let em = value.strip_prefix("offset:")?.parse::<f32>().ok()?;
                em.is_finite().then_some(Self::Offset { em })
            }
        }
    }
}

impl Default for LabelBaseline {
    fn default() -> Self {
        Self::Offset {
            em: Self::DEFAULT_OFFSET_EM,
        }
    }
}

impl fmt::Display for LabelBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Central => f.write_str("central"),
            Self::Offset { em } => write!(f, "offset:{em}"),
        }
    }
}

/// Knobs for the diagram renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Width and height forced onto every `<image>`, in user units.
    pub icon_size: u32,
    pub label_baseline: LabelBaseline,
    pub label_font: String,
    pub label_font_size: u32,
    pub edge_label_font_size: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            icon_size: 128,
            label_baseline: LabelBaseline::default(),
            label_font: "Monaco, Menlo, monospace".to_string(),
            label_font_size: 14,
            edge_label_font_size: 12,
        }
    }
}

/// Resolves icon references to inline `data:` URIs.
pub trait IconSource {
    fn icon_data_uri(&self, href: &str) -> Option<String>;
}

/// An [`IconSource`] that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIcons;

impl IconSource for NoIcons {
    fn icon_data_uri(&self, _href: &str) -> Option<String> {
        None
    }
}

/// Encode raster bytes as a `data:` URI, or `None` for unsupported formats.
pub fn data_uri(bytes: &[u8]) -> Option<String> {
    let format = image::guess_format(bytes).ok()?;
    let mime = format.to_mime_type();
    matches!(mime, "image/png" | "image/jpeg" | "image/gif" | "image/webp")
        .then(|| format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

/// Apply the presentation rules to sanitized markup.
pub fn apply_presentation(
    svg: &str,
    config: &RendererConfig,
    icons: &dyn IconSource,
) -> Result<String, SanitizeError> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Vec::with_capacity(svg.len() + svg.len() / 4));
    // One entry per open element: whether it sits inside an edge group.
    let mut edge_scope: Vec<bool> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|err| SanitizeError::Malformed(err.to_string()))?;

        let out = match event {
            Event::Eof => break,
            Event::Start(start) => {
                let in_edge =
                    edge_scope.last().copied().unwrap_or(false) || has_class(&start, "edge");
                edge_scope.push(in_edge);
                match restyle(&start, in_edge, config, icons) {
                    Some(clean) => Event::Start(clean),
                    None => Event::Start(start),
                }
            }
            Event::Empty(start) => {
                let in_edge =
                    edge_scope.last().copied().unwrap_or(false) || has_class(&start, "edge");
                match restyle(&start, in_edge, config, icons) {
                    Some(clean) => Event::Empty(clean),
                    None => Event::Empty(start),
                }
            }
            Event::End(end) => {
                edge_scope.pop();
                Event::End(end)
            }
            other => other,
        };

        writer
            .write_event(out)
            .map_err(|err| SanitizeError::Malformed(err.to_string()))?;
    }

    String::from_utf8(writer.into_inner()).map_err(|err| SanitizeError::Malformed(err.to_string()))
}

fn has_class(start: &BytesStart<'_>, class: &str) -> bool {
    start
        .attributes()
        .with_checks(false)
        .flatten()
        .any(|attr| {
            attr.key.as_ref() == b"class"
                && std::str::from_utf8(&attr.value)
                    .is_ok_and(|value| value.split_whitespace().any(|c| c == class))
        })
}

/// Rewrite one element, or `None` when no rule applies to it.
fn restyle(
    start: &BytesStart<'_>,
    in_edge: bool,
    config: &RendererConfig,
    icons: &dyn IconSource,
) -> Option<BytesStart<'static>> {
    match start.local_name().as_ref() {
        b"image" => Some(restyle_icon(start, config, icons)),
        b"text" => Some(restyle_label(start, in_edge, config)),
        _ => None,
    }
}

fn restyle_icon(
    start: &BytesStart<'_>,
    config: &RendererConfig,
    icons: &dyn IconSource,
) -> BytesStart<'static> {
    let mut out = owned_name(start);
    let size = config.icon_size.to_string();

    for attr in start.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match key.as_str() {
            "width" | "height" => {}
            "style" => push_style_without(&mut out, &attr.value, &["width", "height"]),
            "href" | "xlink:href" => {
                let Ok(href) = std::str::from_utf8(&attr.value) else {
                    continue;
                };
                if href.starts_with("data:") || href.starts_with('#') {
                    out.push_attribute(attr.clone());
                } else if let Some(uri) = icons.icon_data_uri(href) {
                    out.push_attribute((key.as_str(), uri.as_str()));
                } else {
                    tracing::trace!(href, "dropping unresolved icon reference");
                }
            }
            _ => out.push_attribute(attr),
        }
    }
    out.push_attribute(("width", size.as_str()));
    out.push_attribute(("height", size.as_str()));
    out
}

fn restyle_label(
    start: &BytesStart<'_>,
    in_edge: bool,
    config: &RendererConfig,
) -> BytesStart<'static> {
    let mut out = owned_name(start);
    for attr in start.attributes().with_checks(false).flatten() {
        match attr.key.as_ref() {
            b"text-anchor" | b"dominant-baseline" | b"font-family" | b"font-size" | b"dy" => {}
            b"style" => push_style_without(&mut out, &attr.value, LABEL_PROPERTIES),
            _ => out.push_attribute(attr),
        }
    }

    out.push_attribute(("text-anchor", "middle"));
    out.push_attribute(("font-family", config.label_font.as_str()));
    if in_edge {
        out.push_attribute(("font-size", config.edge_label_font_size.to_string().as_str()));
        out.push_attribute(("dominant-baseline", "middle"));
    } else {
        out.push_attribute(("font-size", config.label_font_size.to_string().as_str()));
        out.push_attribute(("dominant-baseline", "central"));
        if let LabelBaseline::Offset { em } = config.label_baseline {
            out.push_attribute(("dy", format!("{em}em").as_str()));
        }
    }
    out
}

/// Label properties the overrides own; `style` must not win over them.
const LABEL_PROPERTIES: &[&str] =
    &["text-anchor", "dominant-baseline", "font-family", "font-size"];

/// Copy a `style` attribute minus the declarations for `properties`.
/// The attribute is left off entirely when nothing remains.
fn push_style_without(out: &mut BytesStart<'static>, value: &[u8], properties: &[&str]) {
    let style = String::from_utf8_lossy(value);
    let kept = style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let name = decl.split(':').next().unwrap_or_default().trim();
            !properties.iter().any(|p| name.eq_ignore_ascii_case(p))
        })
        .collect::<Vec<_>>()
        .join(";");
    if !kept.is_empty() {
        out.push_attribute(("style", kept.as_str()));
    }
}

fn owned_name(start: &BytesStart<'_>) -> BytesStart<'static> {
    BytesStart::new(String::from_utf8_lossy(start.name().as_ref()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapIcons(HashMap<&'static str, &'static str>);

    impl IconSource for MapIcons {
        fn icon_data_uri(&self, href: &str) -> Option<String> {
            self.0.get(href).map(|uri| (*uri).to_string())
        }
    }

    fn present(svg: &str, config: &RendererConfig) -> String {
        apply_presentation(svg, config, &NoIcons).unwrap()
    }

    #[test]
    fn test_images_are_forced_to_icon_size() {
        let out = present(
            r#"<svg><image x="3" width="20" height="40" xlink:href="data:image/png;base64,AA"/></svg>"#,
            &RendererConfig::default(),
        );
        assert_eq!(
            out,
            r#"<svg><image x="3" xlink:href="data:image/png;base64,AA" width="128" height="128"/></svg>"#
        );
    }

    #[test]
    fn test_icon_style_cannot_resize_icon() {
        let out = present(
            r#"<svg><image style="width:10px; height:10px" href="data:image/png;base64,AA"/><image style="WIDTH:5px;opacity:0.5"/></svg>"#,
            &RendererConfig::default(),
        );
        assert_eq!(
            out,
            r#"<svg><image href="data:image/png;base64,AA" width="128" height="128"/><image style="opacity:0.5" width="128" height="128"/></svg>"#
        );
    }

    #[test]
    fn test_label_style_keeps_only_unrelated_declarations() {
        let out = present(
            r#"<svg><text style="font-size:30px;font-family:Times; text-anchor:start;dominant-baseline:hanging;fill:red">S3</text></svg>"#,
            &RendererConfig::default(),
        );
        assert!(out.starts_with(r#"<svg><text style="fill:red" text-anchor="middle""#));
        assert!(!out.contains("30px"));
        assert!(!out.contains("Times"));

        let out = present(
            r#"<svg><g class="edge"><text style="font-size: 30px">uses</text></g></svg>"#,
            &RendererConfig::default(),
        );
        assert!(!out.contains("style="));
        assert!(out.contains(r#"font-size="12""#));
    }

    #[test]
    fn test_node_label_gets_offset_baseline() {
        let out = present(
            r#"<svg><g class="node"><text x="1" font-size="8" font-family="Times">S3</text></g></svg>"#,
            &RendererConfig::default(),
        );
        assert_eq!(
            out,
            r#"<svg><g class="node"><text x="1" text-anchor="middle" font-family="Monaco, Menlo, monospace" font-size="14" dominant-baseline="central" dy="3em">S3</text></g></svg>"#
        );
    }

    #[test]
    fn test_edge_label_uses_smaller_font_and_middle_baseline() {
        let out = present(
            r#"<svg><g class="edge highlighted"><path d="M0 0"/><text>uses</text></g></svg>"#,
            &RendererConfig::default(),
        );
        assert!(out.contains(
            r#"<text text-anchor="middle" font-family="Monaco, Menlo, monospace" font-size="12" dominant-baseline="middle">uses</text>"#
        ));
        assert!(!out.contains("dy="));
    }

    #[test]
    fn test_edge_scope_ends_with_group() {
        let out = present(
            r#"<svg><g class="edge"><text>a</text></g><text>b</text></svg>"#,
            &RendererConfig::default(),
        );
        assert!(out.contains(r#"font-size="12" dominant-baseline="middle">a<"#));
        assert!(out.contains(r#"font-size="14" dominant-baseline="central" dy="3em">b<"#));
    }

    #[test]
    fn test_central_baseline_has_no_offset() {
        let config = RendererConfig {
            label_baseline: LabelBaseline::Central,
            ..RendererConfig::default()
        };
        let out = present("<svg><text>x</text></svg>", &config);
        assert!(out.contains(r#"dominant-baseline="central">x<"#));
        assert!(!out.contains("dy="));
    }

    #[test]
    fn test_remote_icon_is_inlined_from_source() {
        let icons = MapIcons(HashMap::from([(
            "http://localhost:5001/icons/s3.png",
            "data:image/png;base64,QUJD",
        )]));
        let out = apply_presentation(
            r#"<svg><image xlink:href="http://localhost:5001/icons/s3.png"/></svg>"#,
            &RendererConfig::default(),
            &icons,
        )
        .unwrap();
        assert!(out.contains(r#"xlink:href="data:image/png;base64,QUJD""#));
    }

    #[test]
    fn test_unresolved_remote_icon_is_dropped() {
        let out = present(
            r#"<svg><image href="http://localhost:5001/icons/missing.png"/></svg>"#,
            &RendererConfig::default(),
        );
        assert_eq!(out, r#"<svg><image width="128" height="128"/></svg>"#);
    }

    #[test]
    fn test_other_elements_are_untouched() {
        let svg = r#"<svg viewBox="0 0 1 1"><rect width="1"/><title>t</title></svg>"#;
        assert_eq!(present(svg, &RendererConfig::default()), svg);
    }

    #[test]
    fn test_label_baseline_parse_and_display() {
        assert_eq!(LabelBaseline::parse("central"), Some(LabelBaseline::Central));
        assert_eq!(LabelBaseline::parse("offset"), Some(LabelBaseline::default()));
        assert_eq!(
            LabelBaseline::parse("offset:1.5"),
            Some(LabelBaseline::Offset { em: 1.5 })
        );
        assert_eq!(LabelBaseline::parse("offset:nope"), None);
        assert_eq!(LabelBaseline::parse("sideways"), None);
        assert_eq!(LabelBaseline::default().to_string(), "offset:3");
    }

    #[test]
    fn test_data_uri_detects_png() {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgba8(1, 1)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let uri = data_uri(&bytes).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(data_uri(b"not an image"), None);
    }
}
