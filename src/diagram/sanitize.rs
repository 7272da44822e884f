//! Allow-list sanitizer for service-supplied SVG.
//!
//! Elements outside the list are removed together with everything inside
//! them. Attributes outside the list, event handlers, and references that
//! leave the document are removed individually.

use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

const ALLOWED_ELEMENTS: &[&str] = &[
    "svg",
    "g",
    "title",
    "desc",
    "defs",
    "path",
    "polygon",
    "polyline",
    "line",
    "rect",
    "circle",
    "ellipse",
    "text",
    "tspan",
    "image",
    "a",
    "use",
    "symbol",
    "marker",
    "clipPath",
    "linearGradient",
    "radialGradient",
    "stop",
];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "id",
    "class",
    "style",
    "transform",
    "viewBox",
    "preserveAspectRatio",
    "version",
    "width",
    "height",
    "x",
    "y",
    "x1",
    "y1",
    "x2",
    "y2",
    "cx",
    "cy",
    "r",
    "rx",
    "ry",
    "dx",
    "dy",
    "d",
    "points",
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-dasharray",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "opacity",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-anchor",
    "dominant-baseline",
    "clip-path",
    "clipPathUnits",
    "marker-start",
    "marker-mid",
    "marker-end",
    "markerWidth",
    "markerHeight",
    "markerUnits",
    "refX",
    "refY",
    "orient",
    "offset",
    "stop-color",
    "stop-opacity",
    "gradientUnits",
    "gradientTransform",
    "target",
    "xml:space",
];

const ALLOWED_NAMESPACES: &[&str] = &["http://www.w3.org/2000/svg", "http://www.w3.org/1999/xlink"];

const ALLOWED_DATA_IMAGES: &[&str] = &["data:image/png;", "data:image/jpeg;", "data:image/gif;"];

/// Errors raised while sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("diagram markup is not well-formed: {0}")]
    Malformed(String),

    #[error("diagram markup has no <svg> element")]
    NotSvg,
}

/// Counts of what the sanitizer removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub removed_elements: usize,
    pub removed_attributes: usize,
}

impl SanitizeReport {
    pub const fn is_clean(&self) -> bool {
        self.removed_elements == 0 && self.removed_attributes == 0
    }
}

/// Which `href` values may survive.
///
/// Fragment references and inline raster images are always allowed.
/// Absolute URLs are allowed only under `origin`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HrefPolicy {
    origin: Option<String>,
}

impl HrefPolicy {
    pub const fn local_only() -> Self {
        Self { origin: None }
    }

    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self {
            origin: Some(origin.into()),
        }
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn allows(&self, href: &str) -> bool {
        let href = href.trim();
        if href.starts_with('#') {
            return true;
        }
        let lower = href.to_ascii_lowercase();
        if ALLOWED_DATA_IMAGES.iter().any(|prefix| lower.starts_with(prefix)) {
            return true;
        }
        self.origin.as_deref().is_some_and(|origin| {
            href.strip_prefix(origin)
                .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Sanitize `markup`, returning the cleaned document and a report.
pub fn sanitize(
    markup: &str,
    policy: &HrefPolicy,
) -> Result<(String, SanitizeReport), SanitizeError> {
    let mut reader = Reader::from_str(markup);
    let mut writer = Writer::new(Vec::with_capacity(markup.len()));
    let mut report = SanitizeReport::default();
    // Depth inside a removed subtree; zero when emitting.
    let mut skipping = 0usize;
    let mut saw_svg = false;

    loop {
        let event = reader.read_event().map_err(|err| {
            SanitizeError::Malformed(format!(
                "{err} (near byte {})",
                reader.error_position()
            ))
        })?;

        let kept = match event {
            Event::Eof => break,
            Event::Start(start) => {
                if skipping > 0 {
                    skipping += 1;
                    continue;
                }
                match clean_element(&start, policy, &mut report) {
                    Some(clean) => {
                        saw_svg |= local_name(&clean) == "svg";
                        Event::Start(clean)
                    }
                    None => {
                        report.removed_elements += 1;
                        skipping = 1;
                        continue;
                    }
                }
            }
            Event::Empty(start) => {
                if skipping > 0 {
                    continue;
                }
                match clean_element(&start, policy, &mut report) {
                    Some(clean) => {
                        saw_svg |= local_name(&clean) == "svg";
                        Event::Empty(clean)
                    }
                    None => {
                        report.removed_elements += 1;
                        continue;
                    }
                }
            }
            Event::End(end) => {
                if skipping > 0 {
                    skipping -= 1;
                    continue;
                }
                Event::End(end)
            }
            Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
            other => {
                if skipping > 0 {
                    continue;
                }
                other
            }
        };

        writer
            .write_event(kept)
            .map_err(|err| SanitizeError::Malformed(err.to_string()))?;
    }

    if !saw_svg {
        return Err(SanitizeError::NotSvg);
    }

    let cleaned = String::from_utf8(writer.into_inner())
        .map_err(|err| SanitizeError::Malformed(err.to_string()))?;
    Ok((cleaned, report))
}

fn local_name<'a>(start: &'a BytesStart<'_>) -> &'a str {
    let name = start.local_name();
    std::str::from_utf8(name.into_inner()).unwrap_or_default()
}

fn clean_element(
    start: &BytesStart<'_>,
    policy: &HrefPolicy,
    report: &mut SanitizeReport,
) -> Option<BytesStart<'static>> {
    let name = std::str::from_utf8(start.name().as_ref()).ok()?.to_owned();
    if !ALLOWED_ELEMENTS.contains(&local_name(start)) {
        return None;
    }

    let mut clean = BytesStart::new(name);
    for attr in start.attributes().with_checks(false) {
        let Ok(attr) = attr else {
            report.removed_attributes += 1;
            continue;
        };
        if attribute_allowed(&attr, policy) {
            clean.push_attribute(attr);
        } else {
            report.removed_attributes += 1;
        }
    }
    Some(clean)
}

fn attribute_allowed(attr: &Attribute<'_>, policy: &HrefPolicy) -> bool {
    let (Ok(key), Ok(value)) = (
        std::str::from_utf8(attr.key.as_ref()),
        std::str::from_utf8(&attr.value),
    ) else {
        return false;
    };

    if key.to_ascii_lowercase().starts_with("on") {
        return false;
    }
    if key == "href" || key == "xlink:href" {
        return policy.allows(value);
    }
    if key == "xmlns" || key.starts_with("xmlns:") {
        return ALLOWED_NAMESPACES.contains(&value);
    }
    ALLOWED_ATTRIBUTES.contains(&key) && !has_external_reference(value)
}

/// True when a value pulls in something outside the document.
fn has_external_reference(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    if lower.contains("javascript:") || lower.contains("expression(") || lower.contains("@import")
    {
        return true;
    }
    lower.match_indices("url(").any(|(idx, _)| {
        let target = lower[idx + 4..].trim_start_matches([' ', '\'', '"']);
        !target.starts_with('#')
    })
}
