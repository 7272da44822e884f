//! YAML syntax highlighting for the editor pane.
//!
//! Uses syntect's bundled YAML grammar. Colors are toned down on light
//! terminal backgrounds and mapped to the 256-color palette when the
//! terminal lacks truecolor.

use std::sync::{Mutex, OnceLock};

use ratatui::style::{Color, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::image::rgb_to_xterm_256;

/// One highlighted editor line.
pub type HighlightedLine = Vec<Span<'static>>;

/// Highlight a whole template, one entry per line.
///
/// A trailing line break does not produce an extra entry.
pub fn highlight_yaml(text: &str, truecolor: bool) -> Vec<HighlightedLine> {
    let syntax_set = syntax_set();
    let Some(syntax) = yaml_syntax(syntax_set) else {
        return plain_lines(text);
    };
    let mode = background_mode();

    let mut highlighter = HighlightLines::new(syntax, theme());
    let mut lines = Vec::new();
    for line in LinesWithEndings::from(text) {
        let Ok(ranges) = highlighter.highlight_line(line, syntax_set) else {
            lines.push(vec![Span::raw(strip_break(line).to_string())]);
            continue;
        };
        let spans = ranges
            .into_iter()
            .filter_map(|(style, fragment)| {
                let fragment = strip_break(fragment);
                if fragment.is_empty() {
                    return None;
                }
                let (r, g, b) = adjust_fg_for_background(
                    (style.foreground.r, style.foreground.g, style.foreground.b),
                    mode,
                );
                let color = if truecolor {
                    Color::Rgb(r, g, b)
                } else {
                    Color::Indexed(rgb_to_xterm_256(r, g, b))
                };
                Some(Span::styled(fragment.to_string(), Style::new().fg(color)))
            })
            .collect();
        lines.push(spans);
    }
    lines
}

fn strip_break(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

fn plain_lines(text: &str) -> Vec<HighlightedLine> {
    text.lines()
        .map(|line| vec![Span::raw(line.to_string())])
        .collect()
}

fn yaml_syntax(syntax_set: &SyntaxSet) -> Option<&SyntaxReference> {
    syntax_set
        .find_syntax_by_extension("yaml")
        .or_else(|| syntax_set.find_syntax_by_name("YAML"))
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let theme_set = ThemeSet::load_defaults();
        let preferred: &[&str] = match background_mode() {
            BackgroundMode::Dark => &[
                "base16-eighties.dark",
                "base16-ocean.dark",
                "Solarized (dark)",
            ],
            BackgroundMode::Light => &["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
        };
        preferred
            .iter()
            .find_map(|name| theme_set.themes.get(*name).cloned())
            .or_else(|| theme_set.themes.values().next().cloned())
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundMode {
    Dark,
    Light,
}

/// Terminal background, when known or forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

static BACKGROUND_OVERRIDE: Mutex<Option<HighlightBackground>> = Mutex::new(None);

/// Force the background used for color choices. `None` means detect it
/// from `COLORFGBG`.
pub fn set_background_mode(mode: Option<HighlightBackground>) {
    let mut guard = BACKGROUND_OVERRIDE
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    *guard = mode;
}

fn background_mode() -> BackgroundMode {
    let forced = BACKGROUND_OVERRIDE
        .lock()
        .map(|guard| *guard)
        .unwrap_or_default();
    match forced {
        Some(HighlightBackground::Light) => BackgroundMode::Light,
        Some(HighlightBackground::Dark) => BackgroundMode::Dark,
        None => background_mode_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref()),
    }
}

fn background_mode_from_colorfgbg(colorfgbg: Option<&str>) -> BackgroundMode {
    let bg = colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.parse::<u8>().ok());
    match bg {
        Some(bg) if bg >= 7 => BackgroundMode::Light,
        _ => BackgroundMode::Dark,
    }
}

fn luma((r, g, b): (u8, u8, u8)) -> f32 {
    0.0722f32.mul_add(
        f32::from(b),
        0.2126f32.mul_add(f32::from(r), 0.7152 * f32::from(g)),
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn adjust_fg_for_background(color: (u8, u8, u8), mode: BackgroundMode) -> (u8, u8, u8) {
    if mode == BackgroundMode::Dark || luma(color) < 155.0 {
        return color;
    }
    let darken = |v: u8| (f32::from(v) * 0.42).round() as u8;
    (darken(color.0), darken(color.1), darken(color.2))
}
