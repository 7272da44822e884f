//! Persistent defaults stored as command-line flag tokens.
//!
//! Config files hold the same flags the CLI accepts, one or more per line,
//! with `#` comments. A global file lives in the platform config directory;
//! a `.stackviewrc` in the working directory overrides it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::diagram::{LabelBaseline, RendererConfig};

const APP_DIR: &str = "stackview";
const LOCAL_FILE: &str = ".stackviewrc";

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

/// Flags that can be saved as defaults.
///
/// Booleans combine with OR; valued options take the later source.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFlags {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub watch: bool,
    pub no_images: bool,
    pub force_half_cell: bool,
    pub apply_stale: bool,
    pub theme: Option<ThemeMode>,
    pub debug_log: Option<PathBuf>,
    pub icon_size: Option<u32>,
    pub label_font: Option<String>,
    pub label_baseline: Option<LabelBaseline>,
}

impl ConfigFlags {
    /// Merge `other` over `self`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            endpoint: other.endpoint.clone().or_else(|| self.endpoint.clone()),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            watch: self.watch || other.watch,
            no_images: self.no_images || other.no_images,
            force_half_cell: self.force_half_cell || other.force_half_cell,
            apply_stale: self.apply_stale || other.apply_stale,
            theme: other.theme.or(self.theme),
            debug_log: other.debug_log.clone().or_else(|| self.debug_log.clone()),
            icon_size: other.icon_size.or(self.icon_size),
            label_font: other.label_font.clone().or_else(|| self.label_font.clone()),
            label_baseline: other.label_baseline.or(self.label_baseline),
        }
    }

    /// Renderer settings, falling back to the defaults for unset options.
    pub fn renderer_config(&self) -> RendererConfig {
        let defaults = RendererConfig::default();
        RendererConfig {
            icon_size: self.icon_size.unwrap_or(defaults.icon_size),
            label_baseline: self.label_baseline.unwrap_or(defaults.label_baseline),
            label_font: self
                .label_font
                .clone()
                .unwrap_or_else(|| defaults.label_font.clone()),
            ..defaults
        }
    }

    fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(endpoint) = &self.endpoint {
            lines.push(format!("--endpoint {endpoint}"));
        }
        if let Some(secs) = self.timeout_secs {
            lines.push(format!("--timeout {secs}"));
        }
        for (enabled, flag) in [
            (self.watch, "--watch"),
            (self.no_images, "--no-images"),
            (self.force_half_cell, "--force-half-cell"),
            (self.apply_stale, "--apply-stale"),
        ] {
            if enabled {
                lines.push(flag.to_string());
            }
        }
        if let Some(theme) = self.theme {
            lines.push(format!("--theme {}", theme.as_str()));
        }
        if let Some(path) = &self.debug_log {
            lines.push(format!("--debug-log {}", quoted(&path.display().to_string())));
        }
        if let Some(size) = self.icon_size {
            lines.push(format!("--icon-size {size}"));
        }
        if let Some(font) = &self.label_font {
            lines.push(format!("--label-font {}", quoted(font)));
        }
        if let Some(baseline) = self.label_baseline {
            lines.push(format!("--label-baseline {baseline}"));
        }
        lines
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR).join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR).join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR).join("config");
        }
    }

    PathBuf::from(LOCAL_FILE)
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_FILE)
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(split_line)
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# stackview defaults (saved with --save)".to_string()];
    lines.extend(flags.to_lines());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Wrap a value in double quotes when it would not survive `split_line` as is.
fn quoted(value: &str) -> String {
    let special = |c: char| c.is_whitespace() || c == '"' || c == '\\';
    if !value.is_empty() && !value.contains(special) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Split an rc line into tokens on whitespace. Double quotes group words,
/// also mid-token as in `--label-font="Fira Code"`, and `\` escapes the
/// next character inside them.
fn split_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// Command-line parser for `--label-baseline`, so bad values are reported.
pub fn parse_label_baseline(value: &str) -> Result<LabelBaseline, String> {
    LabelBaseline::parse(value)
        .ok_or_else(|| format!("expected central, offset, or offset:<em>, got '{value}'"))
}

/// Split `--flag value` or `--flag=value`. Advances `i` past a separate value.
fn valued<'a>(tokens: &'a [String], i: &mut usize, flag: &str) -> Option<&'a str> {
    let token = tokens[*i].as_str();
    if token == flag {
        let next = tokens.get(*i + 1)?;
        *i += 1;
        return Some(next.as_str());
    }
    token.strip_prefix(flag)?.strip_prefix('=')
}

/// Pick the known flags out of a token list. Unknown tokens are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "--watch" => flags.watch = true,
            "--no-images" => flags.no_images = true,
            "--force-half-cell" => flags.force_half_cell = true,
            "--apply-stale" => flags.apply_stale = true,
            _ => {
                if let Some(value) = valued(tokens, &mut i, "--endpoint") {
                    flags.endpoint = Some(value.to_string());
                } else if let Some(value) = valued(tokens, &mut i, "--timeout") {
                    flags.timeout_secs = value.parse().ok();
                } else if let Some(value) = valued(tokens, &mut i, "--theme") {
                    flags.theme = ThemeMode::parse(value);
                } else if let Some(value) = valued(tokens, &mut i, "--debug-log") {
                    flags.debug_log = Some(PathBuf::from(value));
                } else if let Some(value) = valued(tokens, &mut i, "--icon-size") {
                    flags.icon_size = value.parse().ok();
                } else if let Some(value) = valued(tokens, &mut i, "--label-font") {
                    flags.label_font = Some(value.to_string());
                } else if let Some(value) = valued(tokens, &mut i, "--label-baseline") {
                    flags.label_baseline = LabelBaseline::parse(value);
                }
            }
        }
        i += 1;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let flags = parse_flag_tokens(&tokens(&[
            "stackview",
            "--watch",
            "--endpoint",
            "http://diagrams:5001/generate-diagram",
            "--timeout=30",
            "--no-images",
            "--theme",
            "dark",
            "--label-baseline=central",
            "--icon-size",
            "96",
            "stack.yaml",
        ]));
        assert!(flags.watch);
        assert!(flags.no_images);
        assert_eq!(
            flags.endpoint.as_deref(),
            Some("http://diagrams:5001/generate-diagram")
        );
        assert_eq!(flags.timeout_secs, Some(30));
        assert_eq!(flags.theme, Some(ThemeMode::Dark));
        assert_eq!(flags.label_baseline, Some(LabelBaseline::Central));
        assert_eq!(flags.icon_size, Some(96));
    }

    #[test]
    fn test_valued_flag_without_value_is_ignored() {
        let flags = parse_flag_tokens(&tokens(&["--endpoint"]));
        assert_eq!(flags.endpoint, None);
    }

    #[test]
    fn test_prefix_of_longer_flag_does_not_match() {
        let flags = parse_flag_tokens(&tokens(&["--timeouts=5"]));
        assert_eq!(flags.timeout_secs, None);
    }

    #[test]
    fn test_union_prefers_later_values_and_ors_booleans() {
        let file = ConfigFlags {
            watch: true,
            endpoint: Some("http://a/".to_string()),
            theme: Some(ThemeMode::Light),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            apply_stale: true,
            theme: Some(ThemeMode::Dark),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.apply_stale);
        assert_eq!(merged.endpoint.as_deref(), Some("http://a/"));
        assert_eq!(merged.theme, Some(ThemeMode::Dark));
    }

    #[test]
    fn test_renderer_config_applies_overrides() {
        let flags = ConfigFlags {
            icon_size: Some(64),
            label_font: Some("Menlo".to_string()),
            ..ConfigFlags::default()
        };
        let config = flags.renderer_config();
        assert_eq!(config.icon_size, 64);
        assert_eq!(config.label_font, "Menlo");
        assert_eq!(config.label_baseline, LabelBaseline::default());
        assert_eq!(config.label_font_size, 14);
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config");
        let flags = ConfigFlags {
            endpoint: Some("http://localhost:9000/render".to_string()),
            timeout_secs: Some(15),
            watch: true,
            no_images: true,
            force_half_cell: true,
            apply_stale: true,
            theme: Some(ThemeMode::Dark),
            debug_log: Some(PathBuf::from("debug.log")),
            icon_size: Some(64),
            label_font: Some("Menlo,monospace".to_string()),
            label_baseline: Some(LabelBaseline::Offset { em: 1.5 }),
        };

        save_config_flags(&path, &flags).unwrap();
        assert_eq!(load_config_flags(&path).unwrap(), flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(load_config_flags(&path).unwrap(), ConfigFlags::default());
    }

    #[test]
    fn test_label_font_with_spaces_survives_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        let flags = ConfigFlags {
            label_font: Some("Fira Code, monospace".to_string()),
            debug_log: Some(PathBuf::from("my logs/debug.log")),
            ..ConfigFlags::default()
        };

        save_config_flags(&path, &flags).unwrap();
        let saved = fs::read_to_string(&path).unwrap();
        assert!(saved.contains(r#"--label-font "Fira Code, monospace""#));
        assert_eq!(load_config_flags(&path).unwrap(), flags);
    }

    #[test]
    fn test_rc_file_accepts_quoted_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".stackviewrc");
        fs::write(
            &path,
            "--label-font=\"Fira Code\" --watch\n--debug-log \"a \\\"b\\\".log\"\n",
        )
        .unwrap();

        let flags = load_config_flags(&path).unwrap();
        assert_eq!(flags.label_font.as_deref(), Some("Fira Code"));
        assert!(flags.watch);
        assert_eq!(flags.debug_log, Some(PathBuf::from(r#"a "b".log"#)));
    }

    #[test]
    fn test_parse_label_baseline_rejects_unknown_mode() {
        assert_eq!(parse_label_baseline("offset:2"), Ok(LabelBaseline::Offset { em: 2.0 }));
        let err = parse_label_baseline("sideways").unwrap_err();
        assert!(err.contains("sideways"));
    }

    #[test]
    fn test_split_line_groups_quoted_words() {
        assert_eq!(
            split_line(r#"  --endpoint  http://x  --label-font "" --theme dark"#),
            tokens(&["--endpoint", "http://x", "--label-font", "", "--theme", "dark"])
        );
        assert_eq!(quoted("Menlo"), "Menlo");
        assert_eq!(quoted("Fira Code"), r#""Fira Code""#);
    }
}
