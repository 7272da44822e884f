//! Stackview - edit a CloudFormation template and see its diagram.
//!
//! # Usage
//!
//! ```bash
//! stackview template.yaml
//! stackview --watch --endpoint http://diagrams:5001/generate-diagram stack.yaml
//! stackview stack.yaml --render-to stack.svg
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use stackview::app::App;
use stackview::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, parse_label_baseline, save_config_flags,
};
use stackview::diagram::LabelBaseline;
use stackview::highlight::{HighlightBackground, set_background_mode};
use stackview::logging::{self, LogTarget};
use stackview::submit::DEFAULT_ENDPOINT;

/// Edit a CloudFormation template and render it as an architecture diagram
#[derive(Parser, Debug)]
#[command(name = "stackview", version, about, long_about = None)]
struct Cli {
    /// Template to edit; created on first save if missing
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Diagram-generation endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Give up on a request after this many seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Watch the file for changes and reload when the buffer is clean
    #[arg(short, long)]
    watch: bool,

    /// Never draw the diagram as an image (show a summary instead)
    #[arg(long)]
    no_images: bool,

    /// Force image rendering to use half-cell fallback mode
    #[arg(long)]
    force_half_cell: bool,

    /// Force syntax highlight theme background (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Write debug logs to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Width and height of node icons in the displayed diagram
    #[arg(long, value_name = "PX")]
    icon_size: Option<u32>,

    /// Font family for node and edge labels
    #[arg(long, value_name = "FAMILY")]
    label_font: Option<String>,

    /// Node label placement: central, offset, or offset:<em>
    #[arg(long, value_name = "MODE", value_parser = parse_label_baseline)]
    label_baseline: Option<LabelBaseline>,

    /// Apply every response as it arrives, even when a newer one already did
    #[arg(long)]
    apply_stale: bool,

    /// Submit FILE once, write the sanitized SVG to PATH, and exit
    #[arg(long, value_name = "PATH")]
    render_to: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    let headless = cli.render_to.is_some();
    if let Err(err) = logging::init(&LogTarget::select(headless, effective.debug_log.as_deref())) {
        eprintln!("[warn] {err:#}");
    }
    debug!(?effective, "effective flags");

    match effective.theme.unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => set_background_mode(None),
        ThemeMode::Light => set_background_mode(Some(HighlightBackground::Light)),
        ThemeMode::Dark => set_background_mode(Some(HighlightBackground::Dark)),
    }

    let endpoint = effective
        .endpoint
        .clone()
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let mut app = App::new(cli.file)
        .with_endpoint(endpoint)
        .with_timeout(effective.timeout_secs.map(Duration::from_secs))
        .with_watch(effective.watch)
        .with_images_enabled(!effective.no_images)
        .with_force_half_cell(effective.force_half_cell)
        .with_apply_stale(effective.apply_stale)
        .with_renderer_config(effective.renderer_config())
        .with_config_paths(
            global_path,
            local_path.exists().then_some(local_path.clone()),
        );

    if let Some(out) = cli.render_to {
        return app.render_to_file(&out);
    }

    app.run().context("Application error")
}
