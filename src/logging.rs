//! Tracing subscriber setup.
//!
//! The full-screen editor owns the terminal, so it only logs when asked to,
//! and then to a file. Headless runs log to stderr.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard error, `WARN` and above unless `RUST_LOG` says otherwise.
    Stderr,
    /// Append to a file at `DEBUG` and above.
    File(PathBuf),
    /// Nothing, unless `RUST_LOG` is set.
    Silent,
}

impl LogTarget {
    /// Pick a target for the run mode.
    pub fn select(headless: bool, debug_log: Option<&Path>) -> Self {
        match (debug_log, headless) {
            (Some(path), _) => Self::File(path.to_path_buf()),
            (None, true) => Self::Stderr,
            (None, false) => Self::Silent,
        }
    }
}

fn filter(default: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(target: &LogTarget) -> Result<()> {
    let installed = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter(Level::WARN))
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open debug log {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter(Level::DEBUG))
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        LogTarget::Silent => {
            if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
                return Ok(());
            }
            tracing_subscriber::fmt()
                .with_env_filter(filter(Level::WARN))
                .with_writer(std::io::stderr)
                .try_init()
        }
    };

    if let Err(err) = installed {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_prefers_debug_log_file() {
        let path = Path::new("/tmp/stackview.log");
        assert_eq!(
            LogTarget::select(false, Some(path)),
            LogTarget::File(path.to_path_buf())
        );
        assert_eq!(
            LogTarget::select(true, Some(path)),
            LogTarget::File(path.to_path_buf())
        );
    }

    #[test]
    fn test_select_by_mode() {
        assert_eq!(LogTarget::select(true, None), LogTarget::Stderr);
        assert_eq!(LogTarget::select(false, None), LogTarget::Silent);
    }

    #[test]
    fn test_init_file_target_creates_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        init(&LogTarget::File(path.clone())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_init_file_target_reports_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("debug.log");
        assert!(init(&LogTarget::File(path)).is_err());
    }
}
