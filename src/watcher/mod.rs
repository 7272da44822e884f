//! Template file watching.
//!
//! Reports debounced changes to the open template so edits made in
//! another editor can be picked up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

/// Default quiet period before a change is reported.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one file and reports debounced change notifications.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
    muted_until: Option<Instant>,
}

impl FileWatcher {
    /// Watch `path`.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the containing
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Event paths from the OS are canonical.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        // Editors often save by rename, so watch the directory rather
        // than the file itself.
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        debug!(path = %target_path.display(), "watching template");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
            muted_until: None,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Ignore events caused by our own write that is about to happen.
    pub fn mute_own_write(&mut self) {
        self.pending_since = None;
        self.muted_until = Some(Instant::now() + self.debounce * 2);
    }

    /// Returns true once a debounced change is ready.
    pub fn take_change_ready(&mut self) -> bool {
        let now = Instant::now();
        let muted = self.muted_until.is_some_and(|until| now < until);
        if !muted {
            self.muted_until = None;
        }

        let mut relevant = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(ev) => {
                    trace!(kind = ?ev.kind, paths = ?ev.paths, "ignoring unrelated file event");
                }
                Err(err) => warn!(error = %err, "file watcher error"),
            }
        }

        if relevant > 0 {
            if muted {
                trace!(relevant, "ignoring events from our own save");
            } else {
                self.pending_since = Some(now);
            }
        }

        match self.pending_since {
            Some(since) if since.elapsed() >= self.debounce => {
                self.pending_since = None;
                debug!(path = %self.target_path.display(), "template changed on disk");
                true
            }
            _ => false,
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
