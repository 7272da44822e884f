use tracing::{debug, warn};

use crate::app::{App, Message, Model, ToastLevel};
use crate::watcher::{DEFAULT_DEBOUNCE, FileWatcher};

impl App {
    /// Watch the template file. `Ok(None)` when there is no file.
    pub(super) fn make_file_watcher(&self) -> notify::Result<Option<FileWatcher>> {
        self.file_path
            .as_ref()
            .map(|path| FileWatcher::new(path, DEFAULT_DEBOUNCE))
            .transpose()
    }

    pub(super) fn handle_message_side_effects(
        &self,
        model: &mut Model,
        file_watcher: &mut Option<FileWatcher>,
        msg: &Message,
    ) {
        match msg {
            Message::Submit => {
                let generation = model.controller.submit();
                debug!(generation, "submission issued");
                model.show_toast(ToastLevel::Info, "Generating diagram...");
            }
            Message::EditorSave => self.save(model, file_watcher),
            Message::FileChanged => {
                if model.editor_is_dirty() {
                    model.show_toast(
                        ToastLevel::Warning,
                        "Template changed on disk; keeping unsaved edits (Ctrl+S overwrites)",
                    );
                } else if let Err(err) = model.reload_from_disk() {
                    warn!(error = %format!("{err:#}"), "reload failed");
                    model.show_toast(ToastLevel::Error, format!("Reload failed: {err:#}"));
                } else {
                    model.show_toast(ToastLevel::Info, "Reloaded from disk");
                }
            }
            _ => {}
        }
    }

    fn save(&self, model: &mut Model, file_watcher: &mut Option<FileWatcher>) {
        if let Some(watcher) = file_watcher.as_mut() {
            watcher.mute_own_write();
        }
        match model.save_to_disk() {
            Ok(path) => {
                model.show_toast(ToastLevel::Info, format!("Saved {}", path.display()));
                // The directory may only exist now that the file was created.
                if model.watch_enabled && file_watcher.is_none() {
                    match self.make_file_watcher() {
                        Ok(watcher) => *file_watcher = watcher,
                        Err(err) => warn!(error = %err, "could not start watching after save"),
                    }
                }
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "save failed");
                model.show_toast(ToastLevel::Error, format!("Save failed: {err:#}"));
            }
        }
    }
}
