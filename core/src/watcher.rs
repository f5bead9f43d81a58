//! Change notification for the backing config file.
//!
//! The watcher only schedules: it forwards filesystem events onto a
//! channel and the service task performs the actual reload, so all store
//! mutation stays on the single writer task.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::ConfigError;

/// Event delivered for the watched config file.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The file was written, created, or renamed into place.
    Changed,
    /// The watcher backend reported an error.
    Error(String),
}

/// Watches the config file's parent directory for changes to the file.
///
/// The directory is watched rather than the file itself so create and
/// rename-in-place are still seen after an editor replaces the file.
/// Events for other paths in the directory are filtered out. No coalescing
/// happens beyond what the OS facility provides.
pub struct ConfigWatcher {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
    // Kept alive for the lifetime of this value; dropping it stops events.
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new(config_path: &Path) -> Result<Self, ConfigError> {
        let dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name: Option<OsString> = config_path.file_name().map(OsString::from);
        let (tx, rx) = mpsc::unbounded_channel();

        let watch_error = |source| ConfigError::Watch {
            path: config_path.to_path_buf(),
            source,
        };

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx.send(WatchEvent::Error(e.to_string()));
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                let ours = match &file_name {
                    Some(name) => event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(name.as_os_str())),
                    None => true,
                };
                if ours {
                    let _ = tx.send(WatchEvent::Changed);
                }
            })
            .map_err(watch_error)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }

    /// Next change event; `None` once the watcher backend shuts down.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }
}
