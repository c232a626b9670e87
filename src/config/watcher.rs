//! Config file watching for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save through a rename keep triggering reloads. Events for other files
//! are ignored, and a reload whose file content matches the last accepted
//! version is not forwarded.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::WafConfig;

/// Watches one config file and sends every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<WafConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver that reloaded configs arrive on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<WafConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must outlive the wanted updates.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let directory = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let reloader = Reloader::new(path.clone(), std::fs::read_to_string(&path).ok());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &reloader.path) => match reloader.reload() {
                    Ok(Some(config)) => {
                        tracing::info!(path = ?reloader.path, "Config file changed, reloading");
                        let _ = update_tx.send(config);
                    }
                    Ok(None) => tracing::trace!(path = ?reloader.path, "Config content unchanged"),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current configuration")
                    }
                },
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` writes to or replaces the file at `path`.
fn touches(event: &Event, path: &Path) -> bool {
    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == path.file_name())
}

/// Loads the file and remembers the last accepted content.
struct Reloader {
    path: PathBuf,
    last: Mutex<Option<String>>,
}

impl Reloader {
    fn new(path: PathBuf, initial: Option<String>) -> Self {
        Self {
            path,
            last: Mutex::new(initial),
        }
    }

    /// `Ok(None)` when the content matches the last accepted version.
    fn reload(&self) -> Result<Option<WafConfig>, ConfigError> {
        let content = std::fs::read_to_string(&self.path).map_err(ConfigError::Io)?;
        let mut last = self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if last.as_deref() == Some(content.as_str()) {
            return Ok(None);
        }
        let config = parse_config(&content)?;
        *last = Some(content);
        Ok(Some(config))
    }
}
