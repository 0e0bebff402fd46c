//! Settings file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::host::HostSettings;
use crate::config::loader::{load_settings, LoadError};

/// Watches a settings file and pushes its namespaces into [`HostSettings`].
///
/// Every namespace whose content changed produces a change event, so connected
/// resolvers drop their caches.
pub struct SettingsWatcher {
    path: PathBuf,
    host: HostSettings,
}

impl SettingsWatcher {
    pub fn new(path: &Path, host: HostSettings) -> Self {
        Self {
            path: path.to_path_buf(),
            host,
        }
    }

    /// Load the file once into the host settings.
    pub fn load(&self) -> Result<(), LoadError> {
        let namespaces = load_settings(&self.path)?;
        self.host.replace_all(namespaces);
        Ok(())
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let host = self.host.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Settings file change detected, reloading");
                        match load_settings(&path) {
                            Ok(namespaces) => host.replace_all(namespaces),
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload settings. Keeping current settings.");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Settings watcher started");
        Ok(watcher)
    }
}
