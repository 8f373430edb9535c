//! Settings file watcher for hot reload.
//!
//! # Responsibilities
//! - Watch the directory holding the settings file, so a save that
//!   replaces the file (write temp, rename over) keeps being observed
//! - Coalesce bursts of events into one reload
//! - Push only settings that differ from the last ones pushed

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_settings;
use crate::config::schema::AppSettings;

/// Quiet period after the last event before reloading.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// A watcher that monitors the settings file for changes.
pub struct SettingsWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AppSettings>,
}

impl SettingsWatcher {
    /// Create a new SettingsWatcher.
    ///
    /// Returns the watcher and a receiver for settings updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppSettings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in the background. The returned watcher must be kept
    /// alive for as long as updates are wanted; dropping it also stops the
    /// reload thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self.path.file_name().map(OsString::from).ok_or_else(|| {
            notify::Error::generic(&format!("{} does not name a file", self.path.display()))
        })?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = std_mpsc::channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        let tx = self.update_tx;
        thread::spawn(move || reload_loop(&path, event_rx, tx));

        tracing::info!(path = ?self.path, dir = ?dir, "Settings watcher started");
        Ok(watcher)
    }
}

fn reload_loop(
    path: &Path,
    events: std_mpsc::Receiver<()>,
    tx: mpsc::UnboundedSender<AppSettings>,
) {
    let mut last = load_settings(path).ok();

    // Ends once the notify watcher, and with it the sender, is dropped.
    while events.recv().is_ok() {
        while events.recv_timeout(DEBOUNCE).is_ok() {}

        match load_settings(path) {
            Ok(next) if last.as_ref() == Some(&next) => {
                tracing::debug!("Settings file touched without changes");
            }
            Ok(next) => {
                tracing::info!("Settings file change detected, reloading");
                last = Some(next.clone());
                if tx.send(next).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to reload settings: {}. Keeping current settings.", e);
            }
        }
    }
}
