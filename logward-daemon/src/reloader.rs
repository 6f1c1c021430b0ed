//! Config watch loop: re-read the settings file whenever it changes and
//! re-apply it wholesale.
//!
//! notify watcher (parent directory, non-recursive) → unbounded channel →
//! loop on a dedicated single-worker runtime → debounce → settle delay →
//! reload on the blocking pool. Dropping the watcher closes the channel and
//! the shutdown signal stops the loop; either ends it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use logward_core::{LogSettings, Settings};

use crate::error::DaemonError;
use crate::paths::{
    canonical_config_path, watch_dir, CONFIG_WATCH_THREAD, DEBOUNCE_WINDOW, SETTLE_DELAY,
    SHUTDOWN_TIMEOUT,
};
use crate::state::{lock, ConfigState};
use crate::worker::{may_block, shutdown_worker, worker_runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloaderOptions {
    /// Wait after an admitted change before re-reading the file.
    pub settle_delay: Duration,
    /// Changes within this window of an admitted one are dropped.
    pub debounce_window: Duration,
}

impl Default for ReloaderOptions {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            debounce_window: DEBOUNCE_WINDOW,
        }
    }
}

enum WatchState {
    Stopped,
    Watching(WatchSession),
}

struct WatchSession {
    watcher: RecommendedWatcher,
    shutdown: watch::Sender<bool>,
    runtime: Runtime,
    task: JoinHandle<()>,
}

pub struct ConfigReloader {
    path: PathBuf,
    state: Arc<ConfigState>,
    options: ReloaderOptions,
    watch: Mutex<WatchState>,
}

impl ConfigReloader {
    /// Fails with [`DaemonError::ConfigMissing`] if `path` is not an existing
    /// file. Does not start watching.
    pub fn new(
        path: &Path,
        state: Arc<ConfigState>,
        options: ReloaderOptions,
    ) -> Result<Self, DaemonError> {
        if !path.is_file() {
            return Err(DaemonError::ConfigMissing {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: canonical_config_path(path),
            state,
            options,
            watch: Mutex::new(WatchState::Stopped),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_watching(&self) -> bool {
        matches!(*lock(&self.watch), WatchState::Watching(_))
    }

    /// Begin watching. A no-op when already watching.
    pub fn start(&self) -> Result<(), DaemonError> {
        let mut watch = lock(&self.watch);
        if matches!(*watch, WatchState::Watching(_)) {
            tracing::debug!(path = %self.path.display(), "config watch already running");
            return Ok(());
        }

        let runtime = worker_runtime(CONFIG_WATCH_THREAD)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;
        let dir = watch_dir(&self.path);
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = runtime.spawn(watch_loop(
            self.path.clone(),
            Arc::clone(&self.state),
            self.options,
            event_rx,
            shutdown_rx,
        ));

        *watch = WatchState::Watching(WatchSession {
            watcher,
            shutdown,
            runtime,
            task,
        });
        tracing::info!(path = %self.path.display(), "config watch started");
        Ok(())
    }

    /// Stop watching. A no-op when already stopped. Inside an async context
    /// the loop is signalled but not waited for.
    pub fn stop(&self) {
        let session = match std::mem::replace(&mut *lock(&self.watch), WatchState::Stopped) {
            WatchState::Watching(session) => session,
            WatchState::Stopped => return,
        };
        let WatchSession {
            watcher,
            shutdown,
            runtime,
            task,
        } = session;

        drop(watcher);
        let _ = shutdown.send(true);
        if may_block() {
            let _ = runtime.block_on(async { tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await });
        }
        shutdown_worker(runtime, SHUTDOWN_TIMEOUT);
        tracing::debug!(path = %self.path.display(), "config watch stopped");
    }

    /// Settle, then reload immediately, whatever the watch state.
    pub fn force_reload(&self) -> Result<LogSettings, DaemonError> {
        std::thread::sleep(self.options.settle_delay);
        reload(&self.path, &self.state)
    }
}

impl Drop for ConfigReloader {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read `path` and apply it. The previous snapshot stays in effect on any
/// failure.
pub(crate) fn reload(path: &Path, state: &ConfigState) -> Result<LogSettings, DaemonError> {
    let settings = Settings::load(path)?;
    let log_settings = state.apply(settings)?;
    tracing::info!(
        path = %path.display(),
        level = %log_settings.level,
        "log configuration reloaded",
    );
    Ok(log_settings)
}

async fn watch_loop(
    path: PathBuf,
    state: Arc<ConfigState>,
    options: ReloaderOptions,
    mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut debouncer = Debouncer::new(options.debounce_window);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "config watcher event error");
                        continue;
                    }
                };
                if !is_config_change(&event, &path) {
                    continue;
                }
                if !debouncer.admit(Instant::now()) {
                    continue;
                }

                tokio::time::sleep(options.settle_delay).await;
                while events.try_recv().is_ok() {}

                let reload_path = path.clone();
                let reload_state = Arc::clone(&state);
                match tokio::task::spawn_blocking(move || reload(&reload_path, &reload_state)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "config reload failed; keeping previous settings",
                    ),
                    Err(err) => tracing::error!(error = %err, "config reload task failed"),
                }
            }
        }
    }

    tracing::info!(path = %path.display(), "config watch loop terminated");
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn is_config_change(event: &Event, config: &Path) -> bool {
    if event.need_rescan() || !is_relevant_event_kind(&event.kind) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|path| path == config || canonical_config_path(path) == config)
}

/// Admits an event unless one was admitted less than `window` ago.
struct Debouncer {
    window: Duration,
    last_admitted: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: None,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        match self.last_admitted {
            Some(last) if now.duration_since(last) < self.window => false,
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }
}
