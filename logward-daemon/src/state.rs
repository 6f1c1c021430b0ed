//! The settings currently in effect, shared by the manager, the scheduler
//! and the config watch loop.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use logward_core::{LogSettings, Settings};
use logward_sinks::SinkConfigurator;

use crate::error::DaemonError;

/// A settings snapshot and its typed view. Always replaced together.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub settings: Settings,
    pub log_settings: LogSettings,
}

pub struct ConfigState {
    configurator: Arc<dyn SinkConfigurator>,
    snapshot: RwLock<Snapshot>,
    apply_lock: Mutex<()>,
}

impl ConfigState {
    /// Starts from default settings; nothing is applied until [`apply`].
    ///
    /// [`apply`]: ConfigState::apply
    pub fn new(configurator: Arc<dyn SinkConfigurator>) -> Self {
        Self {
            configurator,
            snapshot: RwLock::new(Snapshot::default()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Validate `settings`, reconfigure the sinks and make it the current
    /// snapshot. On any failure the previous snapshot stays in effect.
    ///
    /// Concurrent callers are serialised: sinks and snapshot always change
    /// together.
    pub fn apply(&self, settings: Settings) -> Result<LogSettings, DaemonError> {
        let log_settings = LogSettings::from_settings(&settings)?;

        let _guard = lock(&self.apply_lock);
        self.configurator.apply(&log_settings)?;
        let mut snapshot = match self.snapshot.write() {
            Ok(snapshot) => snapshot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *snapshot = Snapshot {
            settings,
            log_settings: log_settings.clone(),
        };
        Ok(log_settings)
    }

    pub fn snapshot(&self) -> Snapshot {
        match self.snapshot.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn settings(&self) -> Settings {
        self.snapshot().settings
    }

    pub fn log_settings(&self) -> LogSettings {
        self.snapshot().log_settings
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
