//! [`LogManager`]: applies settings at start-up and owns the maintenance
//! scheduler and the config watch loop for one log directory tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use logward_core::{InitialDelay, LogSettings, Settings};
use logward_sinks::SinkConfigurator;

use crate::error::DaemonError;
use crate::paths::MAINTENANCE_PERIOD;
use crate::reloader::{self, ConfigReloader, ReloaderOptions};
use crate::scheduler::{self, initial_delay_for, MaintenanceReport, MaintenanceScheduler};
use crate::state::ConfigState;

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Overrides `log.maintenance.initialDelay` when set.
    pub initial_delay: Option<InitialDelay>,
    pub maintenance_period: Duration,
    pub reloader: ReloaderOptions,
    /// Watch the config file of a file-backed manager for changes.
    pub watch_config: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            initial_delay: None,
            maintenance_period: MAINTENANCE_PERIOD,
            reloader: ReloaderOptions::default(),
            watch_config: true,
        }
    }
}

pub struct LogManager {
    state: Arc<ConfigState>,
    config_path: Option<PathBuf>,
    settle_delay: Duration,
    scheduler: Option<MaintenanceScheduler>,
    reloader: Option<ConfigReloader>,
}

impl LogManager {
    /// Manager over an in-memory settings snapshot. Never watches anything.
    pub fn from_settings(
        settings: Settings,
        configurator: Arc<dyn SinkConfigurator>,
        options: ManagerOptions,
    ) -> Result<Self, DaemonError> {
        Self::start(settings, None, configurator, options)
    }

    /// Manager backed by a settings file. A file that cannot be loaded
    /// leaves the manager on default settings.
    pub fn from_file(
        path: &Path,
        configurator: Arc<dyn SinkConfigurator>,
        options: ManagerOptions,
    ) -> Result<Self, DaemonError> {
        let settings = match Settings::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "log settings could not be loaded; using defaults",
                );
                Settings::new()
            }
        };
        Self::start(settings, Some(path), configurator, options)
    }

    fn start(
        settings: Settings,
        config_path: Option<&Path>,
        configurator: Arc<dyn SinkConfigurator>,
        options: ManagerOptions,
    ) -> Result<Self, DaemonError> {
        let state = Arc::new(ConfigState::new(configurator));
        if let Err(err) = state.apply(settings) {
            tracing::warn!(error = %err, "invalid log settings; using defaults");
            state.apply(Settings::new())?;
        }

        let delay = options
            .initial_delay
            .unwrap_or(state.log_settings().initial_delay);
        let scheduler = MaintenanceScheduler::start(
            Arc::clone(&state),
            initial_delay_for(delay, Local::now().naive_local()),
            options.maintenance_period,
        )?;

        let reloader = match config_path {
            Some(path) if options.watch_config => {
                match ConfigReloader::new(path, Arc::clone(&state), options.reloader) {
                    Ok(reloader) => {
                        reloader.start()?;
                        Some(reloader)
                    }
                    Err(DaemonError::ConfigMissing { path }) => {
                        tracing::warn!(
                            path = %path.display(),
                            "config file missing; changes will not be picked up",
                        );
                        None
                    }
                    Err(err) => return Err(err),
                }
            }
            _ => None,
        };

        tracing::info!(
            config = %config_path.map(|p| p.display().to_string()).unwrap_or_default(),
            log_dir = %state.log_settings().log_dir.display(),
            watching = reloader.is_some(),
            "log manager started",
        );

        Ok(Self {
            state,
            config_path: config_path.map(Path::to_path_buf),
            settle_delay: options.reloader.settle_delay,
            scheduler: Some(scheduler),
            reloader,
        })
    }

    /// The settings snapshot currently in effect.
    pub fn settings(&self) -> Settings {
        self.state.settings()
    }

    pub fn log_settings(&self) -> LogSettings {
        self.state.log_settings()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.reloader
            .as_ref()
            .map(ConfigReloader::is_watching)
            .unwrap_or(false)
    }

    /// Run archive + prune now, on the calling thread.
    pub fn run_maintenance_now(&self) -> MaintenanceReport {
        scheduler::run_once(&self.state)
    }

    /// Re-read the config file now.
    pub fn force_reload(&self) -> Result<LogSettings, DaemonError> {
        match &self.reloader {
            Some(reloader) => reloader.force_reload(),
            None => {
                let path = self.config_path.as_deref().ok_or(DaemonError::NotFileBacked)?;
                std::thread::sleep(self.settle_delay);
                reloader::reload(path, &self.state)
            }
        }
    }

    /// Stop both workers. Inside an async context in-flight work is not
    /// waited for.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        if let Some(reloader) = self.reloader.take() {
            reloader.stop();
        }
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
            tracing::info!("log manager stopped");
        }
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::RecordingConfigurator;
    use logward_core::LevelSetting;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn quiet() -> ManagerOptions {
        ManagerOptions {
            initial_delay: Some(InitialDelay::Fixed(Duration::from_secs(3600))),
            reloader: ReloaderOptions {
                settle_delay: Duration::from_millis(50),
                debounce_window: Duration::from_millis(50),
            },
            ..ManagerOptions::default()
        }
    }

    #[test]
    fn construction_applies_settings() {
        let recorder = Arc::new(RecordingConfigurator::default());
        let manager = LogManager::from_settings(
            Settings::new().with("log.level", "DEBUG"),
            recorder.clone(),
            quiet(),
        )
        .unwrap();

        assert_eq!(recorder.count(), 1);
        assert_eq!(recorder.last().unwrap().level, LevelSetting::Debug);
        assert_eq!(manager.log_settings().level, LevelSetting::Debug);
        assert!(!manager.is_watching());
        manager.shutdown();
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let recorder = Arc::new(RecordingConfigurator::default());
        let manager = LogManager::from_settings(
            Settings::new().with("log.file.maxHistory", "a while"),
            recorder.clone(),
            quiet(),
        )
        .unwrap();

        assert!(manager.settings().is_empty());
        assert_eq!(manager.log_settings(), LogSettings::default());
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(RecordingConfigurator::default());
        let manager =
            LogManager::from_file(&dir.path().join("absent.yaml"), recorder.clone(), quiet())
                .unwrap();

        assert!(manager.settings().is_empty());
        assert!(!manager.is_watching());
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn in_memory_manager_cannot_force_reload() {
        let manager = LogManager::from_settings(
            Settings::new(),
            Arc::new(RecordingConfigurator::default()),
            quiet(),
        )
        .unwrap();
        assert!(matches!(
            manager.force_reload(),
            Err(DaemonError::NotFileBacked)
        ));
    }

    #[test]
    fn file_change_is_applied_after_settle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logging.properties");
        fs::write(&path, "log.level=INFO\n").unwrap();
        let recorder = Arc::new(RecordingConfigurator::default());
        let manager = LogManager::from_file(&path, recorder.clone(), quiet()).unwrap();
        assert!(manager.is_watching());

        fs::write(&path, "log.level=ERROR\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while manager.log_settings().level != LevelSetting::Error && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(25));
        }
        assert_eq!(manager.log_settings().level, LevelSetting::Error);
        assert_eq!(recorder.last().unwrap().level, LevelSetting::Error);
        manager.shutdown();
    }

    #[tokio::test]
    async fn dropping_inside_async_context_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logging.properties");
        fs::write(&path, "log.level=INFO\n").unwrap();

        let watched =
            LogManager::from_file(&path, Arc::new(RecordingConfigurator::default()), quiet())
                .unwrap();
        assert!(watched.is_watching());
        drop(watched);

        let in_memory = LogManager::from_settings(
            Settings::new(),
            Arc::new(RecordingConfigurator::default()),
            quiet(),
        )
        .unwrap();
        in_memory.shutdown();
    }

    #[test]
    fn run_maintenance_now_uses_current_settings() {
        let logs = TempDir::new().unwrap();
        let yesterday = logward_core::retention::archive_target(Local::now().date_naive());
        fs::write(logs.path().join(format!("app.log.{yesterday}")), "old\n").unwrap();
        let settings = Settings::new().with("log.file.path", logs.path().display().to_string());

        let manager = LogManager::from_settings(
            settings,
            Arc::new(RecordingConfigurator::default()),
            quiet(),
        )
        .unwrap();
        let report = manager.run_maintenance_now();

        assert_eq!(report.files_archived, 1);
        assert!(logs.path().join(format!("logs-{yesterday}.zip")).exists());
    }
}
