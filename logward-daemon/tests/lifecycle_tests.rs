//! End-to-end manager lifecycle against a real log directory: start-up
//! maintenance, hot reload and shutdown.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use logward_core::{retention, InitialDelay, LevelSetting, LogSettings};
use logward_daemon::{LogManager, ManagerOptions, ReloaderOptions};
use logward_sinks::{SinkConfigurator, SinkError};

#[derive(Default)]
struct Recorder(Mutex<Vec<LogSettings>>);

impl SinkConfigurator for Recorder {
    fn apply(&self, settings: &LogSettings) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(settings.clone());
        Ok(())
    }
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    done()
}

fn write_config(dir: &Path, logs: &Path, extra: &str) -> std::path::PathBuf {
    let path = dir.join("logging.yaml");
    fs::write(
        &path,
        format!(
            "log:\n  console: false\n  file:\n    path: {}\n    maxHistory: 7\n{extra}",
            logs.display()
        ),
    )
    .unwrap();
    path
}

fn options(initial_delay: InitialDelay) -> ManagerOptions {
    ManagerOptions {
        initial_delay: Some(initial_delay),
        reloader: ReloaderOptions {
            settle_delay: Duration::from_millis(50),
            debounce_window: Duration::from_millis(50),
        },
        ..ManagerOptions::default()
    }
}

#[test]
fn startup_run_archives_yesterday_and_prunes() {
    let config_dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let today = Local::now().date_naive();
    let yesterday = retention::archive_target(today);
    let expired = retention::bundle_name(&retention::format_date(
        today - chrono::Days::new(30),
    ));

    fs::write(logs.path().join("application.log"), "live\n").unwrap();
    fs::write(
        logs.path().join(format!("application.log.{yesterday}")),
        "yesterday\n",
    )
    .unwrap();
    fs::write(logs.path().join(&expired), "old bundle").unwrap();

    let config = write_config(config_dir.path(), logs.path(), "");
    let manager = LogManager::from_file(
        &config,
        Arc::new(Recorder::default()),
        options(InitialDelay::Immediate),
    )
    .unwrap();

    let bundle = logs.path().join(retention::bundle_name(&yesterday));
    assert!(wait_until(Duration::from_secs(10), || {
        bundle.exists() && !logs.path().join(&expired).exists()
    }));
    manager.shutdown();

    let mut archive = zip::ZipArchive::new(fs::File::open(&bundle).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(
        archive.by_index(0).unwrap().name(),
        format!("application.log.{yesterday}")
    );
    assert!(logs.path().join("application.log").exists());
}

#[test]
fn edited_config_is_reapplied() {
    let config_dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let config = write_config(config_dir.path(), logs.path(), "  level: INFO\n");
    let recorder = Arc::new(Recorder::default());

    let manager = LogManager::from_file(
        &config,
        recorder.clone(),
        options(InitialDelay::Fixed(Duration::from_secs(3600))),
    )
    .unwrap();
    assert_eq!(manager.settings().get("log.file.maxHistory"), Some("7"));

    write_config(config_dir.path(), logs.path(), "  level: DEBUG\n");
    assert!(wait_until(Duration::from_secs(10), || {
        manager.log_settings().level == LevelSetting::Debug
    }));

    // A broken edit is ignored; the previous snapshot stays.
    fs::write(&config, "log: [unclosed\n").unwrap();
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(manager.log_settings().level, LevelSetting::Debug);
    assert!(recorder
        .0
        .lock()
        .unwrap()
        .iter()
        .all(|applied| applied.max_history_days == 7));

    manager.shutdown();
}
