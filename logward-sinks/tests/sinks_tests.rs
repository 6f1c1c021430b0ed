//! Applying settings to a live subscriber: file output, level reloads and
//! failed applies.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use logward_core::{EmailSettings, EmailTrigger, FileSinkSettings, LevelSetting, LogSettings};
use logward_sinks::{MailMessage, MailTransport, SinkConfigurator, SinkError, TracingSinks};

fn file_settings(dir: &Path, level: LevelSetting) -> LogSettings {
    LogSettings {
        level,
        console: false,
        file: Some(FileSinkSettings {
            directory: dir.to_path_buf(),
            file_name: "application.log".to_string(),
            max_size: None,
        }),
        log_dir: dir.to_path_buf(),
        ..LogSettings::default()
    }
}

fn no_sinks() -> LogSettings {
    LogSettings {
        console: false,
        file: None,
        ..LogSettings::default()
    }
}

/// Concatenated contents of every `application.log.*` file in `dir`.
fn written(dir: &Path) -> String {
    let mut out = String::new();
    for entry in fs::read_dir(dir).expect("read_dir") {
        let path = entry.expect("entry").path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        if name.starts_with("application.log") {
            out.push_str(&fs::read_to_string(&path).expect("read"));
        }
    }
    out
}

#[test]
fn file_sink_writes_a_dated_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logs = dir.path().join("logs");
    let (sinks, subscriber) = TracingSinks::new();

    tracing::subscriber::with_default(subscriber, || {
        sinks.apply(&file_settings(&logs, LevelSetting::Info)).expect("apply");
        tracing::info!("hello from the file sink");
        // Swapping the file sink out flushes it.
        sinks.apply(&no_sinks()).expect("apply");
    });

    let names: Vec<_> = fs::read_dir(&logs)
        .expect("log dir created")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names.len(), 1, "{names:?}");
    assert!(names[0].starts_with("application.log."), "{names:?}");
    assert!(written(&logs).contains("hello from the file sink"));
}

#[test]
fn level_changes_take_effect_on_apply() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (sinks, subscriber) = TracingSinks::new();

    tracing::subscriber::with_default(subscriber, || {
        sinks
            .apply(&file_settings(dir.path(), LevelSetting::Warn))
            .expect("apply");
        tracing::info!("suppressed while at warn");
        tracing::warn!("kept while at warn");

        sinks
            .apply(&file_settings(dir.path(), LevelSetting::Info))
            .expect("apply");
        tracing::info!("kept after lowering the level");
        sinks.apply(&no_sinks()).expect("apply");
    });

    let text = written(dir.path());
    assert!(!text.contains("suppressed while at warn"));
    assert!(text.contains("kept while at warn"));
    assert!(text.contains("kept after lowering the level"));
}

#[test]
fn target_override_raises_one_target_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = file_settings(dir.path(), LevelSetting::Info);
    settings
        .target_levels
        .insert("noisy".to_string(), LevelSetting::Error);
    let (sinks, subscriber) = TracingSinks::new();

    tracing::subscriber::with_default(subscriber, || {
        sinks.apply(&settings).expect("apply");
        tracing::info!(target: "noisy", "noisy chatter");
        tracing::info!(target: "quiet", "quiet progress");
        sinks.apply(&no_sinks()).expect("apply");
    });

    let text = written(dir.path());
    assert!(!text.contains("noisy chatter"));
    assert!(text.contains("quiet progress"));
}

#[derive(Default)]
struct Recorder(Mutex<Vec<MailMessage>>);

impl MailTransport for Recorder {
    fn send(&self, message: &MailMessage) -> Result<(), SinkError> {
        self.0.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[test]
fn failed_apply_keeps_previous_sinks() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = file_settings(dir.path(), LevelSetting::Info);
    let mut bad = good.clone();
    bad.email = Some(EmailSettings {
        host: "localhost".into(),
        port: 25,
        username: None,
        password: None,
        starttls: false,
        from: "definitely not an address".into(),
        to: vec!["ops@example.com".into()],
        subject: "errors".into(),
        level: LevelSetting::Error,
        trigger: EmailTrigger::Level,
        buffer_size: 16,
    });

    let (sinks, subscriber) = TracingSinks::new();
    let sinks = sinks.with_mail_transport(Arc::new(Recorder::default()));

    tracing::subscriber::with_default(subscriber, || {
        sinks.apply(&good).expect("apply");
        let err = sinks.apply(&bad).unwrap_err();
        assert!(matches!(err, SinkError::Address { .. }), "got: {err}");
        tracing::info!("still logging to the old file");
        sinks.apply(&no_sinks()).expect("apply");
    });

    assert!(written(dir.path()).contains("still logging to the old file"));
}

#[test]
fn file_sink_rolls_over_by_size_and_keeps_the_date() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut settings = file_settings(dir.path(), LevelSetting::Info);
    if let Some(file) = settings.file.as_mut() {
        file.max_size = Some(256);
    }
    let (sinks, subscriber) = TracingSinks::new();

    tracing::subscriber::with_default(subscriber, || {
        sinks.apply(&settings).expect("apply");
        for n in 0..20 {
            tracing::info!(n, "filling the live file past its size limit");
        }
        sinks.apply(&no_sinks()).expect("apply");
    });

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let names: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert!(names.len() > 1, "{names:?}");
    assert!(names.iter().all(|name| name.contains(&today)), "{names:?}");
    assert!(names.contains(&format!("application.log.{today}.1")), "{names:?}");
    assert_eq!(written(dir.path()).matches("filling the live file").count(), 20);
}
