//! Daily log maintenance: archive yesterday's files, then prune bundles
//! that fell out of the retention window.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use logward_archive::{archive, prune_as_of};
use logward_core::{retention, InitialDelay, LogSettings};

use crate::error::DaemonError;
use crate::paths::{MAINTENANCE_THREAD, SHUTDOWN_TIMEOUT};
use crate::state::ConfigState;
use crate::worker::{shutdown_worker, worker_runtime};

/// What one maintenance run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub directory: PathBuf,
    /// Date pattern handed to the archiver.
    pub target: String,
    pub archive_enabled: bool,
    pub files_archived: usize,
    pub bundles_pruned: usize,
    pub bundles_skipped: usize,
    /// Failures that were logged and swallowed.
    pub errors: Vec<String>,
}

/// Delay before the first run, resolved against the local time `now`.
pub fn initial_delay_for(delay: InitialDelay, now: NaiveDateTime) -> Duration {
    match delay {
        InitialDelay::Immediate => Duration::ZERO,
        InitialDelay::UntilMidnight => retention::delay_until_next_midnight(now),
        InitialDelay::Fixed(delay) => delay,
    }
}

/// One maintenance pass over `settings.log_dir` as of `today`.
///
/// Archive and prune failures are independent: a failed archive does not
/// prevent the prune. Nothing here returns an error.
pub fn run_maintenance(settings: &LogSettings, today: NaiveDate) -> MaintenanceReport {
    let directory = settings.log_dir.clone();
    let target = retention::archive_target(today);
    let mut report = MaintenanceReport {
        directory: directory.clone(),
        target: target.clone(),
        archive_enabled: settings.archive,
        ..MaintenanceReport::default()
    };

    if settings.archive {
        match archive(&directory, &target) {
            Ok(outcome) => report.files_archived = outcome.files_compressed,
            Err(err) => {
                tracing::warn!(
                    directory = %directory.display(),
                    pattern = %target,
                    error = %err,
                    "log archive failed",
                );
                report.errors.push(format!("archive: {err}"));
            }
        }
    }

    match prune_as_of(&directory, settings.max_history_days, today) {
        Ok(pruned) => {
            report.bundles_pruned = pruned.deleted.len();
            report.bundles_skipped = pruned.skipped.len();
        }
        Err(err) => {
            tracing::warn!(
                directory = %directory.display(),
                days = settings.max_history_days,
                error = %err,
                "log prune failed",
            );
            report.errors.push(format!("prune: {err}"));
        }
    }

    tracing::info!(
        directory = %directory.display(),
        archived = report.files_archived,
        pruned = report.bundles_pruned,
        "log maintenance finished",
    );
    report
}

/// Run maintenance now against the settings currently in effect.
pub fn run_once(state: &ConfigState) -> MaintenanceReport {
    run_maintenance(&state.log_settings(), Local::now().date_naive())
}

/// Periodic maintenance on its own single-worker runtime.
pub struct MaintenanceScheduler {
    runtime: Option<Runtime>,
    shutdown: watch::Sender<bool>,
    shutdown_timeout: Duration,
}

impl MaintenanceScheduler {
    /// First run after `initial_delay`, then every `period`. Each run reads
    /// the snapshot current at that moment.
    pub fn start(
        state: Arc<ConfigState>,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<Self, DaemonError> {
        tracing::info!(
            initial_delay_secs = initial_delay.as_secs(),
            period_secs = period.as_secs(),
            "log maintenance scheduled",
        );
        Self::start_with(initial_delay, period, move || {
            run_once(&state);
        })
    }

    fn start_with<F>(initial_delay: Duration, period: Duration, job: F) -> Result<Self, DaemonError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = worker_runtime(MAINTENANCE_THREAD)?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        runtime.spawn(maintenance_loop(initial_delay, period, Arc::new(job), shutdown_rx));
        Ok(Self {
            runtime: Some(runtime),
            shutdown,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        })
    }

    #[cfg(test)]
    fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Signal the loop to stop, then wait up to five seconds for an
    /// in-flight run before abandoning it. Inside an async context the run
    /// is abandoned without waiting.
    pub fn stop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        shutdown_worker(runtime, self.shutdown_timeout);
        tracing::debug!("log maintenance scheduler stopped");
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn maintenance_loop<F>(
    initial_delay: Duration,
    period: Duration,
    job: Arc<F>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: Fn() + Send + Sync + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + initial_delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = interval.tick() => {
                let job = Arc::clone(&job);
                // A panicking run must not end the schedule.
                if let Err(err) = tokio::task::spawn_blocking(move || (*job)()).await {
                    tracing::error!(error = %err, "log maintenance run panicked");
                }
            }
        }
    }
    tracing::debug!("log maintenance loop exited");
}
