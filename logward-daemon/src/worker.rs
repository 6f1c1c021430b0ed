//! Dedicated single-worker runtimes for the background tasks.

use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{io_err, DaemonError};

pub(crate) fn worker_runtime(thread_name: &'static str) -> Result<Runtime, DaemonError> {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name(thread_name)
        .enable_all()
        .build()
        .map_err(|e| io_err(thread_name, e))
}

/// Whether the current thread may block waiting for a worker to finish.
/// Blocking inside a runtime panics.
pub(crate) fn may_block() -> bool {
    Handle::try_current().is_err()
}

/// Stop `runtime`, waiting up to `timeout` for in-flight work. Inside an
/// async context it is released without waiting and in-flight work runs to
/// completion on its own thread.
pub(crate) fn shutdown_worker(runtime: Runtime, timeout: Duration) {
    if may_block() {
        runtime.shutdown_timeout(timeout);
    } else {
        runtime.shutdown_background();
    }
}
