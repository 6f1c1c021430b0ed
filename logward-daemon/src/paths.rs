use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Wait after a config change before re-reading the file.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);
pub const MAINTENANCE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const MAINTENANCE_THREAD: &str = "logward-maintenance";
pub const CONFIG_WATCH_THREAD: &str = "logward-config-watch";

/// Canonicalize so that watcher paths (which arrive as real paths, e.g.
/// /private/var/... on macOS) compare equal.
pub fn canonical_config_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Directory to register with the watcher for `config`.
pub fn watch_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
