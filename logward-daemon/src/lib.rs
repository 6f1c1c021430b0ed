//! logward runtime: the log manager and its two background workers.
//!
//! - [`scheduler`]: daily archive + prune on a dedicated runtime
//! - [`reloader`]: config file watch loop with hot reload
//! - [`manager`]: [`LogManager`], which owns both
//! - [`state`]: settings snapshot shared between them

mod error;
pub mod manager;
pub mod paths;
pub mod reloader;
pub mod scheduler;
pub mod state;
mod worker;

pub use error::DaemonError;
pub use manager::{LogManager, ManagerOptions};
pub use reloader::{ConfigReloader, ReloaderOptions};
pub use scheduler::{
    initial_delay_for, run_maintenance, MaintenanceReport, MaintenanceScheduler,
};
pub use state::{ConfigState, Snapshot};
