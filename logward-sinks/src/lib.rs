//! Log sinks for logward: console, size- and day-rolling file and email, swapped
//! atomically whenever the settings change.
//!
//! - [`configurator`]: [`SinkConfigurator`] and the tracing-backed [`TracingSinks`]
//! - [`email`]: buffered [`EmailLayer`] and its SMTP transport
//! - [`filter`]: level directives
//! - [`rolling`]: the file sink's [`RollingFile`] writer
//! - [`error`]: [`SinkError`]

pub mod configurator;
pub mod email;
pub mod error;
pub mod filter;
pub mod rolling;

pub use configurator::{ReloadableSubscriber, SinkConfigurator, SinkLayer, TracingSinks};
pub use email::{EmailLayer, MailMessage, MailTransport, SmtpMailer};
pub use error::SinkError;
pub use rolling::RollingFile;
