//! Applying [`LogSettings`] to the live tracing stack.
//!
//! The subscriber is built once: a reloadable list of sink layers under a
//! reloadable `EnvFilter`. Applying settings builds a complete replacement
//! (filter, console, file, email) and swaps it in. If any part fails to
//! build, nothing is swapped and the previous sinks stay active.

use std::sync::{Arc, Mutex};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layer, Layered, SubscriberExt};
use tracing_subscriber::{reload, EnvFilter, Registry};

use logward_core::{FileSinkSettings, LogFormat, LogSettings};

use crate::email::{validate_addresses, EmailLayer, MailTransport, SmtpMailer};
use crate::error::SinkError;
use crate::filter::build_filter;
use crate::rolling::RollingFile;

/// Applies a settings snapshot to whatever does the actual logging.
pub trait SinkConfigurator: Send + Sync {
    fn apply(&self, settings: &LogSettings) -> Result<(), SinkError>;
}

pub type SinkLayer = Box<dyn Layer<Registry> + Send + Sync>;
type SinkStack = Vec<SinkLayer>;
type SinkSubscriber = Layered<reload::Layer<SinkStack, Registry>, Registry>;

/// The subscriber [`TracingSinks::new`] hands back for installation.
pub type ReloadableSubscriber = Layered<reload::Layer<EnvFilter, SinkSubscriber>, SinkSubscriber>;

/// [`SinkConfigurator`] backed by tracing-subscriber reload handles.
pub struct TracingSinks {
    filter: reload::Handle<EnvFilter, SinkSubscriber>,
    sinks: reload::Handle<SinkStack, Registry>,
    guards: Mutex<Vec<WorkerGuard>>,
    mail_transport: Option<Arc<dyn MailTransport>>,
}

impl TracingSinks {
    /// A configurator plus the (not yet installed) subscriber it controls.
    /// Until the first [`apply`](SinkConfigurator::apply) no sinks are
    /// attached.
    pub fn new() -> (Self, ReloadableSubscriber) {
        let (sinks_layer, sinks) = reload::Layer::new(SinkStack::new());
        let (filter_layer, filter) = reload::Layer::new(EnvFilter::new("info"));
        let subscriber = tracing_subscriber::registry()
            .with(sinks_layer)
            .with(filter_layer);
        (
            Self {
                filter,
                sinks,
                guards: Mutex::new(Vec::new()),
                mail_transport: None,
            },
            subscriber,
        )
    }

    /// Build and install as the global default subscriber.
    pub fn install() -> Result<Self, SinkError> {
        let (sinks, subscriber) = Self::new();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(sinks)
    }

    /// Deliver log emails through `transport` instead of SMTP.
    pub fn with_mail_transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.mail_transport = Some(transport);
        self
    }

    fn build_sinks(&self, settings: &LogSettings) -> Result<(SinkStack, Vec<WorkerGuard>), SinkError> {
        let mut layers = SinkStack::new();
        let mut guards = Vec::new();

        if settings.console {
            layers.push(formatted(settings.format, std::io::stdout, true));
        }

        if let Some(file) = &settings.file {
            // With archiving on, old files are bundled by the maintenance
            // job; otherwise the writer expires them itself.
            let max_days = (!settings.archive && settings.max_history_days > 0)
                .then_some(settings.max_history_days);
            let (layer, guard) = file_layer(file, settings.format, max_days)?;
            layers.push(layer);
            guards.push(guard);
        }

        if let Some(email) = &settings.email {
            validate_addresses(email)?;
            let transport: Arc<dyn MailTransport> = match &self.mail_transport {
                Some(transport) => Arc::clone(transport),
                None => Arc::new(SmtpMailer::from_settings(email)?),
            };
            layers.push(Box::new(EmailLayer::new(email, transport)));
        }

        Ok((layers, guards))
    }
}

impl SinkConfigurator for TracingSinks {
    fn apply(&self, settings: &LogSettings) -> Result<(), SinkError> {
        let filter = build_filter(settings)?;
        let (layers, guards) = self.build_sinks(settings)?;
        let sink_count = layers.len();

        self.sinks.reload(layers)?;
        self.filter.reload(filter)?;

        // Dropping the old guards flushes whatever the previous file sink
        // still had queued.
        let previous = {
            let mut current = match self.guards.lock() {
                Ok(current) => current,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::replace(&mut *current, guards)
        };
        drop(previous);

        tracing::debug!(
            level = %settings.level,
            sinks = sink_count,
            "log sinks configured",
        );
        Ok(())
    }
}

fn file_layer(
    file: &FileSinkSettings,
    format: LogFormat,
    max_days: Option<u32>,
) -> Result<(SinkLayer, WorkerGuard), SinkError> {
    let rolling = RollingFile::new(&file.directory, file.file_name.clone())
        .max_bytes(file.max_size)
        .max_days(max_days)
        .open()?;
    let (writer, guard) = tracing_appender::non_blocking(rolling);
    Ok((formatted(format, writer, false), guard))
}

fn formatted<W>(format: LogFormat, writer: W, ansi: bool) -> SinkLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_ansi(ansi).with_writer(writer);
    match format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
