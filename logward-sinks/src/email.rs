//! Email sink: a bounded buffer of recent events, mailed out when a
//! triggering event arrives.
//!
//! Delivery happens on a dedicated thread so that an SMTP round-trip never
//! blocks the code that emitted the event. Events the delivery thread logs
//! itself (target [`EMAIL_TARGET`]) are never buffered.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use logward_core::{EmailSettings, EmailTrigger, LevelSetting};

use crate::error::SinkError;

/// Target used for diagnostics about mail delivery.
pub const EMAIL_TARGET: &str = "logward::email";

/// Field that marks an event for delivery when the trigger is
/// [`EmailTrigger::Marker`].
pub const MARKER_FIELD: &str = "email";

/// A fully addressed log email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Something that can deliver a [`MailMessage`].
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// SMTP
// ---------------------------------------------------------------------------

/// SMTP delivery through lettre.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn from_settings(email: &EmailSettings) -> Result<Self, SinkError> {
        let builder = if email.starttls {
            SmtpTransport::starttls_relay(&email.host)?
        } else {
            SmtpTransport::builder_dangerous(email.host.as_str())
        };
        let mut builder = builder.port(email.port);
        if let Some(username) = &email.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                email.password.clone().unwrap_or_default(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, message: &MailMessage) -> Result<(), SinkError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&message.from)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &message.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        let email = builder.body(message.body.clone())?;
        self.transport.send(&email)?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SinkError> {
    address.parse().map_err(|source| SinkError::Address {
        address: address.to_string(),
        source,
    })
}

/// Reject configurations whose sender or recipients cannot be parsed, so a
/// bad address fails the reload instead of every later delivery.
pub fn validate_addresses(email: &EmailSettings) -> Result<(), SinkError> {
    parse_mailbox(&email.from)?;
    for recipient in &email.to {
        parse_mailbox(recipient)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

pub struct EmailLayer {
    buffer: Mutex<VecDeque<String>>,
    capacity: usize,
    trigger: EmailTrigger,
    threshold: LevelSetting,
    from: String,
    to: Vec<String>,
    subject: String,
    outbox: mpsc::UnboundedSender<MailMessage>,
}

impl EmailLayer {
    /// Build the layer and start its delivery thread. The thread exits once
    /// the layer is dropped and every queued mail has been handed to
    /// `transport`.
    pub fn new(email: &EmailSettings, transport: Arc<dyn MailTransport>) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        spawn_dispatcher(inbox, transport);
        Self {
            buffer: Mutex::new(VecDeque::new()),
            capacity: email.buffer_size.max(1),
            trigger: email.trigger,
            threshold: email.level,
            from: email.from.clone(),
            to: email.to.clone(),
            subject: email.subject.clone(),
            outbox,
        }
    }

    fn triggers(&self, level: &Level, marked: bool) -> bool {
        match self.trigger {
            EmailTrigger::Level => {
                self.threshold != LevelSetting::Off && severity(level) >= self.threshold
            }
            EmailTrigger::Marker => marked,
        }
    }
}

fn spawn_dispatcher(
    mut inbox: mpsc::UnboundedReceiver<MailMessage>,
    transport: Arc<dyn MailTransport>,
) {
    let spawned = thread::Builder::new()
        .name("logward-email".to_string())
        .spawn(move || {
            while let Some(message) = inbox.blocking_recv() {
                if let Err(err) = transport.send(&message) {
                    tracing::warn!(target: EMAIL_TARGET, error = %err, "log email delivery failed");
                }
            }
        });
    if let Err(err) = spawned {
        tracing::error!(target: EMAIL_TARGET, error = %err, "could not start log email thread");
    }
}

fn severity(level: &Level) -> LevelSetting {
    match *level {
        Level::TRACE => LevelSetting::Trace,
        Level::DEBUG => LevelSetting::Debug,
        Level::INFO => LevelSetting::Info,
        Level::WARN => LevelSetting::Warn,
        _ => LevelSetting::Error,
    }
}

impl<S: Subscriber> Layer<S> for EmailLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(EMAIL_TARGET) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = format!(
            "{} {:<5} [{}] {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            metadata.level(),
            thread::current().name().unwrap_or("unnamed"),
            metadata.target(),
            visitor.line(),
        );

        let fire = self.triggers(metadata.level(), visitor.marked);
        let body = {
            let mut buffer = match self.buffer.lock() {
                Ok(buffer) => buffer,
                Err(poisoned) => poisoned.into_inner(),
            };
            buffer.push_back(line);
            while buffer.len() > self.capacity {
                buffer.pop_front();
            }
            if !fire {
                return;
            }
            buffer.drain(..).collect::<Vec<_>>().join("\n")
        };

        // The delivery thread only goes away if it failed to start.
        let _ = self.outbox.send(MailMessage {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: self.subject.clone(),
            body,
        });
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
    marked: bool,
}

impl LineVisitor {
    fn line(&self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message.clone(),
            (true, false) => self.fields.clone(),
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == MARKER_FIELD {
            self.marked |= value;
            return;
        }
        self.push_field(field.name(), format_args!("{value}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<MailMessage>>,
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, message: &MailMessage) -> Result<(), SinkError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    impl RecordingTransport {
        fn wait_for(&self, count: usize) -> Vec<MailMessage> {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let sent = self.sent.lock().unwrap().clone();
                if sent.len() >= count || Instant::now() > deadline {
                    return sent;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    fn email_settings(trigger: EmailTrigger, buffer_size: usize) -> EmailSettings {
        EmailSettings {
            host: "localhost".into(),
            port: 25,
            username: None,
            password: None,
            starttls: false,
            from: "app@example.com".into(),
            to: vec!["ops@example.com".into()],
            subject: "application error".into(),
            level: LevelSetting::Error,
            trigger,
            buffer_size,
        }
    }

    #[test]
    fn error_event_sends_buffered_context() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = EmailLayer::new(&email_settings(EmailTrigger::Level, 16), transport.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("starting up");
            tracing::warn!(attempt = 2, "retrying");
            tracing::error!("database unreachable");
        });

        let sent = transport.wait_for(1);
        assert_eq!(sent.len(), 1);
        let mail = &sent[0];
        assert_eq!(mail.subject, "application error");
        assert_eq!(mail.to, vec!["ops@example.com".to_string()]);
        let lines: Vec<_> = mail.body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("starting up"));
        assert!(lines[1].contains("retrying attempt=2"));
        assert!(lines[2].contains("ERROR"));
        assert!(lines[2].ends_with("database unreachable"));
    }

    #[test]
    fn events_below_threshold_never_send() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = EmailLayer::new(&email_settings(EmailTrigger::Level, 16), transport.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("fine");
            tracing::warn!("still fine");
        });

        thread::sleep(Duration::from_millis(50));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn buffer_keeps_only_the_most_recent_events() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = EmailLayer::new(&email_settings(EmailTrigger::Level, 2), transport.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("one");
            tracing::info!("two");
            tracing::info!("three");
            tracing::error!("four");
        });

        let sent = transport.wait_for(1);
        let lines: Vec<_> = sent[0].body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("three"));
        assert!(lines[1].ends_with("four"));
    }

    #[test]
    fn marker_trigger_ignores_level() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = EmailLayer::new(&email_settings(EmailTrigger::Marker, 16), transport.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("unmarked error");
            tracing::info!(email = true, "nightly report ready");
        });

        let sent = transport.wait_for(1);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.ends_with("nightly report ready"));
        assert!(!sent[0].body.contains("email=true"));
    }

    #[test]
    fn delivery_diagnostics_are_not_buffered() {
        let transport = Arc::new(RecordingTransport::default());
        let layer = EmailLayer::new(&email_settings(EmailTrigger::Level, 16), transport.clone());
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: EMAIL_TARGET, "log email delivery failed");
        });

        thread::sleep(Duration::from_millis(50));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn bad_addresses_are_rejected() {
        let mut email = email_settings(EmailTrigger::Level, 16);
        assert!(validate_addresses(&email).is_ok());
        email.to.push("not an address".into());
        assert!(matches!(
            validate_addresses(&email),
            Err(SinkError::Address { .. })
        ));
    }
}
