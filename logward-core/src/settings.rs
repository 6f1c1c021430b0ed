//! Settings snapshots and the typed view over them.
//!
//! A [`Settings`] value is an immutable flat key-value map. It is cheap to
//! clone and is replaced wholesale on reload; nothing ever mutates a snapshot
//! that another thread may be reading.
//!
//! # Sources
//!
//! - `*.yaml` / `*.yml`: a mapping, flattened into dotted keys.
//! - anything else: `.properties` (`key=value`, `key: value`,
//!   `key value`, `#`/`!` comments, `\` line continuation, `\uXXXX` escapes).

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::{Chars, FromStr};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::SettingsError;

// ---------------------------------------------------------------------------
// Keys and defaults
// ---------------------------------------------------------------------------

pub mod keys {
    pub const LEVEL: &str = "log.level";
    pub const LEVEL_PREFIX: &str = "log.level.";
    pub const CONSOLE: &str = "log.console";
    pub const PATTERN: &str = "log.pattern";
    pub const FILE_PATH: &str = "log.file.path";
    pub const FILE_NAME: &str = "log.file.name";
    pub const MAX_HISTORY: &str = "log.file.maxHistory";
    pub const MAX_SIZE: &str = "log.file.maxSize";
    pub const ARCHIVE: &str = "log.archive";
    pub const INITIAL_DELAY: &str = "log.maintenance.initialDelay";
    pub const EMAIL_ENABLED: &str = "log.email.enabled";
    pub const EMAIL_HOST: &str = "log.email.smtp.host";
    pub const EMAIL_PORT: &str = "log.email.smtp.port";
    pub const EMAIL_USERNAME: &str = "log.email.smtp.username";
    pub const EMAIL_PASSWORD: &str = "log.email.smtp.password";
    pub const EMAIL_SSL: &str = "log.email.smtp.ssl";
    pub const EMAIL_FROM: &str = "log.email.from";
    pub const EMAIL_TO: &str = "log.email.to";
    pub const EMAIL_SUBJECT: &str = "log.email.subject";
    pub const EMAIL_LEVEL: &str = "log.email.level";
    pub const EMAIL_TRIGGER: &str = "log.email.trigger";
    pub const EMAIL_BUFFER_SIZE: &str = "log.email.bufferSize";
}

/// Retention window used whenever `log.file.maxHistory` is absent.
pub const DEFAULT_MAX_HISTORY_DAYS: u32 = 30;
/// Directory maintenance runs against when no file sink is configured.
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_FILE_NAME: &str = "application.log";
/// Size at which the live log file rolls over when `log.file.maxSize` is absent.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_EMAIL_BUFFER_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Raw snapshot
// ---------------------------------------------------------------------------

/// Immutable flat key-value settings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    entries: Arc<BTreeMap<String, String>>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a settings file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        let entries = if is_yaml {
            parse_yaml(&text, path)?
        } else {
            parse_properties(&text, path)?
        };
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    pub fn from_properties_str(text: &str) -> Result<Self, SettingsError> {
        let entries = parse_properties(text, Path::new("<inline>"))?;
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SettingsError> {
        let entries = parse_yaml(text, Path::new("<inline>"))?;
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// Return a copy of this snapshot with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.entries).insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Only a case-insensitive `true` is true; any other present value is false.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(raw) => raw.trim().eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Parse `key` as `T`, falling back to `default` when the key is absent.
    pub fn get_parsed<T>(&self, key: &str, default: T) -> Result<T, SettingsError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|err: T::Err| SettingsError::InvalidValue {
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: err.to_string(),
                }),
        }
    }

    /// Entries under `prefix`, with the prefix stripped from each key.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(key, _)| key.starts_with(prefix))
            .map(move |(key, value)| (&key[prefix.len()..], value.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Settings
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Arc::new(entries),
        }
    }
}

// ---------------------------------------------------------------------------
// .properties
// ---------------------------------------------------------------------------

/// Parses the `java.util.Properties::load` line format: `=`, `:` or the first
/// unescaped whitespace ends a key, `#` and `!` start comment lines, an odd run
/// of trailing backslashes joins the next line with its leading whitespace
/// stripped, and `\t \n \r \f \uXXXX` are unescaped while any other escaped
/// character stands for itself. Trailing whitespace in values is kept.
fn parse_properties(text: &str, origin: &Path) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut entries = BTreeMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let mut logical = raw.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical).map_err(|message| SettingsError::Parse {
            path: origin.to_path_buf(),
            line: index + 1,
            message,
        })?;
        entries.insert(key, value);
    }

    Ok(entries)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> Result<(String, String), String> {
    let mut chars = line.chars().peekable();

    let mut key = String::new();
    let mut separated = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => key.push(unescape(&mut chars)?),
            '=' | ':' => {
                separated = true;
                break;
            }
            c if c.is_whitespace() => break,
            c => key.push(c),
        }
    }

    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    if !separated && chars.next_if(|c| *c == '=' || *c == ':').is_some() {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(unescape(&mut chars)?),
            c => value.push(c),
        }
    }

    if key.is_empty() {
        return Err("entry has an empty key".to_string());
    }
    Ok((key, value))
}

fn unescape(chars: &mut Peekable<Chars<'_>>) -> Result<char, String> {
    match chars.next() {
        Some('t') => Ok('\t'),
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('f') => Ok('\u{c}'),
        Some('u') => {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.chars().count() != 4 {
                return Err(format!("malformed \\u escape: \\u{hex}"));
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("malformed \\u escape: \\u{hex}"))
        }
        Some(other) => Ok(other),
        None => Err("dangling escape at end of line".to_string()),
    }
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

fn parse_yaml(text: &str, origin: &Path) -> Result<BTreeMap<String, String>, SettingsError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|source| SettingsError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;

    let mut entries = BTreeMap::new();
    match document {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Mapping(_) => {
            flatten_yaml("", &document, &mut entries).map_err(|message| {
                SettingsError::Structure {
                    path: origin.to_path_buf(),
                    message,
                }
            })?
        }
        _ => {
            return Err(SettingsError::Structure {
                path: origin.to_path_buf(),
                message: "top level must be a mapping".to_string(),
            })
        }
    }
    Ok(entries)
}

fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), String> {
    use serde_yaml::Value;

    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let key = scalar_to_string(key)
                    .ok_or_else(|| format!("non-scalar key under '{prefix}'"))?;
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_yaml(&full, child, out)?;
            }
        }
        Value::Sequence(items) => {
            let parts = items
                .iter()
                .map(|item| {
                    scalar_to_string(item)
                        .ok_or_else(|| format!("nested collection in list '{prefix}'"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.insert(prefix.to_string(), parts.join(","));
        }
        Value::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out)?,
        scalar => {
            let text = scalar_to_string(scalar).unwrap_or_default();
            out.insert(prefix.to_string(), text);
        }
    }
    Ok(())
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Verbosity threshold as written in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LevelSetting {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LevelSetting {
    /// Unknown names fall back to `Info`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Self::Trace,
            "DEBUG" => Self::Debug,
            "INFO" => Self::Info,
            "WARN" | "WARNING" => Self::Warn,
            "ERROR" => Self::Error,
            "OFF" => Self::Off,
            _ => Self::Info,
        }
    }

    /// The matching `EnvFilter` directive.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for LevelSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Output layout for the console and file sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    /// `None` for names that are not a known layout.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// When the first maintenance run fires after start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialDelay {
    #[default]
    Immediate,
    UntilMidnight,
    Fixed(Duration),
}

impl FromStr for InitialDelay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" | "0" => Ok(Self::Immediate),
            "midnight" => Ok(Self::UntilMidnight),
            other => other
                .parse::<u64>()
                .map(|secs| Self::Fixed(Duration::from_secs(secs)))
                .map_err(|_| format!("expected 'immediate', 'midnight' or seconds, got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailTrigger {
    /// Send when an event at or above the configured level arrives.
    #[default]
    Level,
    /// Send when an event carries an `email = true` field.
    Marker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSinkSettings {
    pub directory: PathBuf,
    pub file_name: String,
    /// Byte size past which the live file rolls over to a numbered sibling.
    /// `None` disables size-based rollover.
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub starttls: bool,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub level: LevelSetting,
    pub trigger: EmailTrigger,
    pub buffer_size: usize,
}

/// Validated, typed view of a [`Settings`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    pub level: LevelSetting,
    pub target_levels: BTreeMap<String, LevelSetting>,
    pub console: bool,
    pub format: LogFormat,
    pub file: Option<FileSinkSettings>,
    /// Directory the archiver and pruner operate on.
    pub log_dir: PathBuf,
    pub max_history_days: u32,
    pub archive: bool,
    pub initial_delay: InitialDelay,
    pub email: Option<EmailSettings>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelSetting::Info,
            target_levels: BTreeMap::new(),
            console: true,
            format: LogFormat::Full,
            file: None,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            max_history_days: DEFAULT_MAX_HISTORY_DAYS,
            archive: true,
            initial_delay: InitialDelay::Immediate,
            email: None,
        }
    }
}

impl LogSettings {
    /// Interpret a snapshot. Fails only on values of the wrong type; unknown
    /// level names fall back to `INFO` and unknown patterns to the full format.
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let level = settings
            .get(keys::LEVEL)
            .map(LevelSetting::parse_lenient)
            .unwrap_or_default();

        let target_levels = settings
            .with_prefix(keys::LEVEL_PREFIX)
            .filter(|(target, _)| !target.is_empty())
            .map(|(target, raw)| (target.to_string(), LevelSetting::parse_lenient(raw)))
            .collect();

        let format = match settings.get(keys::PATTERN) {
            None => LogFormat::Full,
            Some(raw) => LogFormat::parse(raw).unwrap_or_else(|| {
                tracing::warn!(
                    key = keys::PATTERN,
                    value = raw,
                    "unrecognised log pattern, using the full format"
                );
                LogFormat::Full
            }),
        };

        let file_path = settings
            .get(keys::FILE_PATH)
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let max_size = match settings.get(keys::MAX_SIZE) {
            None => Some(DEFAULT_MAX_FILE_SIZE),
            Some(raw) => {
                let bytes = parse_size(raw).ok_or_else(|| SettingsError::InvalidValue {
                    key: keys::MAX_SIZE.to_string(),
                    value: raw.to_string(),
                    reason: "expected a byte count with an optional KB, MB or GB suffix"
                        .to_string(),
                })?;
                (bytes > 0).then_some(bytes)
            }
        };
        let file = file_path.map(|dir| FileSinkSettings {
            directory: PathBuf::from(dir),
            file_name: settings
                .get_or(keys::FILE_NAME, DEFAULT_FILE_NAME)
                .trim()
                .to_string(),
            max_size,
        });
        let log_dir = PathBuf::from(file_path.unwrap_or(DEFAULT_LOG_DIR));

        let email = if settings.get_bool(keys::EMAIL_ENABLED, false) {
            Some(email_settings(settings)?)
        } else {
            None
        };

        Ok(Self {
            level,
            target_levels,
            console: settings.get_bool(keys::CONSOLE, true),
            format,
            file,
            log_dir,
            max_history_days: settings.get_parsed(keys::MAX_HISTORY, DEFAULT_MAX_HISTORY_DAYS)?,
            archive: settings.get_bool(keys::ARCHIVE, true),
            initial_delay: settings.get_parsed(keys::INITIAL_DELAY, InitialDelay::Immediate)?,
            email,
        })
    }
}

/// `"10MB"`, `"512 kb"`, `"1GB"` or a plain byte count. Units are binary.
pub fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let count: u64 = digits.parse().ok()?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    count.checked_mul(multiplier)
}

fn email_settings(settings: &Settings) -> Result<EmailSettings, SettingsError> {
    let non_empty = |key: &str| {
        settings
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let trigger = match settings.get(keys::EMAIL_TRIGGER).map(str::trim) {
        None => EmailTrigger::Level,
        Some(raw) if raw.eq_ignore_ascii_case("level") => EmailTrigger::Level,
        Some(raw) if raw.eq_ignore_ascii_case("marker") => EmailTrigger::Marker,
        Some(raw) => {
            return Err(SettingsError::InvalidValue {
                key: keys::EMAIL_TRIGGER.to_string(),
                value: raw.to_string(),
                reason: "expected 'level' or 'marker'".to_string(),
            })
        }
    };

    let level = match settings.get(keys::EMAIL_LEVEL) {
        Some(raw) => LevelSetting::parse_lenient(raw),
        None => LevelSetting::Error,
    };

    Ok(EmailSettings {
        host: settings.get_or(keys::EMAIL_HOST, "localhost").trim().to_string(),
        port: settings.get_parsed(keys::EMAIL_PORT, 25u16)?,
        username: non_empty(keys::EMAIL_USERNAME),
        password: non_empty(keys::EMAIL_PASSWORD),
        starttls: settings.get_bool(keys::EMAIL_SSL, false),
        from: settings
            .get_or(keys::EMAIL_FROM, "application@example.com")
            .trim()
            .to_string(),
        to: settings
            .get_or(keys::EMAIL_TO, "admin@example.com")
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect(),
        subject: settings.get_or(keys::EMAIL_SUBJECT, "Log Alert").to_string(),
        level,
        trigger,
        buffer_size: settings.get_parsed(keys::EMAIL_BUFFER_SIZE, DEFAULT_EMAIL_BUFFER_SIZE)?,
    })
}
