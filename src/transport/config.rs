//! Configuration structures consumed by the transport lifecycle.
//!
//! [`TransportBuilder`](crate::builder::TransportBuilder) constructs these
//! values before passing them to [`LogglyTransport`](super::LogglyTransport)
//! for runtime use. A config is immutable once the transport is running.

use std::{env, fs, path::Path, time::Duration};

use once_cell::sync::Lazy;

use crate::{
    builder::ConfigError, formatter::SharedFormatter, level::Severity,
    rate_limited_warner::DEFAULT_WARN_INTERVAL,
};

use super::connection::TlsOptions;

/// Loggly's TLS syslog endpoint.
pub const DEFAULT_HOST: &str = "logs-01.loggly.com";
/// Port of the TLS syslog endpoint.
pub const DEFAULT_PORT: u16 = 6514;
/// Default bounded channel capacity between callers and the worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;
/// Default timeout for the TCP connect and the TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout applied to stream writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default interval between checks for a stream closed by the peer.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(250);
/// Failures tolerated at one delay before the delay doubles.
pub const DEFAULT_ATTEMPTS_BEFORE_DECAY: u32 = 5;
/// Consecutive failures after which buffering is disabled.
pub const DEFAULT_MAXIMUM_ATTEMPTS: u32 = 25;
/// Initial delay between reconnection attempts.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(1000);
/// Delay beyond which no further doubling happens.
pub const DEFAULT_MAX_DELAY_BETWEEN_RECONNECTION: Duration = Duration::from_millis(60_000);

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        fn is_default<T: Default + PartialEq>(value: &T) -> bool {
            *value == T::default()
        }
        if is_default(&$value) {
            return Err(ConfigError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )));
        }
    }};
}

static DEFAULT_HOSTNAME: Lazy<String> = Lazy::new(detect_hostname);
static DEFAULT_PROGRAM: Lazy<String> = Lazy::new(detect_program);

fn detect_hostname() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .chain(fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_owned())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

fn detect_program() -> String {
    env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "rust".to_owned())
}

/// Hostname reported in the syslog header unless overridden.
pub fn default_hostname() -> String {
    DEFAULT_HOSTNAME.clone()
}

/// Program name reported in the syslog header unless overridden.
pub fn default_program() -> String {
    DEFAULT_PROGRAM.clone()
}

/// Reconnection tuning shared by the backoff state machine and the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts_before_decay: u32,
    pub maximum_attempts: u32,
    pub connection_delay: Duration,
    pub max_delay_between_reconnection: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_before_decay: DEFAULT_ATTEMPTS_BEFORE_DECAY,
            maximum_attempts: DEFAULT_MAXIMUM_ATTEMPTS,
            connection_delay: DEFAULT_CONNECTION_DELAY,
            max_delay_between_reconnection: DEFAULT_MAX_DELAY_BETWEEN_RECONNECTION,
        }
    }
}

/// Configuration object describing how to construct a
/// [`LogglyTransport`](super::LogglyTransport).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Customer token carried in the structured-data header.
    pub token: String,
    pub host: String,
    pub port: u16,
    /// Tags carried in the structured-data header.
    pub tags: Vec<String>,
    pub hostname: String,
    pub pid: u32,
    pub program: String,
    /// Minimum level advertised to the host framework.
    pub level: Severity,
    /// Body formatter; `None` selects the JSON formatter.
    pub formatter: Option<SharedFormatter>,
    pub retry: RetryPolicy,
    pub handle_exceptions: bool,
    pub inline_meta: bool,
    pub tls: TlsOptions,
    pub capacity: usize,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub liveness_interval: Duration,
    pub warn_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            tags: Vec::new(),
            hostname: default_hostname(),
            pid: std::process::id(),
            program: default_program(),
            level: Severity::default(),
            formatter: None,
            retry: RetryPolicy::default(),
            handle_exceptions: false,
            inline_meta: false,
            tls: TlsOptions::default(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl TransportConfig {
    /// Start from the defaults with `token` set.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Check every field the worker relies on.
    ///
    /// The token becomes the structured-data ID, so it must be printable
    /// ASCII without spaces, `=`, `]` or `"`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if !self.token.chars().all(is_sd_name_char) {
            return Err(ConfigError::InvalidConfig(
                "token may only contain printable ASCII other than space, '=', ']' and '\"'"
                    .into(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("host must not be empty".into()));
        }
        ensure_positive!(self.port, "port");
        ensure_positive!(self.capacity, "capacity");
        ensure_positive!(self.retry.connection_delay, "connection_delay");
        ensure_positive!(
            self.retry.max_delay_between_reconnection,
            "max_delay_between_reconnection"
        );
        ensure_positive!(self.connect_timeout, "connect_timeout");
        ensure_positive!(self.write_timeout, "write_timeout");
        ensure_positive!(self.liveness_interval, "liveness_interval");
        Ok(())
    }

    /// `host:port` as reported in connect notifications.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn is_sd_name_char(ch: char) -> bool {
    ch.is_ascii_graphic() && !matches!(ch, '=' | ']' | '"')
}
