//! Builder for [`LogglyTransport`](crate::transport::LogglyTransport).
//!
//! Exposes every configuration knob with validation at build time. Only the
//! token is required. [`TransportOptions`] mirrors the same surface as a
//! serde-deserialisable object using the conventional camelCase keys.

use std::{io, sync::Arc, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    events::{EventHub, TransportEvent},
    formatter::{LogFormatter, SharedFormatter},
    level::Severity,
    transport::{Connector, LogglyTransport, TlsConnector, TransportConfig},
};

/// Errors that may occur while building a transport.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No customer token was supplied.
    #[error("loggly transport requires a non-empty token")]
    MissingToken,
    /// Invalid user supplied configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
    /// The worker thread could not be started.
    #[error(transparent)]
    Io(#[from] io::Error),
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`LogglyTransport`] instances.
#[derive(Clone, Debug, Default)]
pub struct TransportBuilder {
    token: String,
    host: Option<String>,
    port: Option<u16>,
    tags: Vec<String>,
    hostname: Option<String>,
    pid: Option<u32>,
    program: Option<String>,
    level: Option<Severity>,
    formatter: Option<SharedFormatter>,
    attempts_before_decay: Option<u32>,
    maximum_attempts: Option<u32>,
    connection_delay_ms: Option<u64>,
    max_delay_between_reconnection_ms: Option<u64>,
    handle_exceptions: Option<bool>,
    inline_meta: Option<bool>,
    tls_domain: Option<String>,
    verify_certificates: Option<bool>,
    capacity: Option<usize>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    liveness_interval_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    connector: Option<Arc<dyn Connector>>,
    events: EventHub,
}

impl TransportBuilder {
    /// Create a builder for `token` with every other option defaulted.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Add a tag to the structured-data header.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replace the tag set.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Use `formatter` to render message bodies.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: LogFormatter + 'static,
    {
        self.formatter = Some(SharedFormatter::new(formatter));
        self
    }

    /// Replace the stream connector. The default opens TLS sessions.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Register an observer before the first connection attempt, so no event
    /// can be missed.
    pub fn with_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.events.on_event(observer);
        self
    }

    option_setter!(with_host, host, String);
    option_setter!(with_port, port, u16);
    option_setter!(with_hostname, hostname, String);
    option_setter!(with_pid, pid, u32);
    option_setter!(with_program, program, String);
    option_setter!(
        #[doc = "Minimum level advertised to the host framework."]
        with_level,
        level,
        Severity
    );
    option_setter!(with_attempts_before_decay, attempts_before_decay, u32);
    option_setter!(with_maximum_attempts, maximum_attempts, u32);
    option_setter!(with_connection_delay_ms, connection_delay_ms, u64);
    option_setter!(
        with_max_delay_between_reconnection_ms,
        max_delay_between_reconnection_ms,
        u64
    );
    option_setter!(with_handle_exceptions, handle_exceptions, bool);
    option_setter!(with_inline_meta, inline_meta, bool);
    option_setter!(
        #[doc = "Domain presented during the TLS handshake instead of the host."]
        with_tls_domain,
        tls_domain,
        String
    );
    option_setter!(
        #[doc = "Validate the endpoint certificate chain and hostname."]
        with_verify_certificates,
        verify_certificates,
        bool
    );
    option_setter!(
        #[doc = "Set the bounded command queue capacity."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_liveness_interval_ms, liveness_interval_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);

    /// Validate and assemble the configuration without starting a transport.
    pub fn build_config(&self) -> Result<TransportConfig, ConfigError> {
        let mut config = TransportConfig::with_token(self.token.clone());
        config.tags = self.tags.clone();
        config.formatter = self.formatter.clone();
        self.apply_identity(&mut config);
        self.apply_retry(&mut config);
        self.apply_io(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_identity(&self, config: &mut TransportConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(hostname) = &self.hostname {
            config.hostname = hostname.clone();
        }
        if let Some(pid) = self.pid {
            config.pid = pid;
        }
        if let Some(program) = &self.program {
            config.program = program.clone();
        }
        if let Some(level) = self.level {
            config.level = level;
        }
        if let Some(flag) = self.handle_exceptions {
            config.handle_exceptions = flag;
        }
        if let Some(flag) = self.inline_meta {
            config.inline_meta = flag;
        }
    }

    fn apply_retry(&self, config: &mut TransportConfig) {
        let retry = &mut config.retry;
        if let Some(attempts) = self.attempts_before_decay {
            retry.attempts_before_decay = attempts;
        }
        if let Some(attempts) = self.maximum_attempts {
            retry.maximum_attempts = attempts;
        }
        if let Some(ms) = self.connection_delay_ms {
            retry.connection_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_between_reconnection_ms {
            retry.max_delay_between_reconnection = Duration::from_millis(ms);
        }
    }

    fn apply_io(&self, config: &mut TransportConfig) {
        if let Some(domain) = &self.tls_domain {
            config.tls.domain = Some(domain.clone());
        }
        if let Some(verify) = self.verify_certificates {
            config.tls.verify_certificates = verify;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.liveness_interval_ms {
            config.liveness_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(ms);
        }
    }

    /// Validate the configuration and start the transport.
    pub fn build(self) -> Result<LogglyTransport, ConfigError> {
        let config = self.build_config()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TlsConnector::new(config.tls.clone())));
        LogglyTransport::with_connector(config, connector, self.events)
    }
}

/// Configuration object using the conventional option names.
///
/// Absent keys keep their defaults. `level` accepts any syslog level name;
/// unknown names resolve to `info`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransportOptions {
    #[serde(default)]
    pub token: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub hostname: Option<String>,
    pub pid: Option<u32>,
    pub program: Option<String>,
    pub level: Option<String>,
    pub attempts_before_decay: Option<u32>,
    pub maximum_attempts: Option<u32>,
    pub connection_delay: Option<u64>,
    pub handle_exceptions: Option<bool>,
    pub max_delay_between_reconnection: Option<u64>,
    pub inline_meta: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TransportOptions {
    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::InvalidConfig(err.to_string()))
    }

    /// Convert into a builder; formatter and connector remain defaulted.
    pub fn into_builder(self) -> TransportBuilder {
        TransportBuilder {
            token: self.token,
            host: self.host,
            port: self.port,
            tags: self.tags,
            hostname: self.hostname,
            pid: self.pid,
            program: self.program,
            level: self.level.as_deref().map(Severity::parse_or_info),
            attempts_before_decay: self.attempts_before_decay,
            maximum_attempts: self.maximum_attempts,
            connection_delay_ms: self.connection_delay,
            max_delay_between_reconnection_ms: self.max_delay_between_reconnection,
            handle_exceptions: self.handle_exceptions,
            inline_meta: self.inline_meta,
            ..TransportBuilder::default()
        }
    }
}

impl From<TransportOptions> for TransportBuilder {
    fn from(options: TransportOptions) -> Self {
        options.into_builder()
    }
}
