//! Syslog-over-TLS log forwarding for Loggly.
//!
//! [`LogglyTransport`] accepts `(level, message, metadata)` records from a
//! host logging framework, encodes each as an RFC 5424 line and writes it to
//! one persistent TLS stream owned by a background worker. While the
//! connection is down, lines are buffered in memory and flushed in one write
//! on reconnect; after too many consecutive failures buffering stops until
//! the next successful connection.

pub mod builder;
pub mod events;
pub mod exceptions;
pub mod formatter;
pub mod level;
#[cfg(feature = "log-compat")]
pub mod log_compat;
mod rate_limited_warner;
pub mod transport;

pub use builder::{ConfigError, TransportBuilder, TransportOptions};
pub use events::{EventHub, Observer, TransportEvent};
pub use exceptions::install_exception_handler;
pub use formatter::{JsonFormatter, LogFormatter, MESSAGE_KEY, Metadata, SharedFormatter};
pub use level::{Severity, UnknownLevel};
#[cfg(feature = "log-compat")]
pub use log_compat::LogBridge;
pub use rate_limited_warner::DEFAULT_WARN_INTERVAL;
pub use transport::{
    ConnectionState, Connector, Endpoint, LogOutcome, LogTransport, LogglyTransport, RetryPolicy,
    StreamIo, TlsConnector, TlsOptions, TransportConfig, connect_tcp,
};
