//! TLS syslog transport implementation.
//!
//! This module defines [`LogglyTransport`], which encodes records as RFC 5424
//! lines and forwards them over one persistent TLS stream. A worker thread
//! owns the connection, reconnects with a decaying backoff, buffers messages
//! in memory while disconnected and publishes `connect`/`error` events.
//!
//! # Reconnection
//!
//! - **Connect failure or stream error**: emit an error event, count the
//!   attempt, wait for the backoff delay, then reconnect.
//! - **Stream closed by the peer**: emit an error event and reconnect at once
//!   without touching the backoff counters.
//! - **Too many consecutive failures**: stop buffering new messages until the
//!   next successful connection; later calls are acknowledged and dropped.

pub(crate) mod backoff;
mod buffer;
mod config;
mod connection;
mod encoder;
mod handler;
mod worker;


pub use backoff::BackoffState;
pub use buffer::{Batch, PendingBuffer};
pub use config::{
    DEFAULT_HOST, DEFAULT_PORT, RetryPolicy, TransportConfig, default_hostname, default_program,
};
pub use connection::{Connector, Endpoint, StreamIo, TlsConnector, TlsOptions, connect_tcp};
pub use encoder::{MessageEncoder, StructuredData, format_timestamp};
pub use handler::{LogOutcome, LogTransport, LogglyTransport, TRANSPORT_NAME};
pub use worker::{ConnectionState, LinkStatus};
