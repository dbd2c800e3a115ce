//! Public transport type exported by the crate.

use std::{fmt, sync::Arc, thread, time::Duration};

use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    builder::{ConfigError, TransportBuilder},
    events::{EventHub, TransportEvent},
    formatter::{JsonFormatter, Metadata, SharedFormatter, message_text},
    level::Severity,
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    config::TransportConfig,
    connection::{Connector, TlsConnector},
    encoder::{MessageEncoder, StructuredData},
    worker::{
        ConnectionState, LinkStatus, TransportCommand, WorkerSettings, enqueue_message,
        flush_queue, spawn_worker,
    },
};

/// Name reported to host logging frameworks.
pub const TRANSPORT_NAME: &str = "loggly";

/// Acknowledgement returned for every log call.
///
/// Both variants mean the call succeeded from the caller's point of view;
/// delivery problems are reported only through [`TransportEvent::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutcome {
    /// Queued for writing or buffering.
    Accepted,
    /// Discarded because buffering is disabled and no connection exists, or
    /// because the command queue was saturated.
    Dropped,
}

/// Capability a host logging framework depends on.
pub trait LogTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Minimum level the host should forward to this transport.
    fn level(&self) -> Severity;

    fn handles_exceptions(&self) -> bool {
        false
    }

    /// Forward one record. Never blocks on network I/O.
    fn log(&self, level: &str, message: &Value, metadata: Option<Metadata>) -> LogOutcome;

    /// Wait for previously forwarded records to be written.
    fn flush(&self) -> bool {
        true
    }
}

/// Transport forwarding syslog lines to Loggly over a persistent TLS stream.
pub struct LogglyTransport {
    level: Severity,
    handle_exceptions: bool,
    endpoint: String,
    encoder: MessageEncoder,
    tx: Option<crossbeam_channel::Sender<TransportCommand>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    events: EventHub,
    status: Arc<LinkStatus>,
    warner: RateLimitedWarner,
    flush_timeout: Duration,
}

impl LogglyTransport {
    /// Start building a transport for `token`.
    pub fn builder(token: impl Into<String>) -> TransportBuilder {
        TransportBuilder::new(token)
    }

    /// Construct the transport from a configuration object.
    ///
    /// Fails when the configuration is invalid, most commonly a missing
    /// token; network failures never fail construction and are reported as
    /// events instead.
    pub fn new(config: TransportConfig) -> Result<Self, ConfigError> {
        let connector = TlsConnector::new(config.tls.clone());
        Self::with_connector(config, Arc::new(connector), EventHub::new())
    }

    /// Construct the transport with a custom stream connector and a
    /// pre-populated observer registry.
    pub fn with_connector(
        config: TransportConfig,
        connector: Arc<dyn Connector>,
        events: EventHub,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let formatter = config
            .formatter
            .clone()
            .unwrap_or_else(|| SharedFormatter::new(JsonFormatter::new(config.inline_meta)));
        let encoder = MessageEncoder::new(
            &config.hostname,
            &config.program,
            config.pid,
            StructuredData::new(&config.token, config.tags.as_slice()),
            formatter,
        );
        let status = Arc::new(LinkStatus::default());
        let (tx, handle) = spawn_worker(
            WorkerSettings::from(&config),
            connector,
            events.clone(),
            Arc::clone(&status),
        )?;
        Ok(Self {
            level: config.level,
            handle_exceptions: config.handle_exceptions,
            endpoint: config.endpoint(),
            encoder,
            tx: Some(tx),
            handle: Mutex::new(Some(handle)),
            events,
            status,
            warner: RateLimitedWarner::new(config.warn_interval),
            flush_timeout: config.write_timeout,
        })
    }

    /// Encode and forward one record.
    ///
    /// Unknown level names are sent at `info` severity.
    pub fn log(&self, level: &str, message: &Value, metadata: Option<Metadata>) -> LogOutcome {
        if !self.status.accepts_messages() {
            return LogOutcome::Dropped;
        }
        let Some(tx) = self.tx.as_ref() else {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                log::warn!("loggly transport dropped {count} messages after close");
            });
            return LogOutcome::Dropped;
        };
        let metadata = metadata.unwrap_or_default();
        let line = self.encoder.encode(
            Severity::parse_or_info(level),
            &message_text(message),
            &metadata,
        );
        if enqueue_message(tx, line, &self.warner) {
            LogOutcome::Accepted
        } else {
            LogOutcome::Dropped
        }
    }

    /// Register an observer for connection events.
    pub fn on_event<F>(&self, observer: F)
    where
        F: Fn(&TransportEvent) + Send + Sync + 'static,
    {
        self.events.on_event(observer);
    }

    /// Receive connection events on a channel.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub fn buffering_enabled(&self) -> bool {
        self.status.buffering_enabled()
    }

    /// `host:port` of the collection endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn structured_data(&self) -> &StructuredData {
        self.encoder.structured_data()
    }

    /// Wait until everything queued so far has been written or buffered.
    ///
    /// Returns `false` when the transport is closed or the worker does not
    /// answer within the write timeout.
    pub fn flush(&self) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        self.warner.flush(|count| {
            log::warn!("loggly transport dropped {count} messages in the last interval");
        });
        flush_queue(tx, self.flush_timeout)
    }

    /// Drain queued messages, close the stream and join the worker.
    pub fn close(&mut self) {
        self.request_shutdown();
        self.join_worker();
    }

    fn request_shutdown(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if tx.send(TransportCommand::Shutdown(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.recv_timeout(self.flush_timeout);
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            log::warn!("loggly transport worker thread panicked");
        }
    }
}

impl LogTransport for LogglyTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn level(&self) -> Severity {
        self.level
    }

    fn handles_exceptions(&self) -> bool {
        self.handle_exceptions
    }

    fn log(&self, level: &str, message: &Value, metadata: Option<Metadata>) -> LogOutcome {
        LogglyTransport::log(self, level, message, metadata)
    }

    fn flush(&self) -> bool {
        LogglyTransport::flush(self)
    }
}

impl Drop for LogglyTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for LogglyTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogglyTransport")
            .field("endpoint", &self.endpoint)
            .field("level", &self.level)
            .field("state", &self.state())
            .field("buffering", &self.buffering_enabled())
            .finish()
    }
}
