//! Worker thread owning the connection state machine.
//!
//! All mutable transport state lives in [`ConnectionManager`], which runs on a
//! dedicated thread and is driven by commands from the facade, reconnect
//! deadlines and periodic liveness probes. Callers only ever observe the
//! published [`LinkStatus`].

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use log::{debug, warn};

use crate::{
    events::{EventHub, TransportEvent},
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    backoff::BackoffState,
    buffer::PendingBuffer,
    config::{RetryPolicy, TransportConfig},
    connection::{ActiveConnection, Connector, Endpoint, Liveness},
};

/// Lifecycle of the single outbound connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Connected,
            1 => Self::Connecting,
            _ => Self::Disconnected,
        }
    }
}

/// Connection state and buffering flag as last published by the worker.
#[derive(Debug)]
pub struct LinkStatus {
    state: AtomicU8,
    buffering: AtomicBool,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            buffering: AtomicBool::new(true),
        }
    }
}

impl LinkStatus {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn buffering_enabled(&self) -> bool {
        self.buffering.load(Ordering::Acquire)
    }

    /// Whether a new message would be written or buffered.
    pub fn accepts_messages(&self) -> bool {
        self.state() == ConnectionState::Connected || self.buffering_enabled()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn set_buffering(&self, enabled: bool) {
        self.buffering.store(enabled, Ordering::Release);
    }
}

/// Commands processed by the worker thread.
#[derive(Debug)]
pub enum TransportCommand {
    Message(Vec<u8>),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

/// Subset of [`TransportConfig`] the worker needs at runtime.
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub endpoint: Endpoint,
    pub retry: RetryPolicy,
    pub capacity: usize,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub liveness_interval: Duration,
    pub warn_interval: Duration,
}

impl From<&TransportConfig> for WorkerSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            endpoint: Endpoint::new(config.host.clone(), config.port),
            retry: config.retry.clone(),
            capacity: config.capacity,
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
            liveness_interval: config.liveness_interval,
            warn_interval: config.warn_interval,
        }
    }
}

/// Spawn the worker thread. The first connection attempt starts immediately.
pub fn spawn_worker(
    settings: WorkerSettings,
    connector: Arc<dyn Connector>,
    events: EventHub,
    status: Arc<LinkStatus>,
) -> io::Result<(Sender<TransportCommand>, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(settings.capacity);
    let manager = ConnectionManager::new(settings, connector, events, status);
    let handle = thread::Builder::new()
        .name("loggly-transport".into())
        .spawn(move || manager.run(rx))?;
    Ok((tx, handle))
}

pub(crate) struct ConnectionManager {
    settings: WorkerSettings,
    connector: Arc<dyn Connector>,
    events: EventHub,
    status: Arc<LinkStatus>,
    connection: Option<ActiveConnection>,
    backoff: BackoffState,
    buffer: PendingBuffer,
    reconnect_at: Option<Instant>,
    last_probe: Instant,
    warner: RateLimitedWarner,
}

impl ConnectionManager {
    pub(crate) fn new(
        settings: WorkerSettings,
        connector: Arc<dyn Connector>,
        events: EventHub,
        status: Arc<LinkStatus>,
    ) -> Self {
        Self {
            backoff: BackoffState::new(settings.retry.clone()),
            warner: RateLimitedWarner::new(settings.warn_interval),
            settings,
            connector,
            events,
            status,
            connection: None,
            buffer: PendingBuffer::new(),
            reconnect_at: None,
            last_probe: Instant::now(),
        }
    }

    pub(crate) fn run(mut self, rx: Receiver<TransportCommand>) {
        self.connect();
        loop {
            self.reconnect_if_due();
            self.probe_if_due();
            match rx.recv_timeout(self.next_wakeup()) {
                Ok(TransportCommand::Message(message)) => self.send(message),
                Ok(TransportCommand::Flush(ack)) => self.handle_flush(ack),
                Ok(TransportCommand::Shutdown(ack)) => {
                    self.drain_pending(&rx);
                    self.handle_flush(ack);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.finish();
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("loggly transport {} -> {state:?}", self.settings.endpoint);
        self.status.set_state(state);
    }

    fn connect(&mut self) {
        self.reconnect_at = None;
        self.set_state(ConnectionState::Connecting);
        let result = self
            .connector
            .connect(&self.settings.endpoint, self.settings.connect_timeout)
            .and_then(|stream| ActiveConnection::new(stream, self.settings.write_timeout));
        match result {
            Ok(connection) => self.on_connected(connection),
            Err(err) => self.on_stream_error(&err),
        }
    }

    fn on_connected(&mut self, connection: ActiveConnection) {
        self.connection = Some(connection);
        self.last_probe = Instant::now();
        self.backoff.record_success();
        self.buffer.enable();
        self.status.set_buffering(true);
        self.set_state(ConnectionState::Connected);
        self.events.emit(TransportEvent::connected(format!(
            "connected to {}",
            self.settings.endpoint
        )));
        self.flush_buffer();
    }

    fn flush_buffer(&mut self) {
        let Some(batch) = self.buffer.take() else {
            return;
        };
        let Some(connection) = self.connection.as_mut() else {
            self.buffer.restore(batch);
            return;
        };
        match connection.write_all(batch.as_bytes()) {
            Ok(()) => debug!(
                "loggly transport flushed {} buffered messages",
                batch.messages()
            ),
            Err(err) => {
                self.buffer.restore(batch);
                self.on_stream_error(&err);
            }
        }
    }

    /// Stream failure: count it, maybe stop buffering, retry after the delay.
    fn on_stream_error(&mut self, err: &io::Error) {
        self.connection = None;
        self.set_state(ConnectionState::Disconnected);
        self.events.emit(TransportEvent::error(format!(
            "{}: {err}",
            self.settings.endpoint
        )));
        let delay = self.backoff.record_failure();
        if self.backoff.exhausted() && self.buffer.disable() {
            self.status.set_buffering(false);
            self.events.emit(TransportEvent::error(format!(
                "maximum reconnection attempts ({}) reached; buffering disabled",
                self.settings.retry.maximum_attempts
            )));
        }
        debug!(
            "loggly transport retrying in {delay:?} after {} failed attempts",
            self.backoff.total_retries()
        );
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Peer closed the stream: reconnect straight away, outside the backoff.
    fn on_stream_end(&mut self) {
        self.connection = None;
        self.set_state(ConnectionState::Disconnected);
        self.events.emit(TransportEvent::error(format!(
            "connection to {} ended",
            self.settings.endpoint
        )));
        self.reconnect_at = Some(Instant::now());
    }

    fn reconnect_if_due(&mut self) {
        if self.connection.is_some() {
            return;
        }
        if self
            .reconnect_at
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            self.connect();
        }
    }

    fn probe_if_due(&mut self) {
        if self.last_probe.elapsed() < self.settings.liveness_interval {
            return;
        }
        self.last_probe = Instant::now();
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        match connection.probe() {
            Liveness::Open => {}
            Liveness::Ended => self.on_stream_end(),
            Liveness::Failed(err) => self.on_stream_error(&err),
        }
    }

    fn next_wakeup(&self) -> Duration {
        let now = Instant::now();
        if self.connection.is_some() {
            return (self.last_probe + self.settings.liveness_interval).saturating_duration_since(now);
        }
        self.reconnect_at
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(self.settings.liveness_interval)
    }

    fn send(&mut self, message: Vec<u8>) {
        let Some(connection) = self.connection.as_mut() else {
            self.retain(&message);
            return;
        };
        if let Err(err) = connection.write_all(&message) {
            self.retain(&message);
            self.on_stream_error(&err);
        }
    }

    fn retain(&mut self, message: &[u8]) {
        if !self.buffer.push(message) {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("loggly transport dropped {count} messages while buffering is disabled");
            });
        }
    }

    fn handle_flush(&mut self, ack: Sender<()>) {
        if let Some(connection) = self.connection.as_mut()
            && let Err(err) = connection.flush()
        {
            self.on_stream_error(&err);
        }
        // The requester may have timed out already.
        let _ = ack.send(());
    }

    fn drain_pending(&mut self, rx: &Receiver<TransportCommand>) {
        loop {
            match rx.try_recv() {
                Ok(TransportCommand::Message(message)) => self.send(message),
                Ok(TransportCommand::Flush(ack)) | Ok(TransportCommand::Shutdown(ack)) => {
                    let _ = ack.send(());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn finish(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                "loggly transport closed with {} undelivered messages",
                self.buffer.len()
            );
        }
        self.warner.flush(|count| {
            warn!("loggly transport dropped {count} messages while buffering is disabled");
        });
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Enqueue an encoded message without blocking.
///
/// Returns `false` when the queue is full or the worker has gone away; the
/// drop is counted and reported through `warner`.
pub fn enqueue_message(
    tx: &Sender<TransportCommand>,
    message: Vec<u8>,
    warner: &RateLimitedWarner,
) -> bool {
    match tx.try_send(TransportCommand::Message(message)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("loggly transport queue full; dropped {count} messages");
            });
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            warner.record_drop();
            warner.warn_if_due(|count| {
                warn!("loggly transport worker stopped; dropped {count} messages");
            });
            false
        }
    }
}

/// Ask the worker to flush and wait for its acknowledgement.
pub fn flush_queue(tx: &Sender<TransportCommand>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let (ack_tx, ack_rx) = bounded(1);
    if tx
        .send_timeout(TransportCommand::Flush(ack_tx), timeout)
        .is_err()
    {
        return false;
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    ack_rx.recv_timeout(remaining).is_ok()
}
