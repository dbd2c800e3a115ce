//! Local syslog collector used by the integration tests.
//!
//! The collector speaks plain TCP; [`PlainTcpConnector`] lets the transport
//! reach it without a TLS handshake.
#![allow(dead_code)]

use std::{
    io::{self, BufRead, BufReader},
    net::{SocketAddr, TcpListener},
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use loggly_tls::{
    Connector, Endpoint, LogglyTransport, StreamIo, TransportBuilder, connect_tcp,
};

/// Connects without TLS so tests can read the wire format directly.
pub struct PlainTcpConnector;

impl Connector for PlainTcpConnector {
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Box<dyn StreamIo>> {
        Ok(Box::new(connect_tcp(endpoint, timeout)?))
    }
}

/// One line read by the collector, tagged with the connection it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub connection: usize,
    pub line: String,
}

pub struct CollectorServer {
    addr: SocketAddr,
    lines: mpsc::Receiver<Received>,
}

impl CollectorServer {
    /// Accept connections forever, reading CRLF-terminated lines from each.
    ///
    /// When `hang_up_first` is set the first connection is closed as soon as
    /// it is accepted.
    pub fn start(hang_up_first: bool) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            for (connection, stream) in listener.incoming().enumerate() {
                let Ok(stream) = stream else { continue };
                if hang_up_first && connection == 0 {
                    drop(stream);
                    continue;
                }
                let tx = tx.clone();
                thread::spawn(move || {
                    for line in BufReader::new(stream).lines() {
                        let Ok(line) = line else { break };
                        let line = line.trim_end_matches('\r').to_owned();
                        if tx.send(Received { connection, line }).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        Self { addr, lines }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn recv(&self) -> Received {
        self.lines
            .recv_timeout(Duration::from_secs(3))
            .expect("collector should receive a line")
    }

    pub fn recv_n(&self, n: usize) -> Vec<Received> {
        (0..n).map(|_| self.recv()).collect()
    }
}

/// Builder pointed at `server` through the plain TCP connector.
pub fn transport_for(server: &CollectorServer) -> TransportBuilder {
    LogglyTransport::builder("TOKEN")
        .with_host(server.addr().ip().to_string())
        .with_port(server.addr().port())
        .with_hostname("it-host".into())
        .with_program("it".into())
        .with_pid(99)
        .with_tag("it")
        .with_connector(Arc::new(PlainTcpConnector))
        .with_liveness_interval_ms(10)
}
