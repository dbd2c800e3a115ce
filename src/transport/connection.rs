//! Stream primitives for the transport: TLS connector and the live stream.

use std::{
    fmt,
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::TlsStream;

/// Host and port of the collection endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// TLS connection options.
///
/// Certificate and hostname validation are off unless `verify_certificates`
/// is set; self-signed endpoints are accepted by default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the handshake; defaults to the host.
    pub domain: Option<String>,
    /// Validate the certificate chain and hostname when true.
    pub verify_certificates: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<native_tls::TlsConnector> {
        let mut builder = native_tls::TlsConnector::builder();
        if !self.verify_certificates {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Byte stream the worker writes wire messages to.
pub trait StreamIo: Read + Write + Send {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;
}

impl StreamIo for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

impl StreamIo for TlsStream<TcpStream> {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.get_ref().set_read_timeout(timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.get_ref().set_write_timeout(timeout)
    }
}

/// Opens streams to the collection endpoint.
///
/// The worker calls [`Connector::connect`] for every connection attempt and
/// never holds more than one stream at a time.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Box<dyn StreamIo>>;
}

impl fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connector(..)")
    }
}

/// Connector establishing TLS sessions with native-tls.
#[derive(Clone, Debug, Default)]
pub struct TlsConnector {
    options: TlsOptions,
}

impl TlsConnector {
    pub fn new(options: TlsOptions) -> Self {
        Self { options }
    }
}

impl Connector for TlsConnector {
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Box<dyn StreamIo>> {
        let stream = connect_tcp(endpoint, timeout)?;
        let connector = self.options.connector()?;
        let domain = self
            .options
            .domain
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(endpoint.host.as_str());
        // Bound the handshake by the connect timeout, then clear it.
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let stream = connector
            .connect(domain, stream)
            .map_err(io::Error::other)?;
        let tcp_ref = stream.get_ref();
        tcp_ref.set_read_timeout(None)?;
        tcp_ref.set_write_timeout(None)?;
        Ok(Box::new(stream))
    }
}

/// Open a TCP stream to the first reachable address of `endpoint`.
pub fn connect_tcp(endpoint: &Endpoint, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in endpoint.socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {endpoint}"),
        )
    }))
}

/// Outcome of checking whether the peer is still there.
#[derive(Debug)]
pub enum Liveness {
    Open,
    Ended,
    Failed(io::Error),
}

/// Read timeout used when probing the stream for a peer close.
const PROBE_TIMEOUT: Duration = Duration::from_millis(5);

/// The single live stream owned by the worker.
pub struct ActiveConnection {
    stream: Box<dyn StreamIo>,
}

impl ActiveConnection {
    pub fn new(stream: Box<dyn StreamIo>, write_timeout: Duration) -> io::Result<Self> {
        stream.set_write_timeout(Some(write_timeout))?;
        stream.set_read_timeout(Some(PROBE_TIMEOUT))?;
        Ok(Self { stream })
    }

    /// Write a full buffer and flush it to the socket.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }

    /// Probe for an orderly close or a failure without blocking for long.
    ///
    /// The endpoint never sends application data, so any bytes read are
    /// discarded.
    pub fn probe(&mut self) -> Liveness {
        let mut scratch = [0u8; 256];
        match self.stream.read(&mut scratch) {
            Ok(0) => Liveness::Ended,
            Ok(_) => Liveness::Open,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Liveness::Open
            }
            Err(err) => Liveness::Failed(err),
        }
    }
}

impl fmt::Debug for ActiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConnection").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_options_skip_verification() {
        let options = TlsOptions::default();
        assert!(!options.verify_certificates);
        assert!(options.domain.is_none());
        assert!(options.connector().is_ok());
    }

    #[rstest]
    fn strict_options_build_a_connector() {
        let options = TlsOptions {
            domain: Some("logs.example".into()),
            verify_certificates: true,
        };
        assert!(options.connector().is_ok());
    }

    #[rstest]
    fn endpoint_displays_host_and_port() {
        let endpoint = Endpoint::new("logs-01.loggly.com", 6514);
        assert_eq!(endpoint.to_string(), "logs-01.loggly.com:6514");
    }
}
