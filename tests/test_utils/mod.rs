pub mod collector;

pub use collector::{CollectorServer, PlainTcpConnector, Received, transport_for};
