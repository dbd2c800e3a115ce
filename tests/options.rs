//! Building transports from a configuration object.

mod test_utils;

use std::sync::Arc;

use loggly_tls::{ConfigError, LogTransport, Severity, TransportBuilder, TransportOptions};
use rstest::rstest;
use serde_json::json;
use test_utils::{CollectorServer, PlainTcpConnector};

#[rstest]
fn options_drive_a_running_transport() {
    let server = CollectorServer::start(false);
    let options = TransportOptions::from_json(
        &json!({
            "token": "OPT",
            "host": server.addr().ip().to_string(),
            "port": server.addr().port(),
            "hostname": "opt-host",
            "program": "opt",
            "pid": 12,
            "level": "notice",
            "handleExceptions": true,
            "tags": ["x", "y"]
        })
        .to_string(),
    )
    .expect("options parse");

    let transport = TransportBuilder::from(options)
        .with_connector(Arc::new(PlainTcpConnector))
        .build()
        .expect("transport starts");
    assert_eq!(transport.level(), Severity::Notice);
    assert!(transport.handles_exceptions());
    assert_eq!(transport.structured_data().as_str(), r#"[OPT@41058 tag="x" tag="y"]"#);

    transport.log("crit", &json!("disk gone"), None);
    assert!(transport.flush());
    let line = server.recv().line;
    assert!(line.starts_with("<10>1 "));
    assert!(line.contains(r#" opt-host opt 12 - [OPT@41058 tag="x" tag="y"] "#));
}

#[rstest]
fn unknown_level_name_defaults_to_info() {
    let options = TransportOptions::from_json(r#"{"token":"t","level":"loud"}"#)
        .expect("options parse");
    let config = options.into_builder().build_config().expect("valid config");
    assert_eq!(config.level, Severity::Info);
}

#[rstest]
fn missing_token_fails_construction() {
    let err = TransportOptions::from_json("{}")
        .expect("options parse")
        .into_builder()
        .build()
        .expect_err("token must be required");
    assert!(matches!(err, ConfigError::MissingToken));
}
