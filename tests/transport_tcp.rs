//! End-to-end behaviour against a local TCP collector.

mod test_utils;

use std::{sync::mpsc, time::Duration};

use loggly_tls::{LogOutcome, TransportEvent};
use rstest::rstest;
use serde_json::{Value, json};
use test_utils::{CollectorServer, transport_for};

fn body(line: &str) -> Value {
    let (_, body) = line.split_once("] ").expect("structured data precedes body");
    serde_json::from_str(body).expect("json body")
}

#[rstest]
fn delivers_lines_in_order() {
    let server = CollectorServer::start(false);
    let transport = transport_for(&server).build().expect("transport starts");

    for level in ["emerg", "info", "debug"] {
        let outcome = transport.log(level, &json!(format!("{level} line")), None);
        assert_eq!(outcome, LogOutcome::Accepted);
    }
    assert!(transport.flush());

    let received = server.recv_n(3);
    let prefixes: Vec<_> = received.iter().map(|r| &r.line[..4]).collect();
    assert_eq!(prefixes, ["<8>1", "<14>", "<15>"]);
    for r in &received {
        assert!(
            r.line.contains(" it-host it 99 - [TOKEN@41058 tag=\"it\"] "),
            "unexpected header in {}",
            r.line
        );
    }
    assert_eq!(body(&received[1].line), json!({"log_msg": "info line"}));
}

#[rstest]
fn non_string_messages_are_serialised() {
    let server = CollectorServer::start(false);
    let transport = transport_for(&server).build().expect("transport starts");

    transport.log("info", &json!({"id": 3}), None);
    transport.log("info", &Value::Null, Some(json!({"k": 1}).as_object().cloned().unwrap_or_default()));
    assert!(transport.flush());

    let received = server.recv_n(2);
    assert_eq!(body(&received[0].line), json!({"log_msg": "{\"id\":3}"}));
    assert_eq!(body(&received[1].line), json!({"k": 1}));
}

#[rstest]
fn reconnects_immediately_after_peer_hang_up() {
    let server = CollectorServer::start(true);
    let (events_tx, events_rx) = mpsc::channel();
    let transport = transport_for(&server)
        .with_connection_delay_ms(5_000)
        .with_max_delay_between_reconnection_ms(5_000)
        .with_observer(move |event| {
            let _ = events_tx.send(event.clone());
        })
        .build()
        .expect("transport starts");

    let mut connects = 0;
    let mut errors = Vec::new();
    while connects < 2 {
        match events_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("reconnect should not wait for the backoff delay")
        {
            TransportEvent::Connected { .. } => connects += 1,
            TransportEvent::Error { description } => errors.push(description),
        }
    }
    assert!(errors.iter().any(|e| e.ends_with("ended")), "{errors:?}");

    transport.log("notice", &json!("after hang-up"), None);
    assert!(transport.flush());
    let received = server.recv();
    assert_eq!(received.connection, 1);
    assert!(received.line.starts_with("<13>1 "));
}

#[rstest]
fn close_delivers_everything_queued() {
    let server = CollectorServer::start(false);
    let mut transport = transport_for(&server).build().expect("transport starts");

    for n in 0..50 {
        transport.log("info", &json!(format!("line {n}")), None);
    }
    transport.close();

    let received = server.recv_n(50);
    for (n, r) in received.iter().enumerate() {
        assert_eq!(body(&r.line)["log_msg"], format!("line {n}"));
    }
}

#[rstest]
fn custom_formatter_controls_body() {
    let server = CollectorServer::start(false);
    let transport = transport_for(&server)
        .with_formatter(|message: &str, metadata: &serde_json::Map<String, Value>| {
            format!("{message} ({} fields)", metadata.len())
        })
        .build()
        .expect("transport starts");

    let metadata = json!({"a": 1, "b": 2}).as_object().cloned();
    transport.log("info", &json!("plain"), metadata);
    assert!(transport.flush());
    assert!(server.recv().line.ends_with("] plain (2 fields)"));
}

#[rstest]
fn inline_meta_appends_metadata_to_message() {
    let server = CollectorServer::start(false);
    let transport = transport_for(&server)
        .with_inline_meta(true)
        .build()
        .expect("transport starts");

    transport.log("info", &json!("user login"), json!({"user": "ann"}).as_object().cloned());
    assert!(transport.flush());
    assert!(
        server
            .recv()
            .line
            .ends_with(r#"] user login {"user":"ann"}"#)
    );
}
