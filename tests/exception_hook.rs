//! Panics are forwarded when exception handling is enabled.

mod test_utils;

use std::{sync::Arc, thread};

use loggly_tls::install_exception_handler;
use rstest::rstest;
use serde_json::Value;
use test_utils::{CollectorServer, transport_for};

#[rstest]
fn panic_is_logged_at_error_with_location() {
    let server = CollectorServer::start(false);
    let transport = Arc::new(
        transport_for(&server)
            .with_handle_exceptions(true)
            .build()
            .expect("transport starts"),
    );
    assert!(install_exception_handler(&transport));

    let result = thread::Builder::new()
        .name("doomed".into())
        .spawn(|| panic!("worker exploded"))
        .expect("spawn thread")
        .join();
    assert!(result.is_err());

    let line = server.recv().line;
    assert!(line.starts_with("<11>1 "), "unexpected line {line}");
    let (_, body) = line.split_once("] ").expect("structured data precedes body");
    let body: Value = serde_json::from_str(body).expect("json body");
    assert_eq!(body["log_msg"], "worker exploded");
    assert_eq!(body["thread"], "doomed");
    assert_eq!(body["panic"], true);
    assert!(
        body["location"]
            .as_str()
            .is_some_and(|loc| loc.contains("exception_hook.rs"))
    );
}
