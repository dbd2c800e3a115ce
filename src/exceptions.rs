//! Forward uncaught panics to a transport.

use std::{
    any::Any,
    panic::{self, PanicHookInfo},
    sync::Arc,
    thread,
};

use serde_json::{Value, json};

use crate::{
    formatter::Metadata,
    transport::{LogTransport, LogglyTransport},
};

const WORKER_THREAD: &str = "loggly-transport";

/// Chain a panic hook that logs each panic at `error` and flushes.
///
/// Does nothing and returns `false` unless the transport was configured to
/// handle exceptions. The hook holds a weak reference, so it stops forwarding
/// once the transport is dropped; the previous hook always runs afterwards.
pub fn install_exception_handler(transport: &Arc<LogglyTransport>) -> bool {
    if !transport.handles_exceptions() {
        return false;
    }
    let transport = Arc::downgrade(transport);
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let current = thread::current();
        let thread_name = current.name().unwrap_or("<unnamed>");
        if thread_name != WORKER_THREAD
            && let Some(transport) = transport.upgrade()
        {
            let message = Value::String(payload_text(info.payload()));
            transport.log("error", &message, Some(panic_metadata(info, thread_name)));
            transport.flush();
        }
        previous(info);
    }));
    true
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

fn panic_metadata(info: &PanicHookInfo<'_>, thread_name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("panic".into(), json!(true));
    metadata.insert("thread".into(), json!(thread_name));
    if let Some(location) = info.location() {
        metadata.insert(
            "location".into(),
            json!(format!(
                "{}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            )),
        );
    }
    metadata
}
