//! Compatibility bridge for the Rust `log` crate.
//!
//! [`LogBridge`] implements `log::Log` and forwards records to any
//! [`LogTransport`]. Records emitted by this crate's own diagnostics are
//! skipped so a failing connection cannot feed its warnings back into itself.

use std::sync::{Arc, OnceLock};

use log::{Metadata, Record};
use serde_json::{Value, json};

use crate::{formatter, level::Severity, transport::LogTransport};

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Adapter implementing the Rust `log::Log` trait.
pub struct LogBridge {
    transport: Arc<dyn LogTransport>,
}

impl LogBridge {
    pub fn new(transport: Arc<dyn LogTransport>) -> Self {
        Self { transport }
    }
}

fn map_log_level(level: log::Level) -> Severity {
    match level {
        log::Level::Trace | log::Level::Debug => Severity::Debug,
        log::Level::Info => Severity::Info,
        log::Level::Warn => Severity::Warning,
        log::Level::Error => Severity::Error,
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        map_log_level(level)
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

fn record_metadata(record: &Record<'_>) -> formatter::Metadata {
    let mut metadata = formatter::Metadata::new();
    metadata.insert("target".into(), json!(record.target()));
    if let Some(module_path) = record.module_path() {
        metadata.insert("module_path".into(), json!(module_path));
    }
    if let Some(file) = record.file() {
        metadata.insert("file".into(), json!(file));
    }
    if let Some(line) = record.line() {
        metadata.insert("line".into(), json!(line));
    }
    metadata
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        !is_own_target(metadata.target())
            && self
                .transport
                .level()
                .allows(Severity::from(metadata.level()))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let severity = Severity::from(record.level());
        let message = Value::String(record.args().to_string());
        self.transport
            .log(severity.as_str(), &message, Some(record_metadata(record)));
    }

    fn flush(&self) {
        self.transport.flush();
    }
}

static BRIDGE: OnceLock<LogBridge> = OnceLock::new();

/// Install a bridge to `transport` as the global Rust logger.
///
/// Returns `false` when a bridge or another global logger is already set.
pub fn install(transport: Arc<dyn LogTransport>) -> bool {
    if BRIDGE.set(LogBridge::new(transport)).is_err() {
        return false;
    }
    let Some(bridge) = BRIDGE.get() else {
        return false;
    };
    if log::set_logger(bridge).is_err() {
        return false;
    }
    log::set_max_level(log::LevelFilter::Trace);
    true
}
