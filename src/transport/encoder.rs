//! RFC 5424 line encoding.
//!
//! Each record becomes
//! `<PRI>1 TIMESTAMP HOSTNAME PROGRAM PID - [TOKEN@41058 tag="..."] BODY\r\n`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    formatter::{Metadata, SharedFormatter},
    level::Severity,
};

/// Syslog protocol version written after the PRI field.
pub const SYSLOG_VERSION: u8 = 1;
/// Private enterprise number Loggly assigns to its structured-data element.
pub const LOGGLY_ENTERPRISE_ID: u32 = 41058;
/// RFC 5424 placeholder for an absent header field.
pub const NIL_VALUE: &str = "-";

const MAX_HOSTNAME_LEN: usize = 255;
const MAX_APP_NAME_LEN: usize = 48;
const MAX_PROCID_LEN: usize = 128;

/// Structured-data element carrying the customer token and tags.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredData(String);

impl StructuredData {
    /// Build the element. `token` is used verbatim as the SD-ID;
    /// [`TransportConfig::validate`](super::TransportConfig::validate) rejects
    /// tokens that would break it. Tag values are escaped.
    pub fn new<S: AsRef<str>>(token: &str, tags: &[S]) -> Self {
        let mut element = format!("[{token}@{LOGGLY_ENTERPRISE_ID}");
        for tag in tags {
            element.push_str(" tag=\"");
            escape_param_value(tag.as_ref(), &mut element);
            element.push('"');
        }
        element.push(']');
        Self(element)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructuredData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_param_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | ']') {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Render a header token: printable ASCII only, `-` when empty.
fn header_token(value: &str, max_len: usize) -> String {
    let token: String = value
        .chars()
        .take(max_len)
        .map(|ch| if ch.is_ascii_graphic() { ch } else { '_' })
        .collect();
    if token.is_empty() {
        NIL_VALUE.to_owned()
    } else {
        token
    }
}

/// RFC 3339 UTC timestamp with millisecond precision.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encodes records into wire lines. Header fields are resolved once.
#[derive(Clone, Debug)]
pub struct MessageEncoder {
    hostname: String,
    program: String,
    pid: String,
    structured_data: StructuredData,
    formatter: SharedFormatter,
}

impl MessageEncoder {
    pub fn new(
        hostname: &str,
        program: &str,
        pid: u32,
        structured_data: StructuredData,
        formatter: SharedFormatter,
    ) -> Self {
        Self {
            hostname: header_token(hostname, MAX_HOSTNAME_LEN),
            program: header_token(program, MAX_APP_NAME_LEN),
            pid: header_token(&pid.to_string(), MAX_PROCID_LEN),
            structured_data,
            formatter,
        }
    }

    pub fn structured_data(&self) -> &StructuredData {
        &self.structured_data
    }

    /// Encode a record stamped with the current time.
    pub fn encode(&self, severity: Severity, message: &str, metadata: &Metadata) -> Vec<u8> {
        self.encode_at(severity, message, metadata, Utc::now())
    }

    /// Encode a record with an explicit timestamp.
    pub fn encode_at(
        &self,
        severity: Severity,
        message: &str,
        metadata: &Metadata,
        timestamp: DateTime<Utc>,
    ) -> Vec<u8> {
        let body = self.formatter.format(message, metadata);
        format!(
            "<{}>{} {} {} {} {} {} {} {}\r\n",
            severity.priority(),
            SYSLOG_VERSION,
            format_timestamp(timestamp),
            self.hostname,
            self.program,
            self.pid,
            NIL_VALUE,
            self.structured_data,
            body,
        )
        .into_bytes()
    }
}
