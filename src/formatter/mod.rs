//! Body formatters turning a message and its metadata into a syslog payload.
//!
//! Provides the [`LogFormatter`] trait alongside [`SharedFormatter`] for
//! dynamically dispatched formatters. Any `Fn(&str, &Metadata) -> String`
//! closure is a formatter, so callers can inject their own layout without
//! defining a type.

use std::{borrow::Cow, fmt, sync::Arc};

use serde_json::{Map, Value};

/// Structured key-value pairs attached to a log call.
pub type Metadata = Map<String, Value>;

/// Key under which the default formatter stores the message text.
pub const MESSAGE_KEY: &str = "log_msg";

/// Trait for rendering the body of a syslog line.
///
/// Implementors must be thread-safe (`Send + Sync`) because formatting runs
/// on the caller's thread while the formatter is shared by the transport.
pub trait LogFormatter: Send + Sync {
    /// Render `message` and `metadata` into a single payload string.
    fn format(&self, message: &str, metadata: &Metadata) -> String;
}

impl<F> LogFormatter for F
where
    F: Fn(&str, &Metadata) -> String + Send + Sync,
{
    fn format(&self, message: &str, metadata: &Metadata) -> String {
        self(message, metadata)
    }
}

/// Shared formatter trait object used by the transport.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn LogFormatter>,
}

impl SharedFormatter {
    /// Create a shared formatter from an owned formatter implementation.
    pub fn new<F>(formatter: F) -> Self
    where
        F: LogFormatter + 'static,
    {
        Self {
            inner: Arc::new(formatter),
        }
    }

    pub fn format(&self, message: &str, metadata: &Metadata) -> String {
        self.inner.format(message, metadata)
    }
}

impl Default for SharedFormatter {
    fn default() -> Self {
        Self::new(JsonFormatter::default())
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn LogFormatter>)")
    }
}

/// Default body formatter.
///
/// Produces one JSON object per record holding the metadata, with the message
/// stored under [`MESSAGE_KEY`] when it is non-empty. With `inline_meta` the
/// body becomes `message {metadata-json}` instead.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonFormatter {
    inline_meta: bool,
}

impl JsonFormatter {
    pub fn new(inline_meta: bool) -> Self {
        Self { inline_meta }
    }

    fn format_object(message: &str, metadata: &Metadata) -> String {
        let mut body = metadata.clone();
        if !message.is_empty() {
            body.insert(MESSAGE_KEY.to_owned(), Value::String(message.to_owned()));
        }
        Value::Object(body).to_string()
    }

    fn format_inline(message: &str, metadata: &Metadata) -> String {
        match (message.is_empty(), metadata.is_empty()) {
            (_, true) => message.to_owned(),
            (true, false) => Value::Object(metadata.clone()).to_string(),
            (false, false) => format!("{message} {}", Value::Object(metadata.clone())),
        }
    }
}

impl LogFormatter for JsonFormatter {
    fn format(&self, message: &str, metadata: &Metadata) -> String {
        if self.inline_meta {
            Self::format_inline(message, metadata)
        } else {
            Self::format_object(message, metadata)
        }
    }
}

/// Render a caller-supplied message value as text.
///
/// Strings pass through untouched, `null` becomes the empty (absent) message
/// and every other value is rendered as compact JSON, which is deterministic
/// because metadata maps keep their keys sorted.
pub fn message_text(message: &Value) -> Cow<'_, str> {
    match message {
        Value::String(text) => Cow::Borrowed(text.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("metadata must be an object"),
        }
    }

    #[rstest]
    fn json_formatter_injects_message() {
        let body = JsonFormatter::default().format("hello", &Metadata::new());
        let parsed: Value = serde_json::from_str(&body).expect("body is json");
        assert_eq!(parsed, json!({ "log_msg": "hello" }));
    }

    #[rstest]
    fn json_formatter_keeps_metadata_and_skips_empty_message() {
        let meta = metadata(json!({ "user": "ada", "attempt": 3 }));
        let body = JsonFormatter::default().format("", &meta);
        assert_eq!(body, r#"{"attempt":3,"user":"ada"}"#);
    }

    #[rstest]
    fn json_formatter_does_not_split_multiline_messages() {
        let body = JsonFormatter::default().format("one\ntwo", &Metadata::new());
        assert!(!body.contains('\n'));
        assert_eq!(body, r#"{"log_msg":"one\ntwo"}"#);
    }

    #[rstest]
    #[case("msg", json!({}), "msg")]
    #[case("", json!({ "a": 1 }), r#"{"a":1}"#)]
    #[case("msg", json!({ "a": 1 }), r#"msg {"a":1}"#)]
    fn inline_meta_layout(#[case] message: &str, #[case] meta: Value, #[case] expected: &str) {
        let body = JsonFormatter::new(true).format(message, &metadata(meta));
        assert_eq!(body, expected);
    }

    #[rstest]
    fn closures_are_formatters() {
        let formatter = SharedFormatter::new(|message: &str, meta: &Metadata| {
            format!("{message} ({} fields)", meta.len())
        });
        assert_eq!(formatter.format("hi", &Metadata::new()), "hi (0 fields)");
    }

    #[rstest]
    #[case(json!("text"), "text")]
    #[case(Value::Null, "")]
    #[case(json!(42), "42")]
    #[case(json!(true), "true")]
    #[case(json!({ "b": 2, "a": [1, 2] }), r#"{"a":[1,2],"b":2}"#)]
    fn message_values_render_deterministically(#[case] message: Value, #[case] expected: &str) {
        assert_eq!(message_text(&message), expected);
    }
}
