//! In-memory retention of encoded messages while the stream is down.

/// Ordered batch of encoded wire messages awaiting a connection.
///
/// Messages are stored back to back exactly as they will be written, so a
/// flush is a single write of the accumulated bytes.
#[derive(Debug)]
pub struct PendingBuffer {
    bytes: Vec<u8>,
    messages: usize,
    enabled: bool,
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            messages: 0,
            enabled: true,
        }
    }
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message`, returning `false` when buffering is disabled.
    pub fn push(&mut self, message: &[u8]) -> bool {
        if !self.enabled {
            return false;
        }
        self.bytes.extend_from_slice(message);
        self.messages += 1;
        true
    }

    /// Stop accepting new messages. Existing contents are kept.
    ///
    /// Returns `true` only for the call that actually disabled buffering.
    pub fn disable(&mut self) -> bool {
        std::mem::replace(&mut self.enabled, false)
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_empty(&self) -> bool {
        self.messages == 0
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.messages
    }

    /// Number of buffered bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Take every buffered message as one contiguous batch, leaving the
    /// buffer empty.
    pub fn take(&mut self) -> Option<Batch> {
        if self.messages == 0 {
            return None;
        }
        let messages = std::mem::take(&mut self.messages);
        Some(Batch {
            bytes: std::mem::take(&mut self.bytes),
            messages,
        })
    }

    /// Put a batch that could not be written back in front of anything
    /// buffered since it was taken. Ignores the enabled flag.
    pub fn restore(&mut self, batch: Batch) {
        let mut bytes = batch.bytes;
        bytes.append(&mut self.bytes);
        self.bytes = bytes;
        self.messages += batch.messages;
    }
}

/// A flushed run of buffered messages.
#[derive(Debug, PartialEq, Eq)]
pub struct Batch {
    bytes: Vec<u8>,
    messages: usize,
}

impl Batch {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn messages(&self) -> usize {
        self.messages
    }
}
