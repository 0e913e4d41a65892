//! Reply framing — turns arbitrarily-sized transport fragments into
//! complete device replies.
//!
//! A reply is complete when the accumulated bytes end with
//! [`TERMINATOR`] (`"\r\nok\r\n"`, `ok` matched case-insensitively).
//! Bytes are kept raw until then so that a multibyte character split
//! across two notifications still decodes correctly.

use crate::error::FrameError;

/// Sequence marking the end of one device reply.
pub const TERMINATOR: &[u8] = b"\r\nok\r\n";

/// Default upper bound for a single reply, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4096;

/// One complete device reply, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    text: String,
}

impl RawMessage {
    /// Wrap an already-complete reply text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The full reply, including the terminator.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The reply body: trailing terminator removed, surrounding whitespace
    /// trimmed.
    #[must_use]
    pub fn body(&self) -> &str {
        let text = self.text.as_str();
        let cut = text.len().saturating_sub(TERMINATOR.len());
        let stripped = match text.get(cut..) {
            Some(tail) if tail.as_bytes().eq_ignore_ascii_case(TERMINATOR) => &text[..cut],
            _ => text,
        };
        stripped.trim()
    }

    /// Consume the message, returning the full text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Accumulates fragments until a terminator is seen.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_len: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameBuffer {
    /// Create an empty buffer that refuses replies longer than `max_len`.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Append a fragment and return the reply if it is now complete.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Overflow`] when the accumulated reply would
    /// exceed the configured limit. The partial reply is discarded.
    pub fn feed(&mut self, fragment: &[u8]) -> Result<Option<RawMessage>, FrameError> {
        if self.buf.len() + fragment.len() > self.max_len {
            tracing::warn!(
                buffered = self.buf.len(),
                incoming = fragment.len(),
                limit = self.max_len,
                "reply overflowed frame buffer, discarding"
            );
            self.buf.clear();
            return Err(FrameError::Overflow {
                limit: self.max_len,
            });
        }

        self.buf.extend_from_slice(fragment);

        if !self.is_terminated() {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        tracing::trace!(len = bytes.len(), "complete reply framed");
        Ok(Some(RawMessage { text }))
    }

    /// Drop any partially accumulated reply.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            tracing::debug!(discarded = self.buf.len(), "frame buffer reset");
        }
        self.buf.clear();
    }

    /// Number of bytes waiting for a terminator.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    fn is_terminated(&self) -> bool {
        self.buf.len() >= TERMINATOR.len()
            && self.buf[self.buf.len() - TERMINATOR.len()..].eq_ignore_ascii_case(TERMINATOR)
    }
}
