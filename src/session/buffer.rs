//! Buffer of outgoing bytes awaiting acknowledgment.

use std::collections::VecDeque;

/// Ordered queue of bytes pulled from the driver but not yet acknowledged.
///
/// Bytes are only removed by [`OutgoingBuffer::consume`], which the session
/// calls after a validated ACK. Peeking never removes anything; that is what
/// lets a retransmission resend the same bytes.
#[derive(Debug, Default, Clone)]
pub struct OutgoingBuffer {
    bytes: VecDeque<u8>,
}

impl OutgoingBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes at the back.
    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    /// Copy up to `max` bytes from the front without removing them.
    pub fn peek(&self, max: usize) -> Vec<u8> {
        self.bytes.iter().take(max).copied().collect()
    }

    /// Remove up to `count` bytes from the front.
    ///
    /// Returns the number of bytes actually removed.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.bytes.len());
        self.bytes.drain(..count);
        count
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
