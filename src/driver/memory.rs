//! In-memory driver.
//!
//! Bytes queued with [`MemoryDriver::push`] are handed to the session on its
//! next poll; bytes the session delivers are collected for inspection. Useful
//! for embedding the session in programs that already own their I/O, and for
//! tests.

use std::collections::VecDeque;

use crate::core::Driver;

/// Driver backed by plain buffers.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    /// Application bytes not yet pulled by the session.
    outgoing: VecDeque<u8>,
    /// Set once the application has no more data.
    finished: bool,
    /// Payload delivered by the session.
    delivered: Vec<u8>,
    /// Number of `close` calls seen.
    close_count: usize,
}

impl MemoryDriver {
    /// Create an empty driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue application bytes for the session to send.
    pub fn push(&mut self, data: &[u8]) {
        self.outgoing.extend(data);
    }

    /// Mark the application side as exhausted.
    ///
    /// Bytes already queued are still handed out; after that `pull` reports
    /// exhaustion.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes queued but not yet pulled.
    pub fn pending(&self) -> usize {
        self.outgoing.len()
    }

    /// Payload delivered so far.
    pub fn delivered(&self) -> &[u8] {
        &self.delivered
    }

    /// Number of times the session asked to close.
    pub fn close_count(&self) -> usize {
        self.close_count
    }

    /// Check if the session asked to close.
    pub fn is_closed(&self) -> bool {
        self.close_count > 0
    }
}

impl Driver for MemoryDriver {
    fn pull(&mut self, max_length: usize) -> Option<Vec<u8>> {
        if self.outgoing.is_empty() && self.finished {
            return None;
        }
        let count = max_length.min(self.outgoing.len());
        Some(self.outgoing.drain(..count).collect())
    }

    fn deliver(&mut self, data: &[u8]) {
        self.delivered.extend_from_slice(data);
    }

    fn close(&mut self) {
        self.close_count += 1;
    }
}
