//! Retransmission gate.
//!
//! A fixed-interval timer: a session may transmit once at least
//! `interval` has passed since its previous transmission. Incoming data does
//! not reset it, so every permitted tick simply re-sends whatever the current
//! state calls for.

use std::time::{Duration, Instant};

/// Elapsed-time check gating outgoing packets.
#[derive(Debug, Clone)]
pub struct RetransmitGate {
    /// Minimum time between transmissions.
    interval: Duration,
    /// Time of the last transmission, `None` before the first one.
    last_transmit: Option<Instant>,
}

impl RetransmitGate {
    /// Create a gate that is open until the first transmission.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_transmit: None,
        }
    }

    /// Check whether a transmission is permitted at `now`.
    pub fn permits(&self, now: Instant) -> bool {
        match self.last_transmit {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Record a transmission at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_transmit = Some(now);
    }

    /// Time until the gate opens again, measured from `now`.
    pub fn time_until_open(&self, now: Instant) -> Duration {
        match self.last_transmit {
            Some(last) => self
                .interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}
