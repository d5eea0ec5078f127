//! Session configuration.

use std::time::Duration;

use crate::core::constants::RETRANSMIT_INTERVAL;

/// Settings shared by every session a process creates.
///
/// Passed explicitly to [`crate::session::Session::new`]; there is no global
/// state.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed initial sequence number instead of a random one.
    ///
    /// Predictable sequence numbers make spoofed packets easier to forge; use
    /// this for debugging only.
    pub isn: Option<u16>,
    /// Log every produced and consumed packet on the
    /// `tunnel_session::trace` target.
    pub packet_trace: bool,
    /// Minimum delay between two transmissions.
    pub retransmit_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            isn: None,
            packet_trace: false,
            retransmit_interval: RETRANSMIT_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed initial sequence number.
    pub fn with_isn(mut self, isn: u16) -> Self {
        self.isn = Some(isn);
        self
    }

    /// Enable or disable packet tracing.
    pub fn with_packet_trace(mut self, enabled: bool) -> Self {
        self.packet_trace = enabled;
        self
    }

    /// Override the retransmission interval.
    pub fn with_retransmit_interval(mut self, interval: Duration) -> Self {
        self.retransmit_interval = interval;
        self
    }
}
