//! Protocol constants for the tunnel session layer.
//!
//! Wire values are fixed by the protocol and MUST NOT be changed; the timing
//! values are defaults that [`crate::session::SessionConfig`] may override.

use std::time::Duration;

// =============================================================================
// PACKET TYPES
// =============================================================================

/// Connection open.
pub const PACKET_TYPE_SYN: u8 = 0x00;

/// Data segment (SEQ + ACK + payload).
pub const PACKET_TYPE_MSG: u8 = 0x01;

/// Connection close.
pub const PACKET_TYPE_FIN: u8 = 0x02;

/// Liveness check.
pub const PACKET_TYPE_PING: u8 = 0xFF;

// =============================================================================
// CODEC OPTIONS
// =============================================================================

/// SYN carries a NUL-terminated session name after the options field.
pub const OPT_NAME: u16 = 0x0001;

// =============================================================================
// SIZES
// =============================================================================

/// Common header: packet type + session id.
pub const PACKET_HEADER_SIZE: usize = 1 + 2;

/// SYN header: common header + seq + options.
pub const SYN_HEADER_SIZE: usize = PACKET_HEADER_SIZE + 2 + 2;

/// MSG header: common header + seq + ack.
pub const MSG_HEADER_SIZE: usize = PACKET_HEADER_SIZE + 2 + 2;

/// Largest number of unacknowledged bytes a session will buffer.
///
/// ACK deltas are computed modulo 2^16, so anything beyond this would make a
/// delta ambiguous.
pub const MAX_OUTSTANDING: usize = u16::MAX as usize;

// =============================================================================
// TIMING
// =============================================================================

/// Minimum delay between two transmissions of the same session.
pub const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(1000);

// =============================================================================
// SESSION
// =============================================================================

/// Reason string carried by every FIN this endpoint emits.
pub const FIN_REASON: &str = "Stream closed";
