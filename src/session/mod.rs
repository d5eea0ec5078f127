//! Session layer.
//!
//! Implements the reliability core of the tunnel:
//! - Connection state machine ([`SessionState`])
//! - 16-bit wraparound SEQ/ACK bookkeeping ([`seq`])
//! - Unacknowledged-data buffering ([`OutgoingBuffer`])
//! - Fixed-interval retransmission ([`RetransmitGate`])

mod buffer;
mod config;
mod gate;
pub mod seq;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use buffer::*;
pub use config::*;
pub use gate::*;
pub use session::*;
pub use state::*;
