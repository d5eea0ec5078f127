//! Session state machine types and incoming-packet outcomes.
//!
//! ```text
//!  NEW ──SYN rcvd──▶ ESTABLISHED
//!   │                    │
//!   └──FIN / violation───┴──▶ shutdown (flag, not a state)
//! ```

use std::fmt;

use crate::packet::CodecOptions;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the peer's SYN; only SYN is sent.
    #[default]
    New,
    /// SYN exchanged; MSG and FIN flow.
    Established,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why a session stopped carrying data on the remote side's account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Peer sent FIN.
    PeerClosed {
        /// Reason the peer gave.
        reason: String,
    },
    /// Peer sent a packet illegal for the session state.
    Violation,
}

/// Why an incoming packet was dropped without changing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// MSG arrived before the SYN exchange finished.
    PrematureMsg,
    /// SYN arrived on an established session.
    DuplicateSyn,
    /// MSG sequence number is not the one expected next.
    BadSeq {
        /// Our `their_seq`.
        expected: u16,
        /// The packet's sequence number.
        received: u16,
    },
    /// MSG acknowledges more bytes than are outstanding.
    BadAck {
        /// Bytes the ACK claims.
        acked: u16,
        /// Bytes actually buffered.
        outstanding: usize,
    },
    /// Packet addressed to another session.
    ForeignSession {
        /// Our session id.
        expected: u16,
        /// The packet's session id.
        received: u16,
    },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrematureMsg => f.write_str("MSG before SYN"),
            Self::DuplicateSyn => f.write_str("SYN on established session"),
            Self::BadSeq { expected, received } => {
                write!(f, "bad SEQ (expected {expected:#06x}, received {received:#06x})")
            }
            Self::BadAck { acked, outstanding } => {
                write!(f, "bad ACK ({acked} bytes acked; {outstanding} bytes in the buffer)")
            }
            Self::ForeignSession { expected, received } => {
                write!(f, "packet for session {received:#06x}, this is {expected:#06x}")
            }
        }
    }
}

/// What handling one incoming packet did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// SYN accepted; the session is now established.
    Established {
        /// Peer's initial sequence number.
        their_seq: u16,
        /// Options adopted from the peer.
        options: CodecOptions,
    },
    /// MSG accepted.
    Data {
        /// Bytes of ours the peer acknowledged.
        acked: u16,
        /// Payload bytes handed to the driver.
        delivered: usize,
    },
    /// Packet dropped; session unchanged.
    Dropped(DropReason),
    /// Peer closed the session.
    Closed {
        /// Reason the peer gave.
        reason: String,
    },
}
