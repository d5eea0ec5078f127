//! Error types for the tunnel session layer.

use thiserror::Error;

use crate::packet::PacketKind;
use crate::session::SessionState;

/// Errors raised while decoding a packet from wire bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Not enough bytes for the fixed part of the packet.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length required.
        expected: usize,
        /// Length received.
        actual: usize,
    },

    /// Packet type byte is not one of SYN, MSG, FIN or PING.
    #[error("unknown packet type: {0:#04x}")]
    UnknownType(u8),

    /// A NUL-terminated string field ran off the end of the packet.
    #[error("unterminated {0} field")]
    Unterminated(&'static str),

    /// A string field is not valid UTF-8.
    #[error("{0} field is not valid UTF-8")]
    InvalidUtf8(&'static str),
}

/// Errors surfaced by the session entry points.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Incoming bytes could not be parsed. The session was not touched.
    #[error("malformed packet: {0}")]
    Malformed(#[from] PacketError),

    /// The peer sent a packet kind that is illegal for the current state.
    ///
    /// The session has been shut down and its driver closed.
    #[error("session {session_id:#06x}: unexpected {kind} packet in {state} state")]
    ProtocolViolation {
        /// Session that received the packet.
        session_id: u16,
        /// State the session was in.
        state: SessionState,
        /// Kind of the offending packet.
        kind: PacketKind,
    },

    /// The peer sent a packet whose type byte names no known kind.
    ///
    /// Handled like [`SessionError::ProtocolViolation`].
    #[error("session {session_id:#06x}: unknown packet type {type_byte:#04x} in {state} state")]
    UnknownKind {
        /// Session that received the packet.
        session_id: u16,
        /// State the session was in.
        state: SessionState,
        /// The unrecognized type byte.
        type_byte: u8,
    },

    /// The caller's frame budget cannot hold the packet due now.
    #[error("frame size {max_frame} cannot hold a {required}-byte packet")]
    FrameTooSmall {
        /// Frame budget passed by the caller.
        max_frame: usize,
        /// Smallest frame that would fit the packet.
        required: usize,
    },
}

impl SessionError {
    /// Check if this error ended the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::ProtocolViolation { .. } | SessionError::UnknownKind { .. }
        )
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
