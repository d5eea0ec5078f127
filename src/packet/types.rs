//! Packet values exchanged between the session and a codec.

use std::fmt;

use crate::core::constants::{
    OPT_NAME, PACKET_TYPE_FIN, PACKET_TYPE_MSG, PACKET_TYPE_PING, PACKET_TYPE_SYN,
};

/// Packet kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Connection open.
    Syn = PACKET_TYPE_SYN,
    /// Data segment.
    Msg = PACKET_TYPE_MSG,
    /// Connection close.
    Fin = PACKET_TYPE_FIN,
    /// Liveness check.
    Ping = PACKET_TYPE_PING,
}

impl PacketKind {
    /// Parse a packet kind from its type byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            PACKET_TYPE_SYN => Some(Self::Syn),
            PACKET_TYPE_MSG => Some(Self::Msg),
            PACKET_TYPE_FIN => Some(Self::Fin),
            PACKET_TYPE_PING => Some(Self::Ping),
            _ => None,
        }
    }

    /// Type byte for this kind.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syn => "SYN",
            Self::Msg => "MSG",
            Self::Fin => "FIN",
            Self::Ping => "PING",
        };
        f.write_str(name)
    }
}

/// Codec options bitmask negotiated in the SYN exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CodecOptions(u16);

impl CodecOptions {
    /// No options set.
    pub const NONE: Self = Self(0);
    /// SYN carries a session name.
    pub const NAME: Self = Self(OPT_NAME);

    /// Create options from raw bits.
    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Check if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return these options with `other` added.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Return these options with `other` removed.
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl fmt::Display for CodecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Kind-specific packet fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    /// Connection open.
    Syn {
        /// Initial sequence number of the sender.
        seq: u16,
        /// Options the sender wants to use.
        options: CodecOptions,
        /// Optional session label.
        name: Option<String>,
    },
    /// Data segment.
    Msg {
        /// Sender's sequence position.
        seq: u16,
        /// Sender's acknowledgment of our data.
        ack: u16,
        /// Payload bytes.
        data: Vec<u8>,
    },
    /// Connection close.
    Fin {
        /// Human-readable reason.
        reason: String,
    },
    /// Liveness check.
    Ping {
        /// Opaque payload.
        data: Vec<u8>,
    },
}

/// One protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Session this packet belongs to.
    pub session_id: u16,
    /// Kind-specific fields.
    pub body: PacketBody,
}

impl Packet {
    /// Create a packet.
    pub fn new(session_id: u16, body: PacketBody) -> Self {
        Self { session_id, body }
    }

    /// Kind of this packet.
    pub fn kind(&self) -> PacketKind {
        match self.body {
            PacketBody::Syn { .. } => PacketKind::Syn,
            PacketBody::Msg { .. } => PacketKind::Msg,
            PacketBody::Fin { .. } => PacketKind::Fin,
            PacketBody::Ping { .. } => PacketKind::Ping,
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [session {:#06x}]", self.kind(), self.session_id)?;
        match &self.body {
            PacketBody::Syn { seq, options, name } => {
                write!(f, " seq={seq:#06x} options={options}")?;
                if let Some(name) = name {
                    write!(f, " name={name:?}")?;
                }
                Ok(())
            }
            PacketBody::Msg { seq, ack, data } => {
                write!(f, " seq={seq:#06x} ack={ack:#06x} len={}", data.len())
            }
            PacketBody::Fin { reason } => write!(f, " reason={reason:?}"),
            PacketBody::Ping { data } => write!(f, " len={}", data.len()),
        }
    }
}
