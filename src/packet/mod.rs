//! Packet layer.
//!
//! - [`Packet`], [`PacketBody`], [`PacketKind`]: the four packet kinds as values
//! - [`CodecOptions`]: bitmask negotiated in the SYN exchange
//! - [`WireCodec`]: the protocol's binary framing
//!
//! The session only ever sees whole [`Packet`] values; anything that moves
//! packets across a covert channel works on the serialized bytes.

mod codec;
mod types;

pub use codec::WireCodec;
pub use types::*;
