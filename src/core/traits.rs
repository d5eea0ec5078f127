//! Capability traits the session is generic over.
//!
//! A [`Driver`] moves application bytes in and out of the tunnel, a
//! [`PacketCodec`] turns packets into wire bytes and back. Neither knows about
//! sequencing or retransmission; that lives in [`crate::session::Session`].

use super::error::PacketError;
use crate::packet::{CodecOptions, Packet, PacketBody};

/// Application-side byte source and sink.
///
/// # Requirements
///
/// - `pull` MUST NOT block. Returning `Some(vec![])` means "nothing right
///   now"; `None` means the source is exhausted and will never produce again.
/// - `deliver` MUST NOT block indefinitely.
/// - `close` MUST be idempotent.
///
/// # Example
///
/// ```ignore
/// struct Discard;
///
/// impl Driver for Discard {
///     fn pull(&mut self, _max_length: usize) -> Option<Vec<u8>> {
///         None
///     }
///
///     fn deliver(&mut self, _data: &[u8]) {}
///
///     fn close(&mut self) {}
/// }
/// ```
pub trait Driver {
    /// Take up to `max_length` newly available outgoing bytes.
    fn pull(&mut self, max_length: usize) -> Option<Vec<u8>>;

    /// Hand received application payload onward.
    fn deliver(&mut self, data: &[u8]);

    /// Request transport teardown.
    fn close(&mut self);
}

/// Packet framing.
///
/// `options` is the bitmask negotiated during the SYN exchange; codecs that
/// have no option-dependent framing may ignore it.
pub trait PacketCodec {
    /// Decode one packet.
    fn parse(&self, bytes: &[u8], options: CodecOptions) -> Result<Packet, PacketError>;

    /// Encode one packet.
    fn serialize(&self, packet: &Packet, options: CodecOptions) -> Vec<u8>;

    /// Largest MSG payload that fits in a frame of `total` bytes.
    fn max_payload_for_frame(&self, total: usize, options: CodecOptions) -> usize;

    /// Header overhead of a MSG packet.
    fn msg_overhead(&self, options: CodecOptions) -> usize;

    /// Build a connection-open packet.
    fn build_syn(
        &self,
        session_id: u16,
        seq: u16,
        options: CodecOptions,
        name: Option<&str>,
    ) -> Packet {
        Packet::new(
            session_id,
            PacketBody::Syn {
                seq,
                options,
                name: name.map(str::to_owned),
            },
        )
    }

    /// Build a data segment.
    fn build_msg(&self, session_id: u16, seq: u16, ack: u16, data: Vec<u8>) -> Packet {
        Packet::new(session_id, PacketBody::Msg { seq, ack, data })
    }

    /// Build a connection-close packet.
    fn build_fin(&self, session_id: u16, reason: &str) -> Packet {
        Packet::new(
            session_id,
            PacketBody::Fin {
                reason: reason.to_owned(),
            },
        )
    }
}
