//! Binary encoding and decoding of packets.
//!
//! Wire format (all integers big-endian):
//! ```text
//! +--------+------------+---------------------------------------------+
//! | Type   | Session ID | Body                                        |
//! | 1 byte | 2 bytes    |                                             |
//! +--------+------------+---------------------------------------------+
//!
//! SYN  (0x00): seq u16 | options u16 | name\0 (only if OPT_NAME)
//! MSG  (0x01): seq u16 | ack u16     | data (rest of frame)
//! FIN  (0x02): reason\0
//! PING (0xFF): data (rest of frame)
//! ```

use crate::core::constants::{MSG_HEADER_SIZE, PACKET_HEADER_SIZE, SYN_HEADER_SIZE};
use crate::core::{PacketCodec, PacketError};

use super::types::{CodecOptions, Packet, PacketBody, PacketKind};

/// The protocol's native packet codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read a NUL-terminated UTF-8 string.
fn read_ntstring(bytes: &[u8], field: &'static str) -> Result<String, PacketError> {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::Unterminated(field))?;
    String::from_utf8(bytes[..end].to_vec()).map_err(|_| PacketError::InvalidUtf8(field))
}

fn write_ntstring(buf: &mut Vec<u8>, value: &str) {
    // An interior NUL would end the field early on the other side.
    buf.extend(value.bytes().take_while(|&b| b != 0));
    buf.push(0);
}

fn require(bytes: &[u8], expected: usize) -> Result<(), PacketError> {
    if bytes.len() < expected {
        return Err(PacketError::TooShort {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

impl PacketCodec for WireCodec {
    fn parse(&self, bytes: &[u8], _options: CodecOptions) -> Result<Packet, PacketError> {
        require(bytes, PACKET_HEADER_SIZE)?;

        let kind = PacketKind::from_byte(bytes[0]).ok_or(PacketError::UnknownType(bytes[0]))?;
        let session_id = read_u16(bytes, 1);
        let rest = &bytes[PACKET_HEADER_SIZE..];

        let body = match kind {
            PacketKind::Syn => {
                require(bytes, SYN_HEADER_SIZE)?;
                let seq = read_u16(bytes, 3);
                let options = CodecOptions::from_bits(read_u16(bytes, 5));
                let name = if options.contains(CodecOptions::NAME) {
                    Some(read_ntstring(&bytes[SYN_HEADER_SIZE..], "name")?)
                } else {
                    None
                };
                PacketBody::Syn { seq, options, name }
            }
            PacketKind::Msg => {
                require(bytes, MSG_HEADER_SIZE)?;
                PacketBody::Msg {
                    seq: read_u16(bytes, 3),
                    ack: read_u16(bytes, 5),
                    data: bytes[MSG_HEADER_SIZE..].to_vec(),
                }
            }
            PacketKind::Fin => PacketBody::Fin {
                reason: read_ntstring(rest, "reason")?,
            },
            PacketKind::Ping => PacketBody::Ping {
                data: rest.to_vec(),
            },
        };

        Ok(Packet::new(session_id, body))
    }

    fn serialize(&self, packet: &Packet, _options: CodecOptions) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MSG_HEADER_SIZE);
        buf.push(packet.kind().as_byte());
        buf.extend_from_slice(&packet.session_id.to_be_bytes());

        match &packet.body {
            PacketBody::Syn { seq, options, name } => {
                let options = match name {
                    Some(_) => options.with(CodecOptions::NAME),
                    None => options.without(CodecOptions::NAME),
                };
                buf.extend_from_slice(&seq.to_be_bytes());
                buf.extend_from_slice(&options.bits().to_be_bytes());
                if let Some(name) = name {
                    write_ntstring(&mut buf, name);
                }
            }
            PacketBody::Msg { seq, ack, data } => {
                buf.extend_from_slice(&seq.to_be_bytes());
                buf.extend_from_slice(&ack.to_be_bytes());
                buf.extend_from_slice(data);
            }
            PacketBody::Fin { reason } => write_ntstring(&mut buf, reason),
            PacketBody::Ping { data } => buf.extend_from_slice(data),
        }

        buf
    }

    fn max_payload_for_frame(&self, total: usize, options: CodecOptions) -> usize {
        total.saturating_sub(self.msg_overhead(options))
    }

    fn msg_overhead(&self, _options: CodecOptions) -> usize {
        MSG_HEADER_SIZE
    }
}
