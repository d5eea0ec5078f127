//! 16-bit sequence space arithmetic.
//!
//! Sequence and acknowledgment numbers live in Z/2^16. Every advance and every
//! delta goes through these helpers so wraparound is never handled ad hoc.

/// Advance `seq` by `len` bytes, modulo 2^16.
pub fn advance(seq: u16, len: usize) -> u16 {
    // Truncating `len` is the reduction mod 2^16.
    seq.wrapping_add(len as u16)
}

/// Number of bytes between `from` and `to`, modulo 2^16.
///
/// For an incoming ACK this is `(ack - my_seq) mod 65536`: the bytes the peer
/// claims to have received beyond our current position.
pub fn distance(from: u16, to: u16) -> u16 {
    to.wrapping_sub(from)
}
