//! The session core.
//!
//! A [`Session`] turns a [`Driver`]'s byte stream into SYN/MSG/FIN packets and
//! back. It is driven by two synchronous calls from an external loop:
//!
//! - [`Session::next_outgoing`]: the packet to transmit now, if any
//! - [`Session::handle_incoming`]: apply one packet received from the peer
//!
//! Outgoing bytes stay in the session's buffer until the peer acknowledges
//! them, so every permitted tick re-sends exactly the unacknowledged data.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use super::buffer::OutgoingBuffer;
use super::config::SessionConfig;
use super::gate::RetransmitGate;
use super::seq;
use super::state::{DropReason, Incoming, SessionState, Termination};
use crate::core::constants::{FIN_REASON, MAX_OUTSTANDING};
use crate::core::{Driver, PacketCodec, PacketError, SessionError, SessionResult};
use crate::packet::{CodecOptions, Packet, PacketBody, PacketKind, WireCodec};

/// Tracing target for packet traces.
pub const TRACE_TARGET: &str = "tunnel_session::trace";

/// One logical connection to the peer.
pub struct Session<D: Driver, C: PacketCodec = WireCodec> {
    /// Identifies the session to the peer.
    id: u16,
    /// Descriptive label, sent in the SYN.
    name: Option<String>,
    /// Connection state.
    state: SessionState,
    /// Our sequence position; advances only on acknowledgment.
    my_seq: u16,
    /// Next sequence number expected from the peer.
    their_seq: u16,
    /// Latches once no more data will be sent.
    is_shutdown: bool,
    /// Set when the peer ended the session.
    termination: Option<Termination>,
    /// The single FIN has been produced.
    fin_sent: bool,
    /// The driver has been asked to close.
    driver_closed: bool,
    /// Options adopted from the peer's SYN.
    options: CodecOptions,
    /// Unacknowledged outgoing bytes.
    outgoing: OutgoingBuffer,
    /// Retransmission timer.
    gate: RetransmitGate,
    driver: D,
    codec: C,
    config: SessionConfig,
}

impl<D: Driver> Session<D, WireCodec> {
    /// Create a session using the native wire codec.
    pub fn new(driver: D, config: &SessionConfig) -> Self {
        Self::with_codec(driver, WireCodec, config)
    }
}

impl<D: Driver, C: PacketCodec> Session<D, C> {
    /// Create a session with a random id and a random or configured ISN.
    pub fn with_codec(driver: D, codec: C, config: &SessionConfig) -> Self {
        let mut rng = rand::thread_rng();
        let id: u16 = rng.r#gen();
        let my_seq = match config.isn {
            Some(isn) => {
                warn!(
                    session_id = id,
                    isn, "using a fixed initial sequence number; this can be dangerous"
                );
                isn
            }
            None => rng.r#gen(),
        };

        debug!(session_id = id, seq = my_seq, "session created");

        Self {
            id,
            name: None,
            state: SessionState::New,
            my_seq,
            their_seq: 0,
            is_shutdown: false,
            termination: None,
            fin_sent: false,
            driver_closed: false,
            options: CodecOptions::NONE,
            outgoing: OutgoingBuffer::new(),
            gate: RetransmitGate::new(config.retransmit_interval),
            driver,
            codec,
            config: config.clone(),
        }
    }

    /// Attach a descriptive name, carried in the SYN.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        info!(session_id = self.id, name = %name, "setting session name");
        self.name = Some(name);
        self
    }

    /// Session id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Session name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Our sequence position.
    pub fn my_seq(&self) -> u16 {
        self.my_seq
    }

    /// Next sequence number expected from the peer.
    pub fn their_seq(&self) -> u16 {
        self.their_seq
    }

    /// Check if the session will send no more data.
    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Check if the closing FIN has been produced.
    ///
    /// The session will produce nothing further; the caller should retire it.
    pub fn is_finished(&self) -> bool {
        self.fin_sent
    }

    /// How the peer ended the session, if it did.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Negotiated codec options.
    pub fn options(&self) -> CodecOptions {
        self.options
    }

    /// Unacknowledged bytes held for (re)transmission.
    pub fn buffered_len(&self) -> usize {
        self.outgoing.len()
    }

    /// Time until the retransmission gate opens, measured from `now`.
    pub fn time_until_transmit(&self, now: Instant) -> Duration {
        self.gate.time_until_open(now)
    }

    /// The session's driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The session's driver, mutably.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Produce the packet to transmit now, if any.
    ///
    /// `max_frame` is the caller's budget for one serialized packet; a packet
    /// that cannot fit is reported as [`SessionError::FrameTooSmall`] and not
    /// recorded as sent. Returns `Ok(None)` when the retransmission gate is
    /// closed or the session has finished.
    pub fn next_outgoing(&mut self, max_frame: usize) -> SessionResult<Option<Vec<u8>>> {
        self.next_outgoing_at(Instant::now(), max_frame)
    }

    /// [`Session::next_outgoing`] with an explicit clock reading.
    pub fn next_outgoing_at(
        &mut self,
        now: Instant,
        max_frame: usize,
    ) -> SessionResult<Option<Vec<u8>>> {
        self.poll_driver();

        if self.fin_sent {
            return Ok(None);
        }

        if !self.gate.permits(now) {
            debug!(session_id = self.id, "retransmission timer hasn't expired, not re-sending");
            return Ok(None);
        }

        let packet = if self.termination.is_some() {
            self.codec.build_fin(self.id, FIN_REASON)
        } else {
            match self.state {
                SessionState::New => {
                    info!(session_id = self.id, seq = self.my_seq, "in state New, sending SYN");
                    self.codec
                        .build_syn(self.id, self.my_seq, self.options, self.name.as_deref())
                }
                SessionState::Established => self.build_data_packet(max_frame)?,
            }
        };

        let bytes = self.codec.serialize(&packet, self.options);
        if bytes.len() > max_frame {
            return Err(SessionError::FrameTooSmall {
                max_frame,
                required: bytes.len(),
            });
        }

        if packet.kind() == PacketKind::Fin {
            info!(session_id = self.id, "sending FIN");
            self.fin_sent = true;
            self.close_driver();
        }

        self.gate.record(now);
        self.trace("OUTGOING", &packet);

        Ok(Some(bytes))
    }

    /// MSG carrying the front of the buffer, or FIN once shut down and drained.
    fn build_data_packet(&self, max_frame: usize) -> SessionResult<Packet> {
        let overhead = self.codec.msg_overhead(self.options);
        if max_frame < overhead {
            return Err(SessionError::FrameTooSmall {
                max_frame,
                required: overhead,
            });
        }

        let max_payload = self.codec.max_payload_for_frame(max_frame, self.options);
        let payload = self.outgoing.peek(max_payload);

        if payload.is_empty() && self.is_shutdown {
            return Ok(self.codec.build_fin(self.id, FIN_REASON));
        }

        info!(
            session_id = self.id,
            seq = self.my_seq,
            ack = self.their_seq,
            len = payload.len(),
            "in state Established, sending MSG"
        );
        Ok(self
            .codec
            .build_msg(self.id, self.my_seq, self.their_seq, payload))
    }

    /// Apply one packet received from the peer.
    ///
    /// Transient problems (bad SEQ, bad ACK, harmless unexpected kinds) come
    /// back as [`Incoming::Dropped`] with the session unchanged. Malformed
    /// bytes and protocol violations are errors. A violation, including an
    /// unknown packet type, also shuts the session down.
    pub fn handle_incoming(&mut self, bytes: &[u8]) -> SessionResult<Incoming> {
        let packet = match self.codec.parse(bytes, self.options) {
            Ok(packet) => packet,
            Err(PacketError::UnknownType(type_byte)) => {
                let err = SessionError::UnknownKind {
                    session_id: self.id,
                    state: self.state,
                    type_byte,
                };
                return Err(self.on_violation(err));
            }
            Err(e) => return Err(e.into()),
        };
        self.trace("INCOMING", &packet);

        self.poll_driver();

        if packet.session_id != self.id {
            let reason = DropReason::ForeignSession {
                expected: self.id,
                received: packet.session_id,
            };
            warn!(session_id = self.id, "dropping packet: {reason}");
            return Ok(Incoming::Dropped(reason));
        }

        let kind = packet.kind();
        match (self.state, packet.body) {
            (_, PacketBody::Fin { reason }) => Ok(self.on_fin(reason)),
            (SessionState::New, PacketBody::Syn { seq, options, .. }) => {
                Ok(self.on_syn(seq, options))
            }
            (SessionState::New, PacketBody::Msg { .. }) => {
                warn!(session_id = self.id, "in state New, received unexpected MSG (ignoring)");
                Ok(Incoming::Dropped(DropReason::PrematureMsg))
            }
            (SessionState::Established, PacketBody::Syn { .. }) => {
                warn!(session_id = self.id, "in state Established, received SYN (ignoring)");
                Ok(Incoming::Dropped(DropReason::DuplicateSyn))
            }
            (SessionState::Established, PacketBody::Msg { seq, ack, data }) => {
                Ok(self.on_msg(seq, ack, &data))
            }
            (state, PacketBody::Ping { .. }) => {
                let err = SessionError::ProtocolViolation {
                    session_id: self.id,
                    state,
                    kind,
                };
                Err(self.on_violation(err))
            }
        }
    }

    fn on_syn(&mut self, seq: u16, options: CodecOptions) -> Incoming {
        // The name bit describes that SYN only, not the session's framing.
        let options = options.without(CodecOptions::NAME);

        info!(session_id = self.id, isn = seq, "in state New, received SYN");
        self.their_seq = seq;
        self.options = options;
        self.state = SessionState::Established;

        Incoming::Established {
            their_seq: seq,
            options,
        }
    }

    fn on_msg(&mut self, seq: u16, ack: u16, data: &[u8]) -> Incoming {
        if seq != self.their_seq {
            let reason = DropReason::BadSeq {
                expected: self.their_seq,
                received: seq,
            };
            warn!(session_id = self.id, "dropping MSG: {reason}");
            return Incoming::Dropped(reason);
        }

        let acked = seq::distance(self.my_seq, ack);
        if usize::from(acked) > self.outgoing.len() {
            let reason = DropReason::BadAck {
                acked,
                outstanding: self.outgoing.len(),
            };
            warn!(session_id = self.id, "dropping MSG: {reason}");
            return Incoming::Dropped(reason);
        }

        self.their_seq = seq::advance(self.their_seq, data.len());
        self.outgoing.consume(usize::from(acked));
        if acked != 0 {
            self.my_seq = seq::advance(self.my_seq, usize::from(acked));
        }

        let delivered = if !data.is_empty() && !self.driver_closed {
            self.driver.deliver(data);
            data.len()
        } else {
            0
        };

        debug!(
            session_id = self.id,
            acked,
            delivered,
            my_seq = self.my_seq,
            their_seq = self.their_seq,
            "in state Established, accepted MSG"
        );

        Incoming::Data { acked, delivered }
    }

    fn on_fin(&mut self, reason: String) -> Incoming {
        warn!(
            session_id = self.id,
            state = %self.state,
            reason = %reason,
            "received FIN, closing session"
        );

        self.is_shutdown = true;
        if self.termination.is_none() {
            self.termination = Some(Termination::PeerClosed {
                reason: reason.clone(),
            });
        }
        self.close_driver();

        Incoming::Closed { reason }
    }

    fn on_violation(&mut self, err: SessionError) -> SessionError {
        error!(session_id = self.id, error = %err, "protocol violation, closing session");

        self.is_shutdown = true;
        if self.termination.is_none() {
            self.termination = Some(Termination::Violation);
        }
        self.close_driver();

        err
    }

    /// Move newly available driver bytes into the outgoing buffer.
    fn poll_driver(&mut self) {
        if self.driver_closed {
            return;
        }

        let room = MAX_OUTSTANDING - self.outgoing.len();
        if room == 0 {
            return;
        }

        match self.driver.pull(room) {
            Some(mut data) => {
                if data.len() > room {
                    error!(
                        session_id = self.id,
                        len = data.len(),
                        room,
                        "driver returned more bytes than requested, truncating"
                    );
                    data.truncate(room);
                }
                if !data.is_empty() {
                    debug!(session_id = self.id, len = data.len(), "buffered driver data");
                    self.outgoing.append(&data);
                }
            }
            None => {
                if self.outgoing.is_empty() && !self.is_shutdown {
                    info!(session_id = self.id, "driver exhausted, shutting down");
                    self.is_shutdown = true;
                }
            }
        }
    }

    fn close_driver(&mut self) {
        if !self.driver_closed {
            self.driver.close();
            self.driver_closed = true;
        }
    }

    fn trace(&self, direction: &str, packet: &Packet) {
        if self.config.packet_trace {
            info!(target: TRACE_TARGET, session_id = self.id, "{direction}: {packet}");
        }
    }
}

impl<D: Driver, C: PacketCodec> fmt::Debug for Session<D, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("my_seq", &self.my_seq)
            .field("their_seq", &self.their_seq)
            .field("is_shutdown", &self.is_shutdown)
            .field("fin_sent", &self.fin_sent)
            .field("buffered", &self.outgoing.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PacketError;
    use crate::core::constants::{MSG_HEADER_SIZE, RETRANSMIT_INTERVAL, SYN_HEADER_SIZE};
    use crate::driver::MemoryDriver;

    const ISN: u16 = 0x1000;
    const PEER_ISN: u16 = 0x2000;
    const FRAME: usize = 200;

    fn new_session() -> Session<MemoryDriver> {
        Session::new(MemoryDriver::new(), &SessionConfig::new().with_isn(ISN))
    }

    fn encode(packet: &Packet) -> Vec<u8> {
        WireCodec.serialize(packet, CodecOptions::NONE)
    }

    fn decode(bytes: &[u8]) -> Packet {
        WireCodec.parse(bytes, CodecOptions::NONE).unwrap()
    }

    fn peer_syn(session: &Session<MemoryDriver>, seq: u16) -> Vec<u8> {
        encode(&WireCodec.build_syn(session.id(), seq, CodecOptions::NONE, None))
    }

    fn peer_msg(session: &Session<MemoryDriver>, seq: u16, ack: u16, data: &[u8]) -> Vec<u8> {
        encode(&WireCodec.build_msg(session.id(), seq, ack, data.to_vec()))
    }

    fn peer_fin(session: &Session<MemoryDriver>) -> Vec<u8> {
        encode(&WireCodec.build_fin(session.id(), "done"))
    }

    fn established_with(data: &[u8]) -> Session<MemoryDriver> {
        let mut session = new_session();
        session.driver_mut().push(data);
        let syn = peer_syn(&session, PEER_ISN);
        session.handle_incoming(&syn).unwrap();
        session
    }

    #[test]
    fn test_new_session_sends_syn_despite_buffered_data() {
        let mut session = new_session();
        session.driver_mut().push(b"queued before connecting");

        let bytes = session.next_outgoing(FRAME).unwrap().unwrap();
        let packet = decode(&bytes);

        assert_eq!(packet.session_id, session.id());
        assert_eq!(
            packet.body,
            PacketBody::Syn {
                seq: ISN,
                options: CodecOptions::NONE,
                name: None,
            }
        );
        assert_eq!(session.buffered_len(), 24);
        assert_eq!(session.state(), SessionState::New);
    }

    #[test]
    fn test_syn_carries_name() {
        let mut session = new_session().with_name("shell");
        assert_eq!(session.name(), Some("shell"));

        let packet = decode(&session.next_outgoing(FRAME).unwrap().unwrap());
        match packet.body {
            PacketBody::Syn { name, .. } => assert_eq!(name.as_deref(), Some("shell")),
            other => panic!("expected SYN, got {other:?}"),
        }
    }

    #[test]
    fn test_gate_suppresses_early_retransmit() {
        let start = Instant::now();
        let mut session = new_session();

        let first = session.next_outgoing_at(start, FRAME).unwrap();
        assert!(first.is_some());

        let early = start + Duration::from_millis(500);
        assert!(session.next_outgoing_at(early, FRAME).unwrap().is_none());
        assert_eq!(session.time_until_transmit(early), Duration::from_millis(500));

        let second = session
            .next_outgoing_at(start + RETRANSMIT_INTERVAL, FRAME)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_syn_establishes_session() {
        let mut session = new_session();
        let syn = encode(&WireCodec.build_syn(
            session.id(),
            PEER_ISN,
            CodecOptions::from_bits(0x0010),
            Some("server"),
        ));

        let outcome = session.handle_incoming(&syn).unwrap();

        assert_eq!(
            outcome,
            Incoming::Established {
                their_seq: PEER_ISN,
                options: CodecOptions::from_bits(0x0010),
            }
        );
        assert_eq!(session.state(), SessionState::Established);
        assert_eq!(session.their_seq(), PEER_ISN);
        assert_eq!(session.options(), CodecOptions::from_bits(0x0010));
        assert_eq!(session.my_seq(), ISN);
    }

    #[test]
    fn test_established_sends_unacked_data_verbatim() {
        let start = Instant::now();
        let mut session = established_with(b"0123456789abcdefghij");

        let first = session.next_outgoing_at(start, FRAME).unwrap().unwrap();
        assert_eq!(
            decode(&first).body,
            PacketBody::Msg {
                seq: ISN,
                ack: PEER_ISN,
                data: b"0123456789abcdefghij".to_vec(),
            }
        );

        let again = session
            .next_outgoing_at(start + RETRANSMIT_INTERVAL, FRAME)
            .unwrap()
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(session.buffered_len(), 20);
        assert_eq!(session.my_seq(), ISN);
    }

    #[test]
    fn test_payload_limited_by_frame_size() {
        let mut session = established_with(b"0123456789abcdefghij");

        let bytes = session.next_outgoing(MSG_HEADER_SIZE + 8).unwrap().unwrap();
        assert_eq!(bytes.len(), MSG_HEADER_SIZE + 8);
        match decode(&bytes).body {
            PacketBody::Msg { data, .. } => assert_eq!(data, b"01234567"),
            other => panic!("expected MSG, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_too_small() {
        let mut session = established_with(b"data");

        let err = session.next_outgoing(MSG_HEADER_SIZE - 1).unwrap_err();
        assert!(matches!(
            err,
            SessionError::FrameTooSmall {
                max_frame: 6,
                required: MSG_HEADER_SIZE
            }
        ));

        // Nothing was recorded, so a proper frame goes out immediately.
        assert!(session.next_outgoing(FRAME).unwrap().is_some());
    }

    #[test]
    fn test_bad_seq_changes_nothing() {
        let mut session = established_with(b"0123456789");
        session.next_outgoing(FRAME).unwrap();

        let msg = peer_msg(&session, PEER_ISN + 1, ISN + 5, b"late");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(
            outcome,
            Incoming::Dropped(DropReason::BadSeq {
                expected: PEER_ISN,
                received: PEER_ISN + 1,
            })
        );
        assert_eq!(session.their_seq(), PEER_ISN);
        assert_eq!(session.my_seq(), ISN);
        assert_eq!(session.buffered_len(), 10);
        assert!(session.driver().delivered().is_empty());
    }

    #[test]
    fn test_ack_beyond_buffer_is_rejected() {
        let mut session = established_with(b"0123");

        let msg = peer_msg(&session, PEER_ISN, ISN + 5, b"ignored");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(
            outcome,
            Incoming::Dropped(DropReason::BadAck {
                acked: 5,
                outstanding: 4,
            })
        );
        assert_eq!(session.their_seq(), PEER_ISN);
        assert_eq!(session.my_seq(), ISN);
        assert_eq!(session.buffered_len(), 4);
        assert!(session.driver().delivered().is_empty());
    }

    #[test]
    fn test_stale_ack_is_rejected() {
        let mut session = established_with(b"0123");

        // One byte behind our position wraps to 65535 bytes acked.
        let msg = peer_msg(&session, PEER_ISN, ISN - 1, b"");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert!(matches!(
            outcome,
            Incoming::Dropped(DropReason::BadAck { acked: u16::MAX, .. })
        ));
        assert_eq!(session.my_seq(), ISN);
    }

    #[test]
    fn test_partial_ack_consumes_front_of_buffer() {
        let start = Instant::now();
        let mut session = established_with(b"0123456789abcdefghij");
        session.next_outgoing_at(start, FRAME).unwrap();

        let msg = peer_msg(&session, PEER_ISN, ISN + 5, b"");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(outcome, Incoming::Data { acked: 5, delivered: 0 });
        assert_eq!(session.my_seq(), ISN + 5);
        assert_eq!(session.buffered_len(), 15);
        assert_eq!(session.their_seq(), PEER_ISN);

        let next = session
            .next_outgoing_at(start + RETRANSMIT_INTERVAL, FRAME)
            .unwrap()
            .unwrap();
        assert_eq!(
            decode(&next).body,
            PacketBody::Msg {
                seq: ISN + 5,
                ack: PEER_ISN,
                data: b"56789abcdefghij".to_vec(),
            }
        );
    }

    #[test]
    fn test_payload_advances_their_seq_and_is_delivered() {
        let mut session = established_with(b"");

        let msg = peer_msg(&session, PEER_ISN, ISN, b"1234567");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(outcome, Incoming::Data { acked: 0, delivered: 7 });
        assert_eq!(session.their_seq(), PEER_ISN + 7);
        assert_eq!(session.my_seq(), ISN);
        assert_eq!(session.driver().delivered(), b"1234567");

        // The next MSG acknowledges it.
        let bytes = session.next_outgoing(FRAME).unwrap().unwrap();
        match decode(&bytes).body {
            PacketBody::Msg { ack, data, .. } => {
                assert_eq!(ack, PEER_ISN + 7);
                assert!(data.is_empty());
            }
            other => panic!("expected MSG, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_and_seq_wrap_around() {
        let mut session = Session::new(MemoryDriver::new(), &SessionConfig::new().with_isn(65530));
        session.driver_mut().push(&[0xAA; 20]);
        let syn = peer_syn(&session, 65535);
        session.handle_incoming(&syn).unwrap();

        let msg = peer_msg(&session, 65535, 10, b"xyz");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(outcome, Incoming::Data { acked: 16, delivered: 3 });
        assert_eq!(session.my_seq(), 10);
        assert_eq!(session.their_seq(), 2);
        assert_eq!(session.buffered_len(), 4);
    }

    #[test]
    fn test_syn_while_established_is_ignored() {
        let mut session = established_with(b"abc");

        let syn = peer_syn(&session, 0x5555);
        let outcome = session.handle_incoming(&syn).unwrap();

        assert_eq!(outcome, Incoming::Dropped(DropReason::DuplicateSyn));
        assert_eq!(session.state(), SessionState::Established);
        assert_eq!(session.their_seq(), PEER_ISN);
        assert_eq!(session.buffered_len(), 3);
    }

    #[test]
    fn test_msg_before_syn_is_ignored() {
        let mut session = new_session();

        let msg = peer_msg(&session, 0, ISN, b"early");
        let outcome = session.handle_incoming(&msg).unwrap();

        assert_eq!(outcome, Incoming::Dropped(DropReason::PrematureMsg));
        assert_eq!(session.state(), SessionState::New);
        assert!(session.driver().delivered().is_empty());
    }

    #[test]
    fn test_fin_closes_driver_once() {
        let start = Instant::now();
        let mut session = established_with(b"still buffered");

        let fin = peer_fin(&session);
        let outcome = session.handle_incoming(&fin).unwrap();
        assert_eq!(outcome, Incoming::Closed { reason: "done".into() });
        assert!(session.is_shutdown());
        assert_eq!(session.driver().close_count(), 1);

        session.handle_incoming(&fin).unwrap();
        assert_eq!(session.driver().close_count(), 1);
        assert_eq!(
            session.termination(),
            Some(&Termination::PeerClosed { reason: "done".into() })
        );

        // One FIN goes out even though data is still buffered, then nothing.
        let bytes = session.next_outgoing_at(start, FRAME).unwrap().unwrap();
        assert_eq!(
            decode(&bytes).body,
            PacketBody::Fin {
                reason: FIN_REASON.into()
            }
        );
        assert!(session.is_finished());
        let later = start + RETRANSMIT_INTERVAL * 3;
        assert!(session.next_outgoing_at(later, FRAME).unwrap().is_none());
    }

    #[test]
    fn test_fin_in_new_state() {
        let mut session = new_session();

        let fin = peer_fin(&session);
        session.handle_incoming(&fin).unwrap();

        assert!(session.is_shutdown());
        assert!(session.driver().is_closed());

        let bytes = session.next_outgoing(FRAME).unwrap().unwrap();
        assert_eq!(decode(&bytes).kind(), PacketKind::Fin);
    }

    #[test]
    fn test_local_exhaustion_sends_single_fin() {
        let start = Instant::now();
        let mut session = established_with(b"bye");
        session.driver_mut().finish();

        let msg = session.next_outgoing_at(start, FRAME).unwrap().unwrap();
        assert_eq!(decode(&msg).kind(), PacketKind::Msg);
        assert!(!session.is_shutdown());

        let ack = peer_msg(&session, PEER_ISN, ISN + 3, b"");
        session.handle_incoming(&ack).unwrap();
        assert_eq!(session.buffered_len(), 0);
        assert!(!session.driver().is_closed());

        let t1 = start + RETRANSMIT_INTERVAL;
        let fin = session.next_outgoing_at(t1, FRAME).unwrap().unwrap();
        assert_eq!(
            decode(&fin).body,
            PacketBody::Fin {
                reason: FIN_REASON.into()
            }
        );

        for tick in 2..5 {
            let t = start + RETRANSMIT_INTERVAL * tick;
            assert!(session.next_outgoing_at(t, FRAME).unwrap().is_none());
        }
        assert!(session.is_finished());
        assert_eq!(session.driver().close_count(), 1);
    }

    #[test]
    fn test_exhaustion_waits_for_buffer_to_drain() {
        let mut session = established_with(b"pending");
        session.driver_mut().finish();

        session.next_outgoing(FRAME).unwrap();
        assert!(!session.is_shutdown());
        assert_eq!(session.buffered_len(), 7);
    }

    #[test]
    fn test_ping_is_protocol_violation() {
        let mut session = established_with(b"");
        let ping = encode(&Packet::new(session.id(), PacketBody::Ping { data: vec![1, 2] }));

        let err = session.handle_incoming(&ping).unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SessionError::ProtocolViolation {
                state: SessionState::Established,
                kind: PacketKind::Ping,
                ..
            }
        ));
        assert!(session.is_shutdown());
        assert_eq!(session.driver().close_count(), 1);
        assert_eq!(session.termination(), Some(&Termination::Violation));
    }

    #[test]
    fn test_unknown_type_is_protocol_violation() {
        let mut session = established_with(b"buffered");
        let [hi, lo] = session.id().to_be_bytes();

        let err = session.handle_incoming(&[0x03, hi, lo, 0, 0]).unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(
            err,
            SessionError::UnknownKind {
                state: SessionState::Established,
                type_byte: 0x03,
                ..
            }
        ));
        assert!(session.is_shutdown());
        assert_eq!(session.driver().close_count(), 1);
        assert_eq!(session.termination(), Some(&Termination::Violation));

        let start = Instant::now();
        let fin = session.next_outgoing_at(start, FRAME).unwrap().unwrap();
        assert_eq!(decode(&fin).kind(), PacketKind::Fin);
        let later = start + RETRANSMIT_INTERVAL * 2;
        assert!(session.next_outgoing_at(later, FRAME).unwrap().is_none());
        assert_eq!(session.driver().close_count(), 1);
    }

    #[test]
    fn test_oversized_syn_is_not_sent() {
        let name = "a-session-name-longer-than-the-frame";
        let mut session = new_session().with_name(name);
        let required = SYN_HEADER_SIZE + name.len() + 1;

        let err = session.next_outgoing(20).unwrap_err();
        assert!(matches!(
            err,
            SessionError::FrameTooSmall { max_frame: 20, required: r } if r == required
        ));
        assert!(!err.is_fatal());

        // Nothing was recorded, so a large enough frame goes out immediately.
        let bytes = session.next_outgoing(required).unwrap().unwrap();
        assert_eq!(bytes.len(), required);
    }

    /// Driver that ignores the requested length.
    struct OverfillDriver;

    impl Driver for OverfillDriver {
        fn pull(&mut self, max_length: usize) -> Option<Vec<u8>> {
            Some(vec![0x55; max_length + 1])
        }

        fn deliver(&mut self, _data: &[u8]) {}

        fn close(&mut self) {}
    }

    #[test]
    fn test_overfilling_driver_is_truncated() {
        let mut session = Session::new(OverfillDriver, &SessionConfig::new().with_isn(ISN));

        assert!(session.next_outgoing(FRAME).unwrap().is_some());
        assert_eq!(session.buffered_len(), MAX_OUTSTANDING);
    }

    #[test]
    fn test_malformed_packet_leaves_session_untouched() {
        let mut session = new_session();
        session.driver_mut().push(b"unpolled");

        let err = session.handle_incoming(&[0x01, 0x00]).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Malformed(PacketError::TooShort { .. })
        ));
        assert!(!err.is_fatal());
        assert_eq!(session.state(), SessionState::New);
        assert_eq!(session.buffered_len(), 0);
        assert_eq!(session.driver().pending(), 8);
    }

    #[test]
    fn test_foreign_session_is_dropped() {
        let mut session = new_session();
        let other = session.id().wrapping_add(1);
        let syn = encode(&WireCodec.build_syn(other, PEER_ISN, CodecOptions::NONE, None));

        let outcome = session.handle_incoming(&syn).unwrap();

        assert_eq!(
            outcome,
            Incoming::Dropped(DropReason::ForeignSession {
                expected: session.id(),
                received: other,
            })
        );
        assert_eq!(session.state(), SessionState::New);
    }

    #[test]
    fn test_packet_trace_does_not_change_output() {
        let start = Instant::now();
        let config = SessionConfig::new().with_isn(ISN).with_packet_trace(true);
        let mut traced = Session::new(MemoryDriver::new(), &config);
        let mut plain = new_session();

        let a = decode(&traced.next_outgoing_at(start, FRAME).unwrap().unwrap());
        let b = decode(&plain.next_outgoing_at(start, FRAME).unwrap().unwrap());
        assert_eq!(a.body, b.body);
    }

    #[test]
    fn test_buffer_is_capped() {
        let mut session = established_with(&vec![0u8; MAX_OUTSTANDING + 100]);

        assert_eq!(session.buffered_len(), MAX_OUTSTANDING);
        assert_eq!(session.driver().pending(), 100);

        let ack = peer_msg(&session, PEER_ISN, ISN.wrapping_add(100), b"");
        session.handle_incoming(&ack).unwrap();
        assert_eq!(session.buffered_len(), MAX_OUTSTANDING - 100);

        // The next poll refills up to the cap.
        session.next_outgoing(FRAME).unwrap();
        assert_eq!(session.buffered_len(), MAX_OUTSTANDING);
        assert_eq!(session.driver().pending(), 0);
    }
}
