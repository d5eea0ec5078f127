//! # tunnel-session
//!
//! Client-side session layer for covert tunnels.
//!
//! The session turns an unreliable, message-oriented transport (DNS queries,
//! for instance) into a reliable, ordered byte stream. It owns:
//!
//! - **Sequencing**: 16-bit wraparound SEQ/ACK numbers
//! - **Reliability**: outgoing bytes are held until acknowledged and re-sent
//!   verbatim on every retransmission tick
//! - **Lifecycle**: a small New → Established state machine with SYN/FIN
//!
//! It does not move bytes itself. An external loop asks the session for the
//! next packet to transmit and hands it every packet received.
//!
//! ## Feature Flags
//!
//! - `console` (default): [`driver::ConsoleDriver`] over stdin/stdout
//!
//! ## Modules
//!
//! - [`core`]: Driver and codec traits, constants, error types
//! - [`packet`]: Packet values and the native wire codec
//! - [`session`]: The session state machine
//! - [`driver`]: Ready-made drivers
//!
//! ## Example Usage
//!
//! ```rust
//! use tunnel_session::prelude::*;
//!
//! let mut driver = MemoryDriver::new();
//! driver.push(b"hello");
//!
//! let config = SessionConfig::new().with_isn(0x1000);
//! let mut session = Session::new(driver, &config);
//!
//! // Until the peer answers, every permitted tick yields a SYN.
//! let frame = session.next_outgoing(200)?.expect("gate is open");
//! let packet = WireCodec.parse(&frame, CodecOptions::NONE)?;
//! assert_eq!(packet.kind(), PacketKind::Syn);
//! assert_eq!(session.state(), SessionState::New);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod driver;
pub mod packet;
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    #[cfg(feature = "console")]
    pub use crate::driver::ConsoleDriver;
    pub use crate::driver::MemoryDriver;

    pub use crate::packet::{CodecOptions, Packet, PacketBody, PacketKind, WireCodec};
    pub use crate::session::{
        DropReason, Incoming, Session, SessionConfig, SessionState, Termination,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{Driver, PacketCodec, PacketError, SessionError, SessionResult};
pub use crate::packet::{CodecOptions, Packet, PacketBody, PacketKind, WireCodec};
pub use crate::session::{Incoming, Session, SessionConfig, SessionState};
