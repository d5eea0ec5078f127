//! Console tunnel client.
//!
//! Carries stdin to the peer and the peer's data to stdout, one session per
//! run, with every packet sent as a single UDP datagram.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p tunnel-console -- 127.0.0.1:53531 --name shell
//! RUST_LOG=tunnel_session=debug cargo run -p tunnel-console -- 127.0.0.1:53531 --packet-trace
//! ```
//!
//! Logs go to stderr so they never mix with tunnelled output.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tunnel_session::driver::ConsoleDriver;
use tunnel_session::{Session, SessionConfig};

/// Largest datagram accepted from the peer.
const RECV_BUFFER: usize = 64 * 1024;

#[derive(Debug, Parser)]
#[command(name = "tunnel-console", about = "Tunnel stdin/stdout to a peer over UDP")]
struct Cli {
    /// Peer address.
    peer: SocketAddr,

    /// Local bind address.
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Fixed initial sequence number (random if omitted).
    #[arg(long)]
    isn: Option<u16>,

    /// Session name sent in the SYN.
    #[arg(long)]
    name: Option<String>,

    /// Log every packet sent and received.
    #[arg(long)]
    packet_trace: bool,

    /// Largest serialized packet, in bytes.
    #[arg(long, default_value_t = 200)]
    max_frame: usize,

    /// How often to offer the session a chance to transmit, in milliseconds.
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let socket = UdpSocket::bind(cli.bind)
        .await
        .with_context(|| format!("cannot bind {}", cli.bind))?;
    socket
        .connect(cli.peer)
        .await
        .with_context(|| format!("cannot connect to {}", cli.peer))?;

    let mut config = SessionConfig::new().with_packet_trace(cli.packet_trace);
    if let Some(isn) = cli.isn {
        config = config.with_isn(isn);
    }

    let mut session = Session::new(ConsoleDriver::stdio(), &config);
    if let Some(name) = cli.name {
        session = session.with_name(name);
    }
    info!(
        session_id = session.id(),
        peer = %cli.peer,
        local = %socket.local_addr()?,
        "session started"
    );

    let mut tick = tokio::time::interval(Duration::from_millis(cli.tick_ms));
    let mut buf = vec![0u8; RECV_BUFFER];

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Some(frame) = session.next_outgoing(cli.max_frame)? {
                    socket.send(&frame).await.context("send failed")?;
                }
                if session.is_finished() {
                    break;
                }
            }
            received = socket.recv(&mut buf) => {
                let len = match received {
                    Ok(len) => len,
                    Err(e) => {
                        // ICMP errors surface here; the peer may simply not be up yet.
                        warn!(error = %e, "receive failed");
                        continue;
                    }
                };
                match session.handle_incoming(&buf[..len]) {
                    Ok(outcome) => debug!(?outcome, "handled packet"),
                    Err(e) if e.is_fatal() => error!(error = %e, "session terminated"),
                    Err(e) => warn!(error = %e, "discarding packet"),
                }
            }
        }
    }

    info!(
        session_id = session.id(),
        termination = ?session.termination(),
        "session finished"
    );
    Ok(())
}
