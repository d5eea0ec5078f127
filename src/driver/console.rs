//! Console driver.
//!
//! Reads the application's outgoing bytes from an async reader (stdin by
//! default) on a tokio task and writes delivered payload to a blocking writer
//! (stdout by default). The session side never waits: `pull` drains whatever
//! the reader task has queued so far.

use std::collections::VecDeque;
use std::io::{self, Write};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::Driver;

/// Size of a single read from the input.
const READ_CHUNK: usize = 4096;

/// Driver bridging a console (or any reader/writer pair) to a session.
pub struct ConsoleDriver<W: Write = io::Stdout> {
    /// Chunks read by the reader task.
    incoming: UnboundedReceiver<Vec<u8>>,
    /// Bytes received from the task but not yet pulled.
    carry: VecDeque<u8>,
    reader: JoinHandle<()>,
    output: W,
    /// The reader task hit end of input.
    exhausted: bool,
    closed: bool,
}

impl ConsoleDriver<io::Stdout> {
    /// Driver over the process's stdin and stdout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stdio() -> Self {
        Self::spawn(tokio::io::stdin(), io::stdout())
    }
}

impl<W: Write> ConsoleDriver<W> {
    /// Start reading `input` on a tokio task; delivered payload goes to `output`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<R>(input: R, output: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_input(input, tx));

        Self {
            incoming: rx,
            carry: VecDeque::new(),
            reader,
            output,
            exhausted: false,
            closed: false,
        }
    }

    /// The output writer.
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Check if the driver has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn drain_channel(&mut self) {
        loop {
            match self.incoming.try_recv() {
                Ok(chunk) => self.carry.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.exhausted = true;
                    break;
                }
            }
        }
    }
}

async fn read_input<R>(mut input: R, tx: UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match input.read(&mut buf).await {
            Ok(0) => {
                debug!("console input reached end of file");
                break;
            }
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        }
    }
}

impl<W: Write> Driver for ConsoleDriver<W> {
    fn pull(&mut self, max_length: usize) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }

        self.drain_channel();
        if self.carry.is_empty() && self.exhausted {
            return None;
        }

        let count = max_length.min(self.carry.len());
        Some(self.carry.drain(..count).collect())
    }

    fn deliver(&mut self, data: &[u8]) {
        let written = self
            .output
            .write_all(data)
            .and_then(|()| self.output.flush());
        if let Err(e) = written {
            warn!(error = %e, len = data.len(), "console write failed");
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        debug!("closing console driver");
        self.closed = true;
        self.reader.abort();
        self.incoming.close();
    }
}

impl<W: Write> Drop for ConsoleDriver<W> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
