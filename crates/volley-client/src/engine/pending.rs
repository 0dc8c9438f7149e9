//! Response side of a connection.
//!
//! Each successful write produces one [`PendingRead`] carrying a deadline fixed at
//! the moment the write completed. The connection's [`ResponseReader`] takes
//! pending reads in write order and races the socket read against the deadline in
//! a single biased `select!`. Whichever branch wins decides the
//! [`ResponseOutcome`]; the losing future is dropped, which is the cancellation.
//! `PendingRead::resolve` consumes the pending read, so an outcome is reported and
//! counted exactly once.
//!
//! Pipelined responses often share one socket read. The reader keeps those bytes
//! in a carry-over buffer and each pending read splits its own line off the front,
//! so a line that arrived early is still there for the request it answers.
//!
//! Request phases map onto ownership: the write is in flight while the
//! connection task awaits it, the read and its timer are armed while the
//! `PendingRead` sits in the reader's queue or race, and the request is resolved
//! once `resolve` has consumed it.

use crate::engine::counters::{Counters, LinkGuard};
use bytes::BytesMut;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Initial capacity of a connection's response buffer.
pub(crate) const RESPONSE_BUFFER_SIZE: usize = 4096;

/// Longest response line accepted before the read is failed.
pub const MAX_RESPONSE_LINE: usize = 64 * 1024;

/// Outcome of one request's response wait.
#[derive(Debug)]
pub enum ResponseOutcome {
    /// First line of the response, without the terminator.
    Received(String),
    TimedOut,
    Failed(io::Error),
    /// The reactor was told to stop before the response arrived.
    Cancelled,
}

impl ResponseOutcome {
    /// Whether the socket can no longer be trusted for further reads.
    fn ends_link(&self) -> bool {
        matches!(self, ResponseOutcome::Failed(_) | ResponseOutcome::Cancelled)
    }
}

/// A response wait armed right after a successful write.
#[derive(Debug)]
pub(crate) struct PendingRead {
    seq: u64,
    deadline: Instant,
}

impl PendingRead {
    pub(crate) fn arm(seq: u64, timeout: std::time::Duration) -> Self {
        Self {
            seq,
            deadline: Instant::now() + timeout,
        }
    }

    /// Records the outcome. Consumes `self`.
    pub(crate) fn resolve(self, outcome: ResponseOutcome, conn: usize, logging: bool, counters: &Counters) {
        let seq = self.seq;
        match outcome {
            ResponseOutcome::Received(line) => {
                counters.increment_received();
                conn_event!(logging, info, conn, seq, "Response received: {}", line);
            }
            ResponseOutcome::TimedOut => {
                counters.increment_timeouts();
                conn_event!(logging, warn, conn, seq, "Read operation timed out.");
            }
            ResponseOutcome::Failed(e) => {
                counters.increment_read_errors();
                conn_event!(logging, warn, conn, seq, error = %e, "No response: {}", e);
            }
            ResponseOutcome::Cancelled => {
                counters.increment_read_errors();
                conn_event!(logging, warn, conn, seq, "No response: operation cancelled");
            }
        }
    }
}

/// Reads until `buffer` holds a `\r\n`, splits that line off the front and
/// returns its text without the terminator.
///
/// Bytes after the terminator stay in `buffer` for the next call. Returns
/// `Ok(None)` if the peer closes the stream first. Cancel-safe: whatever was read
/// before cancellation remains in `buffer`.
pub async fn read_first_line<R>(reader: &mut R, buffer: &mut BytesMut) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut scanned: usize = 0;
    loop {
        // Step back one byte so a terminator split across reads is still found.
        let from = scanned.saturating_sub(1);
        if let Some(pos) = buffer[from..].windows(2).position(|w| w == b"\r\n") {
            let end = from + pos;
            let frame = buffer.split_to(end + 2);
            return Ok(Some(String::from_utf8_lossy(&frame[..end]).into_owned()));
        }
        scanned = buffer.len();

        if buffer.len() > MAX_RESPONSE_LINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "response line exceeds maximum length",
            ));
        }

        if reader.read_buf(buffer).await? == 0 {
            return Ok(None);
        }
    }
}

/// Owns the read half of one established socket.
pub(crate) struct ResponseReader {
    pub(crate) conn: usize,
    pub(crate) logging: bool,
    pub(crate) stream: OwnedReadHalf,
    /// Bytes read past the last consumed line.
    pub(crate) carry: BytesMut,
    pub(crate) pending: mpsc::UnboundedReceiver<PendingRead>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) _link: Arc<LinkGuard>,
}

impl ResponseReader {
    pub(crate) async fn run(mut self) {
        let mut lost_link = false;

        loop {
            let pending = tokio::select! {
                next = self.pending.recv() => match next {
                    Some(p) => p,
                    None => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            let (pending, outcome) = self.race(pending).await;
            let ends_link = outcome.ends_link();
            pending.resolve(outcome, self.conn, self.logging, &self.counters);

            if ends_link {
                lost_link = true;
                break;
            }
        }

        // Anything still queued was written but can never be answered on this socket.
        self.pending.close();
        while let Ok(pending) = self.pending.try_recv() {
            let outcome = if self.shutdown.is_cancelled() {
                ResponseOutcome::Cancelled
            } else {
                ResponseOutcome::Failed(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "connection lost before response",
                ))
            };
            pending.resolve(outcome, self.conn, self.logging, &self.counters);
        }

        if lost_link {
            conn_event!(self.logging, debug, conn = self.conn, "Response reader stopped");
        }
    }

    /// Single arbitration point between the socket read and the deadline.
    ///
    /// Biased so a line that is already buffered wins over a deadline that expired
    /// while earlier requests were being resolved.
    async fn race(&mut self, pending: PendingRead) -> (PendingRead, ResponseOutcome) {
        let outcome = tokio::select! {
            biased;
            line = read_first_line(&mut self.stream, &mut self.carry) => match line {
                Ok(Some(line)) => ResponseOutcome::Received(line),
                Ok(None) => ResponseOutcome::Failed(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )),
                Err(e) => ResponseOutcome::Failed(e),
            },
            _ = sleep_until(pending.deadline) => ResponseOutcome::TimedOut,
            _ = self.shutdown.cancelled() => ResponseOutcome::Cancelled,
        };
        (pending, outcome)
    }
}
