#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener as StdListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// How the mock target answers each request line.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// "PONG\r\n" for every line.
    Pong,
    /// Never answers.
    Silent,
    /// Ignores the first line on each connection, answers the rest.
    SilentFirst,
    /// Answers every line after the given delay.
    Delayed(Duration),
    /// Reads one line, then closes the connection.
    CloseAfterRead,
    /// Collects this many lines, then answers all of them in a single write.
    Batch(usize),
}

pub struct MockTarget {
    pub addr: SocketAddr,
    pub accepted: Arc<AtomicUsize>,
}

impl MockTarget {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// Binds an ephemeral port and serves it on `handle` with the given behaviour.
pub fn spawn_target(handle: &Handle, reply: Reply) -> MockTarget {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    serve(handle, listener, reply)
}

/// Serves an already bound listener.
pub fn serve(handle: &Handle, listener: StdListener, reply: Reply) -> MockTarget {
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    handle.spawn(async move {
        let listener = TcpListener::from_std(listener).unwrap();
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle_peer(socket, reply));
        }
    });

    MockTarget { addr, accepted }
}

async fn handle_peer(socket: tokio::net::TcpStream, reply: Reply) {
    let (read, mut write) = socket.into_split();
    let mut lines = BufReader::new(read).lines();

    // Replies are written by a separate task so delays do not stall reading.
    let (tx, mut rx) = mpsc::unbounded_channel::<(Instant, usize)>();
    let writer = tokio::spawn(async move {
        while let Some((due, count)) = rx.recv().await {
            sleep_until(due).await;
            if write.write_all(&b"PONG\r\n".repeat(count)).await.is_err() {
                return;
            }
        }
    });

    let mut index = 0usize;
    while let Ok(Some(_line)) = lines.next_line().await {
        let now = Instant::now();
        match reply {
            Reply::Pong => {
                let _ = tx.send((now, 1));
            }
            Reply::Silent => {}
            Reply::SilentFirst => {
                if index > 0 {
                    let _ = tx.send((now, 1));
                }
            }
            Reply::Delayed(delay) => {
                let _ = tx.send((now + delay, 1));
            }
            Reply::CloseAfterRead => {
                writer.abort();
                return;
            }
            Reply::Batch(size) => {
                if (index + 1) % size == 0 {
                    let _ = tx.send((now, size));
                }
            }
        }
        index += 1;
    }

    drop(tx);
    let _ = writer.await;
}

/// Address on which nothing is listening.
pub fn closed_addr() -> SocketAddr {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
