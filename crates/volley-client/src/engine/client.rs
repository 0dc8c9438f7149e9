//! One logical connection to the target.
//!
//! A [`Client`] is a cheap handle; the socket lives in a connection task on the
//! reactor. `Client::send` only queues the request, so it never blocks and never
//! fails loudly. The task works through its queue one command at a time, which
//! keeps a connection's own write path strictly sequential. The read half of an
//! established socket belongs to a separate [`ResponseReader`] task, fed with one
//! [`PendingRead`] per successful write.
//!
//! Link states:
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//!      ^                          |                  |
//!      +---------- error ---------+---- write error -+
//! ```
//!
//! Reconnection is lazy. A failed connect is logged and left alone; the next
//! send on a disconnected link starts a new connect and fails immediately, and the
//! connect's outcome is only seen by a later send. A send that finds a connect
//! already in flight waits for it before writing.

use crate::engine::counters::{Counters, LinkGuard};
use crate::engine::pending::{PendingRead, ResponseOutcome, ResponseReader, RESPONSE_BUFFER_SIZE};
use crate::engine::reactor::Reactor;
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Per-connection settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub id: usize,
    pub host: String,
    pub port: u16,
    pub response_timeout: Duration,
    pub connect_timeout: Duration,
    /// Gates diagnostic output only.
    pub logging: bool,
}

#[derive(Debug)]
enum Command {
    Send(Bytes),
}

/// Handle to a connection task. Dropping it lets the task finish its queue and
/// close the socket.
pub struct Client {
    id: usize,
    logging: bool,
    commands: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl Client {
    /// Spawns the connection task, which immediately starts the initial connect.
    pub fn spawn(reactor: &Reactor, settings: ConnectionSettings, counters: Arc<Counters>) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let client = Client {
            id: settings.id,
            logging: settings.logging,
            commands,
            counters: Arc::clone(&counters),
        };

        let task = ConnectionTask {
            settings,
            queue,
            counters,
            tracker: reactor.tracker(),
            shutdown: reactor.shutdown_token(),
            link: Link::Disconnected,
            next_seq: 0,
        };
        reactor.spawn(task.run());

        client
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Queues one request. Returns before the write, let alone the response, happens.
    pub fn send(&self, request: Bytes) {
        if self.commands.send(Command::Send(request)).is_err() {
            self.counters.increment_send_failures();
            conn_event!(self.logging, warn, conn = self.id, "Send failed: connection task has stopped");
        }
    }
}

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

enum Link {
    Disconnected,
    Connecting(ConnectFuture),
    Connected {
        writer: OwnedWriteHalf,
        responses: mpsc::UnboundedSender<PendingRead>,
        _guard: Arc<LinkGuard>,
    },
}

impl Link {
    fn name(&self) -> &'static str {
        match self {
            Link::Disconnected => "disconnected",
            Link::Connecting(_) => "connecting",
            Link::Connected { .. } => "connected",
        }
    }
}

enum Event {
    Command(Command),
    Connect(io::Result<TcpStream>),
    Closed,
}

struct ConnectionTask {
    settings: ConnectionSettings,
    queue: mpsc::UnboundedReceiver<Command>,
    counters: Arc<Counters>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    link: Link,
    next_seq: u64,
}

impl ConnectionTask {
    async fn run(mut self) {
        self.connect();

        loop {
            match self.next_event().await {
                Event::Command(Command::Send(request)) => self.send(request).await,
                Event::Connect(result) => self.on_connect(result),
                Event::Closed => break,
            }
        }

        self.close();
    }

    async fn next_event(&mut self) -> Event {
        if let Link::Connecting(connect) = &mut self.link {
            tokio::select! {
                result = connect => Event::Connect(result),
                command = self.queue.recv() => command.map_or(Event::Closed, Event::Command),
                _ = self.shutdown.cancelled() => Event::Closed,
            }
        } else {
            tokio::select! {
                command = self.queue.recv() => command.map_or(Event::Closed, Event::Command),
                _ = self.shutdown.cancelled() => Event::Closed,
            }
        }
    }

    /// Starts a connect attempt and returns without waiting for it.
    fn connect(&mut self) {
        let host = self.settings.host.clone();
        let port = self.settings.port;
        let limit = self.settings.connect_timeout;

        let attempt = async move {
            match timeout(limit, TcpStream::connect((host.as_str(), port))).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            }
        };
        self.link = Link::Connecting(Box::pin(attempt));
    }

    fn on_connect(&mut self, result: io::Result<TcpStream>) {
        let conn = self.settings.id;
        let logging = self.settings.logging;

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                self.counters.increment_connect_failures();
                self.link = Link::Disconnected;
                conn_event!(logging, warn, conn, error = %e, "Connection failed: {}", e);
                return;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            conn_event!(logging, debug, conn, error = %e, "Could not disable Nagle: {}", e);
        }

        let (read_half, writer) = stream.into_split();
        let (responses, pending) = mpsc::unbounded_channel();
        let guard = Arc::new(LinkGuard::new(Arc::clone(&self.counters)));

        let reader = ResponseReader {
            conn,
            logging,
            stream: read_half,
            carry: BytesMut::with_capacity(RESPONSE_BUFFER_SIZE),
            pending,
            counters: Arc::clone(&self.counters),
            shutdown: self.shutdown.clone(),
            _link: Arc::clone(&guard),
        };
        self.tracker.spawn(reader.run());

        self.link = Link::Connected {
            writer,
            responses,
            _guard: guard,
        };
        conn_event!(
            logging,
            info,
            conn,
            peer = %peer,
            "Connected to the server at {}:{}",
            self.settings.host,
            self.settings.port
        );
    }

    async fn send(&mut self, request: Bytes) {
        let conn = self.settings.id;
        let logging = self.settings.logging;

        // The reader stops when the socket fails, which makes the link unusable.
        let lost = matches!(&self.link, Link::Connected { responses, .. } if responses.is_closed());
        if lost {
            conn_event!(logging, debug, conn, "Connection lost");
            self.link = Link::Disconnected;
        }

        if matches!(self.link, Link::Disconnected) {
            conn_event!(logging, info, conn, "Socket not open, attempting to reconnect...");
            self.connect();
            self.fail_send(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket is not connected",
            ));
            return;
        }

        if let Link::Connecting(connect) = &mut self.link {
            let result = tokio::select! {
                result = connect => Some(result),
                _ = self.shutdown.cancelled() => None,
            };
            match result {
                Some(result) => self.on_connect(result),
                None => return,
            }
        }

        let Link::Connected {
            writer, responses, ..
        } = &mut self.link
        else {
            self.fail_send(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket is not connected",
            ));
            return;
        };

        let written = tokio::select! {
            result = writer.write_all(&request) => result,
            _ = self.shutdown.cancelled() => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "operation cancelled",
            )),
        };

        match written {
            Ok(()) => {
                self.counters.increment_sent();
                let seq = self.next_seq;
                self.next_seq += 1;
                conn_event!(logging, info, conn, seq, bytes = request.len(), "message sent ok");

                let pending = PendingRead::arm(seq, self.settings.response_timeout);
                if let Err(mpsc::error::SendError(pending)) = responses.send(pending) {
                    let lost = io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        "connection lost before response",
                    );
                    pending.resolve(ResponseOutcome::Failed(lost), conn, logging, &self.counters);
                    self.link = Link::Disconnected;
                }
            }
            Err(e) => {
                // Drop the socket so the next send reconnects.
                self.link = Link::Disconnected;
                self.fail_send(e);
            }
        }
    }

    fn fail_send(&self, e: io::Error) {
        self.counters.increment_send_failures();
        conn_event!(
            self.settings.logging,
            warn,
            conn = self.settings.id,
            error = %e,
            "Send failed: {}",
            e
        );
    }

    fn close(self) {
        conn_event!(
            self.settings.logging,
            info,
            conn = self.settings.id,
            state = self.link.name(),
            "closing the socket"
        );
        // Dropping the link releases the write half; the reader releases the read
        // half once its queued responses are resolved.
    }
}
