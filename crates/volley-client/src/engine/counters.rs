//! Load counters shared by every connection.
//!
//! One `Counters` value is created at startup and handed to each connection as
//! an `Arc`. All updates are single atomic increments, so concurrent handlers on
//! different worker threads never lose an update. Relaxed ordering is enough:
//! the totals are only read for the summary after the reactor's threads have been
//! joined, and the join provides the happens-before edge.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Counters {
    sent: AtomicU64,
    received: AtomicU64,
    send_failures: AtomicU64,
    timeouts: AtomicU64,
    read_errors: AtomicU64,
    connect_failures: AtomicU64,
    active_links: AtomicUsize,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub sent: u64,
    pub received: u64,
    pub send_failures: u64,
    pub timeouts: u64,
    pub read_errors: u64,
    pub connect_failures: u64,
    pub active_links: usize,
}

impl Counters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn increment_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_send_failures(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_read_errors(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connect_failures(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter. Exact only once all handlers have finished.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            active_links: self.active_links.load(Ordering::Relaxed),
        }
    }
}

/// Tracks one established socket in `active_links` for as long as it lives.
pub(crate) struct LinkGuard {
    counters: Arc<Counters>,
}

impl LinkGuard {
    pub(crate) fn new(counters: Arc<Counters>) -> Self {
        counters.active_links.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for LinkGuard {
    fn drop(&mut self) {
        self.counters.active_links.fetch_sub(1, Ordering::SeqCst);
    }
}
