//! The shared reactor: a multi-threaded tokio runtime plus the bookkeeping
//! needed to drain it gracefully.
//!
//! Every connection task is spawned through the reactor's [`TaskTracker`]. The
//! tracker plays the role of a keep-alive guard: [`Reactor::drain`] closes it and
//! blocks until all tracked work has finished on its own, then shuts the worker
//! threads down. Nothing is aborted during a drain; the [`CancellationToken`] is
//! only cancelled on interrupt.

use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

pub struct Reactor {
    runtime: Runtime,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Reactor {
    /// Builds a reactor driven by `worker_threads` OS threads (at least one).
    pub fn new(worker_threads: usize) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("volley-worker")
            .enable_all()
            .build()?;

        debug!(worker_threads = worker_threads.max(1), "Reactor started");

        Ok(Self {
            runtime,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Spawns work the drain must wait for.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn_on(future, self.runtime.handle())
    }

    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Token cancelled on interrupt; connection tasks abandon in-flight work when it fires.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits for every tracked task to finish, then joins the worker threads.
    ///
    /// Connection tasks only finish once their `Client` handles are dropped, so
    /// callers drop those first.
    pub fn drain(self) {
        self.tracker.close();
        debug!(tasks = self.tracker.len(), "Draining reactor");
        self.runtime.block_on(self.tracker.wait());
        // Untracked helpers (metrics server, signal watcher) are dropped here.
        self.runtime.shutdown_timeout(Duration::from_secs(1));
        debug!("Reactor stopped");
    }
}
