/// Emits a tracing event only when the connection's logging flag is set.
macro_rules! conn_event {
    ($enabled:expr, $level:ident, $($arg:tt)+) => {
        if $enabled {
            tracing::$level!($($arg)+);
        }
    };
}

pub mod client;
pub mod counters;
pub mod dispatch;
pub mod pending;
pub mod reactor;

pub use client::{Client, ConnectionSettings};
pub use counters::{Counters, Snapshot};
pub use dispatch::{run_waves, DispatchPlan};
pub use reactor::Reactor;
