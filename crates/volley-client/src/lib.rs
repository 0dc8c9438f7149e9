pub mod cli;
pub mod engine;
pub mod metrics;
pub mod request;

pub use engine::{run_waves, Client, ConnectionSettings, Counters, DispatchPlan, Reactor, Snapshot};
