//! Wave dispatcher: drives `send` across all connections from a plain thread.

use crate::engine::client::Client;
use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How many waves to send and how long to pause after each.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPlan {
    pub waves: u64,
    pub delay: Duration,
}

/// Sends `payload` once per client per wave, in client order, sleeping `delay`
/// after each wave. Blocks the calling thread, which must not be a reactor
/// worker. Stops early if `shutdown` is cancelled.
///
/// Returns the number of sends issued. Their outcomes arrive later on the reactor.
pub fn run_waves(
    clients: &[Client],
    payload: &Bytes,
    plan: DispatchPlan,
    shutdown: &CancellationToken,
) -> u64 {
    let mut issued = 0;

    for wave in 0..plan.waves {
        if shutdown.is_cancelled() {
            info!(wave, "Dispatch interrupted");
            break;
        }

        for client in clients {
            client.send(payload.clone());
            issued += 1;
        }
        debug!(wave, connections = clients.len(), "Wave dispatched");

        if !plan.delay.is_zero() {
            std::thread::sleep(plan.delay);
        }
    }

    issued
}
