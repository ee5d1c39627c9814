//! Periodic reporting of the active connection count.
//!
//! Every tick the reporter reads the registry and logs the count when at
//! least one connection is held. An idle daemon stays quiet.
//!
//! # Panic-Free Guarantees
//!
//! All code follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use connkeep_core::ConnectionRegistry;

/// Reads the registry once and logs the count if it is non-zero.
///
/// Returns the count that was logged, or `None` if nothing was logged.
pub fn report_once(registry: &ConnectionRegistry) -> Option<usize> {
    let connections = registry.read();
    if connections == 0 {
        return None;
    }

    info!(connections, "Current number of connections");
    Some(connections)
}

/// Spawns the reporter task.
///
/// The first report happens one full `period` after spawning. The task runs
/// until `cancel_token` is cancelled; pass a token that is never cancelled to
/// report for the lifetime of the process.
///
/// # Returns
///
/// A join handle for the spawned task.
pub fn spawn_reporter(
    registry: ConnectionRegistry,
    period: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_secs = period.as_secs(), "Connection reporter started");

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    debug!("Connection reporter shutting down");
                    break;
                }

                _ = tick.tick() => {
                    report_once(&registry);
                }
            }
        }
    })
}
