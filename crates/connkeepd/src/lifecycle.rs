//! Shutdown coordination for the connkeep daemon.
//!
//! The coordinator owns three things:
//! - the shared `CancellationToken` that signals a termination request
//! - a `TaskTracker` join-group counting unfinished handlers
//! - the current [`LifecycleState`], published on a watch channel
//!
//! # State Machine
//!
//! ```text
//!  SIGINT / SIGTERM          handlers done (and listener closed)
//!  ────────────────▶         ────────────────────────────────▶
//!  Running       Draining                                 Stopped
//!                          ────────────────────────────────▶
//!                            drain timeout elapsed
//! ```
//!
//! Shutdown is best-effort: a timed-out drain is logged and the daemon
//! stops anyway. Nothing is retried.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use connkeep_core::LifecycleState;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight handler finished and the listener closed in time.
    Completed,

    /// The drain timeout elapsed first.
    TimedOut,
}

/// Drives the `Running -> Draining -> Stopped` sequence.
#[derive(Debug)]
pub struct LifecycleCoordinator {
    cancel_token: CancellationToken,
    tracker: TaskTracker,
    drain_timeout: Duration,
    state: watch::Sender<LifecycleState>,
}

impl LifecycleCoordinator {
    /// Creates a coordinator in the `Running` state.
    ///
    /// # Arguments
    ///
    /// * `cancel_token` - Token cancelled when termination is requested
    /// * `drain_timeout` - Upper bound on [`drain`](Self::drain)
    pub fn new(cancel_token: CancellationToken, drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        Self {
            cancel_token,
            tracker: TaskTracker::new(),
            drain_timeout,
            state,
        }
    }

    /// Returns a clone of the shared cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Returns a handle to the in-flight join-group.
    pub fn tracker(&self) -> TaskTracker {
        self.tracker.clone()
    }

    /// Number of handlers that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Returns the drain bound.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Spawns a task that cancels the shared token on SIGINT or SIGTERM.
    pub fn spawn_signal_listener(&self) -> tokio::task::JoinHandle<()> {
        let shutdown_token = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = wait_for_shutdown_signal() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error waiting for shutdown signal");
                    }
                    info!("Received stop signal, shutting down gracefully");
                    shutdown_token.cancel();
                }
                _ = shutdown_token.cancelled() => {}
            }
        })
    }

    /// Waits for termination, then drains.
    ///
    /// Once the token is cancelled the state moves to `Draining`, the
    /// join-group is closed and the coordinator waits for both every
    /// in-flight handler and `listener_closed`, bounded by the drain
    /// timeout. The state is `Stopped` when this returns, whatever the
    /// outcome.
    pub async fn drain<F>(&self, listener_closed: F) -> DrainOutcome
    where
        F: Future<Output = ()>,
    {
        self.cancel_token.cancelled().await;
        self.transition(LifecycleState::Draining);

        info!(
            in_flight = self.in_flight(),
            timeout_secs = self.drain_timeout.as_secs(),
            "Draining in-flight connections"
        );

        self.tracker.close();

        let outcome = match timeout(self.drain_timeout, async {
            tokio::join!(self.tracker.wait(), listener_closed);
        })
        .await
        {
            Ok(()) => {
                info!("All connections drained");
                DrainOutcome::Completed
            }
            Err(_) => {
                warn!(
                    in_flight = self.in_flight(),
                    timeout_secs = self.drain_timeout.as_secs(),
                    "Graceful shutdown timed out, stopping anyway"
                );
                DrainOutcome::TimedOut
            }
        };

        self.transition(LifecycleState::Stopped);
        outcome
    }

    fn transition(&self, next: LifecycleState) {
        self.state.send_if_modified(|current| {
            if !current.can_transition_to(next) {
                return false;
            }
            info!(from = %current, to = %next, "Lifecycle transition");
            *current = next;
            true
        });
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
