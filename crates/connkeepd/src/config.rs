//! Daemon configuration.
//!
//! Durations are fixed by the service contract and only overridable from
//! code (tests shorten them). The listen address and the shutdown mode are
//! the only knobs exposed on the command line.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Default listen address: all interfaces, port 8080.
pub const DEFAULT_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

/// How long a connection is held before it is answered.
pub const HOLD_WINDOW: Duration = Duration::from_secs(60);

/// How often a held connection re-checks its elapsed time and logs progress.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often the reporter logs the active connection count.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on the drain after a termination signal.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Timing of a single held connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldConfig {
    /// Total time the connection is held open.
    pub window: Duration,

    /// Sleep between elapsed-time checks.
    pub poll_interval: Duration,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            window: HOLD_WINDOW,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Configuration for the connkeep daemon.
///
/// # Example
///
/// ```rust
/// use connkeepd::config::ServerConfig;
///
/// let config = ServerConfig {
///     addr: "127.0.0.1:0".parse().unwrap(),
///     ..Default::default()
/// };
/// assert!(config.graceful_shutdown);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub addr: SocketAddr,

    /// Drain held connections on SIGINT/SIGTERM instead of dying abruptly.
    pub graceful_shutdown: bool,

    /// Per-connection hold timing.
    pub hold: HoldConfig,

    /// Reporter tick period.
    pub report_interval: Duration,

    /// Upper bound on the drain.
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR,
            graceful_shutdown: true,
            hold: HoldConfig::default(),
            report_interval: REPORT_INTERVAL,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }
}
