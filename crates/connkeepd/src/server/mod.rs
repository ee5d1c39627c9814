//! HTTP server for the connkeep daemon.
//!
//! The server:
//! - Listens on a TCP socket (all interfaces, port 8080 by default)
//! - Routes any method on `/connect` to a connection handler
//! - Stops accepting once the lifecycle token is cancelled
//! - Hands the drain over to the [`LifecycleCoordinator`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  ConnectServer  │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌────────────────────┐
//! │ handle_connect  │────▶│ ConnectionRegistry │
//! │  (per request)  │     └────────────────────┘
//! └───────┬─────────┘
//!         │ TaskTracker token
//!         ▼
//! ┌─────────────────────┐
//! │LifecycleCoordinator │
//! │   (drain on stop)   │
//! └─────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Listener failures surface as `ServerError`

mod connection;

pub use connection::{encode_response, handle_connect, hold, AppState, HandlerError, InFlight};

use std::net::SocketAddr;

use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use connkeep_core::ConnectionRegistry;

use crate::config::ServerConfig;
use crate::lifecycle::{DrainOutcome, LifecycleCoordinator};

/// Path of the connection holding endpoint.
pub const CONNECT_PATH: &str = "/connect";

/// Builds the router serving [`CONNECT_PATH`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CONNECT_PATH, any(handle_connect))
        .with_state(state)
}

/// HTTP server holding connections open.
pub struct ConnectServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// State shared with every handler
    state: AppState,

    /// Shutdown coordination
    lifecycle: LifecycleCoordinator,
}

impl ConnectServer {
    /// Binds the listener.
    ///
    /// # Arguments
    ///
    /// * `config` - Listen address and hold timing
    /// * `registry` - Connection counter shared with the reporter
    /// * `lifecycle` - Coordinator owning the shutdown token and join-group
    ///
    /// # Errors
    ///
    /// `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        config: &ServerConfig,
        registry: ConnectionRegistry,
        lifecycle: LifecycleCoordinator,
    ) -> Result<Self, ServerError> {
        let bind_error = |e: std::io::Error| ServerError::Bind {
            addr: config.addr,
            error: e.to_string(),
        };

        let listener = TcpListener::bind(config.addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let state = AppState::new(registry, lifecycle.tracker(), config.hold);

        Ok(Self {
            listener,
            local_addr,
            state,
            lifecycle,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the lifecycle coordinator.
    pub fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    /// Runs the server.
    ///
    /// Serves until the lifecycle token is cancelled, then drains. Does not
    /// return before the lifecycle reaches `Stopped`.
    pub async fn run(self) -> Result<DrainOutcome, ServerError> {
        let Self {
            listener,
            local_addr,
            state,
            lifecycle,
        } = self;

        let cancel_token = lifecycle.cancel_token();
        let shutdown = cancel_token.clone().cancelled_owned();
        let app = router(state);

        info!(addr = %local_addr, "HTTP server listening");

        let mut serve_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        });

        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Server shutdown requested");
            }

            result = &mut serve_task => {
                // The listener stopped on its own; nothing left to drain into.
                cancel_token.cancel();
                return Err(match result {
                    Ok(Ok(())) => ServerError::ListenerClosed,
                    Ok(Err(e)) => ServerError::Serve(e),
                    Err(e) => ServerError::ServeTask(e.to_string()),
                });
            }
        }

        let listener_closed = async {
            match (&mut serve_task).await {
                Ok(Ok(())) => debug!("Listener closed"),
                Ok(Err(e)) => warn!(error = %e, "Listener closed with error"),
                Err(e) => warn!(error = %e, "Listener task failed"),
            }
        };

        let outcome = lifecycle.drain(listener_closed).await;

        if outcome == DrainOutcome::TimedOut {
            serve_task.abort();
        }

        info!(?outcome, state = %lifecycle.state(), "Server stopped");
        Ok(outcome)
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind listener on {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    ServeTask(String),

    #[error("Listener closed before shutdown was requested")]
    ListenerClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn test_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    fn test_lifecycle() -> LifecycleCoordinator {
        LifecycleCoordinator::new(CancellationToken::new(), Duration::from_secs(60))
    }

    #[test]
    fn test_connect_path() {
        assert_eq!(CONNECT_PATH, "/connect");
    }

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:8080".parse().unwrap(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:8080"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_resolves_port_zero() {
        let registry = ConnectionRegistry::new();
        let server = ConnectServer::bind(&test_config(), registry.clone(), test_lifecycle())
            .await
            .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(registry.read(), 0);
    }

    #[tokio::test]
    async fn test_bind_fails_on_taken_port() {
        let first = ConnectServer::bind(&test_config(), ConnectionRegistry::new(), test_lifecycle())
            .await
            .unwrap();

        let taken = ServerConfig {
            addr: first.local_addr(),
            ..Default::default()
        };
        let result = ConnectServer::bind(&taken, ConnectionRegistry::new(), test_lifecycle()).await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled_with_no_connections() {
        let server = ConnectServer::bind(&test_config(), ConnectionRegistry::new(), test_lifecycle())
            .await
            .unwrap();
        let token = server.lifecycle().cancel_token();

        let task = tokio::spawn(server.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("server should stop quickly")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, DrainOutcome::Completed);
    }
}
