//! Connection handler for the `/connect` endpoint.
//!
//! Each request:
//! - Registers with the connection registry and the in-flight tracker
//! - Holds the connection for the hold window, logging progress every poll
//! - Answers with the completion message and the active connection count
//! - Deregisters on every exit path (the guards do it on drop)
//!
//! The hold loop does not watch the shutdown token. A draining daemon stops
//! accepting new requests but lets held ones run their full window.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Encoding failures become a 500 response, never a panic

use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::time::{sleep, Instant};
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use connkeep_core::{ConnectionGuard, ConnectionId, ConnectionRegistry};
use connkeep_protocol::{ConnectResponse, CONTENT_TYPE_JSON, ENCODE_ERROR_BODY};

use crate::config::HoldConfig;

/// State shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Active connection counter
    pub registry: ConnectionRegistry,

    /// Join-group of unfinished handlers, waited on during drain
    pub tracker: TaskTracker,

    /// Hold timing
    pub hold: HoldConfig,
}

impl AppState {
    /// Creates handler state.
    pub fn new(registry: ConnectionRegistry, tracker: TaskTracker, hold: HoldConfig) -> Self {
        Self {
            registry,
            tracker,
            hold,
        }
    }

    /// Registers a new in-flight connection.
    pub fn admit(&self) -> InFlight {
        InFlight {
            connection: self.registry.register(),
            _tracked: self.tracker.token(),
        }
    }
}

/// One connection inside its hold window.
///
/// Dropping it decrements the registry and marks the handler done in the
/// tracker, in that order.
pub struct InFlight {
    connection: ConnectionGuard,
    _tracked: TaskTrackerToken,
}

impl InFlight {
    /// Id assigned at registration.
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Active connections, including this one.
    pub fn active_connections(&self) -> usize {
        self.connection.active_connections()
    }
}

/// Holds the calling task for `config.window`, logging progress.
///
/// Checks elapsed time, logs, then sleeps one poll interval, until the
/// window has passed. Returns the measured hold time.
pub async fn hold(id: ConnectionId, config: &HoldConfig) -> Duration {
    let start = Instant::now();

    loop {
        let elapsed = start.elapsed();
        if elapsed >= config.window {
            return elapsed;
        }

        info!(
            connection_id = %id,
            elapsed_secs = elapsed.as_secs(),
            "Connection held"
        );

        sleep(config.poll_interval).await;
    }
}

/// Handles a `/connect` request.
pub async fn handle_connect(State(state): State<AppState>) -> Result<Response, HandlerError> {
    let in_flight = state.admit();
    let id = in_flight.id();

    debug!(connection_id = %id, "Connection registered");

    let held = hold(id, &state.hold).await;

    // Read before the guard drops so the count includes this connection.
    let payload = ConnectResponse::completed(in_flight.active_connections());
    let response = encode_response(&payload)?;

    info!(
        connection_id = %id,
        held_secs = held.as_secs(),
        connections = payload.connections,
        "Connection completed"
    );

    Ok(response)
}

/// Builds the 200 JSON response for a payload.
pub fn encode_response(payload: &ConnectResponse) -> Result<Response, HandlerError> {
    let body = payload.to_json_bytes()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, CONTENT_TYPE_JSON)],
        body,
    )
        .into_response())
}

/// Errors that can occur while answering a held connection.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        match self {
            HandlerError::Encode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ENCODE_ERROR_BODY).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn short_hold() -> HoldConfig {
        HoldConfig {
            window: Duration::from_secs(3),
            poll_interval: Duration::from_secs(1),
        }
    }

    fn test_state(hold: HoldConfig) -> AppState {
        AppState::new(ConnectionRegistry::new(), TaskTracker::new(), hold)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ========================================================================
    // Hold Loop Tests
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_hold_lasts_full_window() {
        let start = Instant::now();
        let held = hold(ConnectionId::new(1), &HoldConfig::default()).await;
        let wall = start.elapsed();

        assert!(held >= Duration::from_secs(60));
        assert!(wall >= Duration::from_secs(60));
        assert!(wall < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_with_zero_window_returns_immediately() {
        let config = HoldConfig {
            window: Duration::ZERO,
            poll_interval: Duration::from_secs(1),
        };
        let start = Instant::now();
        hold(ConnectionId::new(1), &config).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // ========================================================================
    // Handler Tests
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_handler_responds_with_json() {
        let state = test_state(short_hold());

        let response = handle_connect(State(state.clone())).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_JSON
        );

        let body = body_json(response).await;
        assert_eq!(body["message"], connkeep_protocol::COMPLETION_MESSAGE);
        assert_eq!(body["connections"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_deregisters_after_response() {
        let state = test_state(short_hold());

        let _ = handle_connect(State(state.clone())).await.unwrap();

        assert_eq!(state.registry.read(), 0);
        assert!(state.tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_registered_while_holding() {
        let state = test_state(short_hold());
        let task = tokio::spawn(handle_connect(State(state.clone())));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(state.registry.read(), 1);
        assert_eq!(state.tracker.len(), 1);

        let _ = task.await.unwrap();
        assert_eq!(state.registry.read(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_handler_deregisters() {
        let state = test_state(short_hold());
        let task = tokio::spawn(handle_connect(State(state.clone())));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(state.registry.read(), 1);

        task.abort();
        let _ = task.await;

        assert_eq!(state.registry.read(), 0);
        assert!(state.tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_handlers_count_themselves() {
        const N: usize = 4;
        let state = test_state(short_hold());

        let tasks: Vec<_> = (0..N)
            .map(|_| tokio::spawn(handle_connect(State(state.clone()))))
            .collect();

        let mut counts = Vec::new();
        for task in tasks {
            let response = task.await.unwrap().unwrap();
            let body = body_json(response).await;
            counts.push(body["connections"].as_u64().unwrap() as usize);
        }

        // Every handler sees itself and never more than N.
        assert!(counts.iter().all(|&c| (1..=N).contains(&c)));
        assert_eq!(state.registry.read(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_counts_overlapping_connection() {
        let state = test_state(short_hold());

        // A connection held outside the handler for its whole window.
        let outside = state.admit();

        let response = handle_connect(State(state.clone())).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["connections"], 2);

        drop(outside);
        assert_eq!(state.registry.read(), 0);
    }

    // ========================================================================
    // Error Tests
    // ========================================================================

    #[tokio::test]
    async fn test_encode_error_is_500_plain_text() {
        let err = serde_json::from_str::<u8>("not json").unwrap_err();
        let response = HandlerError::from(err).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], ENCODE_ERROR_BODY.as_bytes());
    }

    #[test]
    fn test_encode_response_sets_status_and_type() {
        let response = encode_response(&ConnectResponse::completed(3)).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_JSON
        );
    }
}
