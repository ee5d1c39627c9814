//! Shared registry of active connections.
//!
//! The registry is a single counter guarded by one mutex. The counter and
//! the id sequence live in the same critical section, so an id is always
//! consistent with the count at the moment it was handed out.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   register()    ┌───────────────────────┐
//! │ Request handler │────────────────▶│  ConnectionRegistry   │
//! │  (per request)  │◀────────────────│ Mutex<RegistryState>  │
//! └────────┬────────┘ ConnectionGuard └───────────┬───────────┘
//!          │ drop                                 │ read()
//!          ▼                                      ▼
//!     decrement()                        ┌─────────────────┐
//!                                        │    Reporter     │
//!                                        └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - A poisoned lock is recovered by taking the inner state; the counter is
//!   only ever mutated by single arithmetic steps, so it cannot be left
//!   half-updated
//! - Decrement saturates at zero

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::connection::ConnectionId;

#[derive(Debug, Default)]
struct RegistryState {
    /// Connections between registration and deregistration
    active: usize,

    /// Last id handed out (0 = none yet)
    last_id: u64,
}

/// Cheap-to-clone handle to a connection counter.
///
/// Every clone shares the same counter. Independent registries can be
/// created with [`ConnectionRegistry::new`], which keeps tests isolated.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a new active connection and returns its id.
    ///
    /// Callers must pair this with exactly one [`decrement`](Self::decrement).
    /// Prefer [`register`](Self::register), which does the pairing for you.
    pub fn increment(&self) -> ConnectionId {
        let mut state = self.lock();
        state.active += 1;
        state.last_id += 1;
        ConnectionId::new(state.last_id)
    }

    /// Records that an active connection has finished.
    pub fn decrement(&self) {
        let mut state = self.lock();
        match state.active.checked_sub(1) {
            Some(active) => state.active = active,
            None => warn!("Connection registry decremented below zero, ignoring"),
        }
    }

    /// Returns the number of active connections.
    pub fn read(&self) -> usize {
        self.lock().active
    }

    /// Registers a connection and returns a guard that deregisters it on drop.
    ///
    /// The guard runs the decrement on every exit path, including early
    /// returns, panics and a dropped future.
    pub fn register(&self) -> ConnectionGuard {
        let id = self.increment();
        ConnectionGuard {
            registry: self.clone(),
            id,
        }
    }
}

/// RAII registration of one active connection.
///
/// Invariants:
/// - Created only by [`ConnectionRegistry::register`], after the increment
/// - Decrements exactly once, when dropped
#[derive(Debug)]
#[must_use = "dropping the guard deregisters the connection immediately"]
pub struct ConnectionGuard {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Id assigned at registration.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current active count, including this connection.
    pub fn active_connections(&self) -> usize {
        self.registry.read()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.decrement();
    }
}
