//! connkeep core - shared connection bookkeeping types
//!
//! This crate provides the types shared between the daemon (connkeepd)
//! and its tests: the connection registry, its RAII guard, connection
//! identifiers and the daemon lifecycle state.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod connection;
pub mod lifecycle;
pub mod registry;

// Re-exports for convenience
pub use connection::ConnectionId;
pub use lifecycle::LifecycleState;
pub use registry::{ConnectionGuard, ConnectionRegistry};
