//! connkeep daemon - connection holding HTTP server
//!
//! This crate provides the building blocks of the connkeep daemon:
//! - `config` - Listen address, hold timing and drain bound
//! - `server` - HTTP server and the per-request connection handler
//! - `reporter` - Periodic logging of the active connection count
//! - `lifecycle` - Signal handling and bounded graceful drain
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      connkeepd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │  ConnectServer  │────▶│     ConnectionRegistry      │    │
//! │  │     (HTTP)      │     │  (Mutex-guarded counter)    │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ requests                    │ read()            │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ handle_connect  │     │         Reporter            │    │
//! │  │  (per request)  │     │      (every 5 seconds)      │    │
//! │  └────────┬────────┘     └─────────────────────────────┘    │
//! │           │ in-flight token                                 │
//! │           ▼                                                 │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  LifecycleCoordinator (SIGINT/SIGTERM, drain)       │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`

pub mod config;
pub mod lifecycle;
pub mod reporter;
pub mod server;
