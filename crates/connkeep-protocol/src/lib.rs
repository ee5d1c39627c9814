//! connkeep protocol - payloads served by the daemon
//!
//! The daemon answers every held connection with a small JSON object.
//! This crate owns its shape so the server and its tests agree on it.

pub mod message;

pub use message::{ConnectResponse, COMPLETION_MESSAGE, CONTENT_TYPE_JSON, ENCODE_ERROR_BODY};
