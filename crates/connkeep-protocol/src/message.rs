//! Response payload for the `/connect` endpoint.

use serde::{Deserialize, Serialize};

/// Message returned once a connection has been held for the full window.
pub const COMPLETION_MESSAGE: &str = "Connection kept for 60 seconds. Task completed.";

/// Content type of a successful response.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Plain-text body sent when the payload cannot be serialized.
pub const ENCODE_ERROR_BODY: &str = "Error encoding JSON";

/// Body of a successful `/connect` response.
///
/// ```json
/// {"message": "Connection kept for 60 seconds. Task completed.", "connections": 3}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectResponse {
    /// Human-readable completion message
    pub message: String,

    /// Active connections at the moment the handler read the registry,
    /// including the connection being answered
    pub connections: usize,
}

impl ConnectResponse {
    /// Creates the standard completion response.
    pub fn completed(connections: usize) -> Self {
        Self {
            message: COMPLETION_MESSAGE.to_string(),
            connections,
        }
    }

    /// Serializes to the JSON bytes written on the wire.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
