//! Wire message schema and the closed directory action-tag vocabulary.
//!
//! Every datagram — directory-bound, directory-sourced, or peer-to-peer — is
//! a single JSON object encoding a [`Message`]. Directory-bound and
//! directory-sourced messages share one wire-compatible shape; `has_error`
//! is simply absent (defaults to `false`) on requests.

use serde::{Deserialize, Serialize};

/// Maximum datagram size, 5 MiB, per the wire format.
pub const MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;

/// Read buffer size at the directory. Directory-bound messages are short.
pub const DIRECTORY_RECV_BUF: usize = 2048;

// ────────────────────────────────────────────────────────────────────────────
// Action tags
// ────────────────────────────────────────────────────────────────────────────

/// Client-to-directory action tag.
pub const S_NEW: &str = "SNew";
pub const S_GET: &str = "SGet";
pub const S_DISCONNECT: &str = "SDisconnect";

/// Directory-to-client action tag.
pub const P_NEW: &str = "PNew";
pub const P_GET: &str = "PGet";
pub const P_DISCONNECT: &str = "PDisconnect";

/// The class a response/request action is routed into at the client
/// collector. Anything outside the six reserved tags is a peer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Registration,
    Lookup,
    Disconnection,
    PeerMessage,
}

/// Classify an action tag for collector routing (spec.md §4.3) and for the
/// request primitive's channel selection (spec.md §4.4). Unlike the
/// collector (which treats unrecognized tags as peer messages), the request
/// primitive rejects an unrecognized *outbound* action outright.
pub fn classify(action: &str) -> ActionClass {
    match action {
        S_NEW | P_NEW => ActionClass::Registration,
        S_GET | P_GET => ActionClass::Lookup,
        S_DISCONNECT | P_DISCONNECT => ActionClass::Disconnection,
        _ => ActionClass::PeerMessage,
    }
}

/// `true` for the three tags a client is allowed to address to the
/// directory; anything else (including the `P*` response tags) is unknown
/// to the directory's dispatcher, per the open question in spec.md §9.
pub fn is_directory_bound(action: &str) -> bool {
    matches!(action, S_NEW | S_GET | S_DISCONNECT)
}

/// The response tag paired with a directory-bound request tag.
pub fn paired_response(action: &str) -> Option<&'static str> {
    match action {
        S_NEW => Some(P_NEW),
        S_GET => Some(P_GET),
        S_DISCONNECT => Some(P_DISCONNECT),
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Message schema
// ────────────────────────────────────────────────────────────────────────────

/// A single request or response datagram. Requests and responses share this
/// shape; `has_error` is meaningless (and always `false`) on a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub action: String,
    pub peername: String,
    pub message: String,
    #[serde(default)]
    pub has_error: bool,
}

impl Message {
    /// Build an outbound request. Requests never carry `has_error`.
    pub fn request(action: impl Into<String>, peername: impl Into<String>, message: impl Into<String>) -> Self {
        Message {
            action: action.into(),
            peername: peername.into(),
            message: message.into(),
            has_error: false,
        }
    }

    /// Build a response, as sent by the directory.
    pub fn response(
        action: impl Into<String>,
        has_error: bool,
        peername: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Message {
            action: action.into(),
            peername: peername.into(),
            message: message.into(),
            has_error,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
