//! JSON wire protocol for the collaborative workflow channel.
//!
//! One logical channel exists per workflow entity type. Frames are JSON
//! text with a `"type"` discriminator:
//!
//! ```text
//! client → server                      server → client
//! ───────────────                      ───────────────
//! JOIN {entity, userId, username}      USER_JOINED {userId, username, users}
//! LEAVE {entity}                       USER_LEFT {userId, users}
//! NODE_UPDATE {entity, node}           NODE_UPDATED {node, userId}
//! EDGE_UPDATE {entity, edge}           EDGE_UPDATED {edge, userId}
//! NODE_DELETE {entity, nodeId}         NODE_DELETED {nodeId, userId}
//! EDGE_DELETE {entity, edgeId}         EDGE_DELETED {edgeId, userId}
//! CURSOR {entity, x, y}                CURSOR_MOVED {userId, username, x, y}
//! HB                                   HB_ACK
//!                                      ERROR {message}
//! ```
//!
//! Every server→client mutation carries the acting user's id so the editor
//! can attribute (and echo-filter) the change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowdeck_core::graph::{EdgePatch, NodePatch};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A user present in a collaboration session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationUser {
    pub user_id: String,
    pub username: String,
}

impl CollaborationUser {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Top-level protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum WireMessage {
    // ── client → server ─────────────────────────────────────────
    Join {
        entity: String,
        user_id: String,
        username: String,
    },
    Leave {
        entity: String,
    },
    NodeUpdate {
        entity: String,
        node: NodePatch,
    },
    EdgeUpdate {
        entity: String,
        edge: EdgePatch,
    },
    NodeDelete {
        entity: String,
        node_id: String,
    },
    EdgeDelete {
        entity: String,
        edge_id: String,
    },
    Cursor {
        entity: String,
        x: f32,
        y: f32,
    },
    Hb,

    // ── server → client ─────────────────────────────────────────
    UserJoined {
        user_id: String,
        username: String,
        users: Vec<CollaborationUser>,
    },
    UserLeft {
        user_id: String,
        users: Vec<CollaborationUser>,
    },
    NodeUpdated {
        node: NodePatch,
        user_id: String,
    },
    EdgeUpdated {
        edge: EdgePatch,
        user_id: String,
    },
    NodeDeleted {
        node_id: String,
        user_id: String,
    },
    EdgeDeleted {
        edge_id: String,
        user_id: String,
    },
    CursorMoved {
        user_id: String,
        username: String,
        x: f32,
        y: f32,
    },
    HbAck,
    Error {
        message: String,
    },
}

impl WireMessage {
    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Deserialize from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    /// The acting user id on server→client mutation/presence frames.
    pub fn sender_id(&self) -> Option<&str> {
        match self {
            WireMessage::UserJoined { user_id, .. }
            | WireMessage::UserLeft { user_id, .. }
            | WireMessage::NodeUpdated { user_id, .. }
            | WireMessage::EdgeUpdated { user_id, .. }
            | WireMessage::NodeDeleted { user_id, .. }
            | WireMessage::EdgeDeleted { user_id, .. }
            | WireMessage::CursorMoved { user_id, .. } => Some(user_id),
            _ => None,
        }
    }
}

// ===================================================================
// Tests
// ===================================================================
