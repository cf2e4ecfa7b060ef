//! # flowdeck-collab — real-time collaboration for the workflow editor
//!
//! WebSocket-based multi-user editing: presence roster, live cursors, and
//! node/edge delta relay for one workflow entity per channel.
//!
//! ```text
//! ┌──────────────┐      JSON frames       ┌──────────────┐
//! │ CollabClient │ ◄────────────────────► │ relay server │
//! │  (per user)  │   {"type": "..."}      │  (external)  │
//! └──────┬───────┘                        └──────────────┘
//!        │ SessionEvent
//!        ▼
//! ┌──────────────┐
//! │ SessionState │  roster + cursors + echo suppression
//! └──────┬───────┘
//!        │ RemoteDelta
//!        ▼
//!   EditorState (flowdeck-core)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — the JSON wire envelope
//! - [`session`] — roster/cursor state machine (no I/O)
//! - [`client`] — the WebSocket client with heartbeat and reconnect
//! - [`reconnect`] — exponential-backoff policy
//!
//! Remote deltas are applied last-delta-wins per node/edge id; there is no
//! operational-transform merging. Concurrent edits to the same node
//! overwrite each other — the documented conflict policy for the graph
//! channel (single-entity CRUD goes through the stricter ETag path in
//! `flowdeck-data` instead).

pub mod client;
pub mod protocol;
pub mod reconnect;
pub mod session;

pub use client::{ClientConfig, CollabClient, CollabError, ConnectionState};
pub use protocol::{CollaborationUser, ProtocolError, WireMessage};
pub use reconnect::ReconnectConfig;
pub use session::{CollaborationCursor, SessionEvent, SessionState};
