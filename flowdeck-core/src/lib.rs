//! # flowdeck-core — workflow graph document model
//!
//! The in-memory heart of the Flowdeck workflow editor:
//!
//! - [`graph`] — node/edge collections, partial patches, remote deltas
//! - [`history`] — bounded linear undo/redo over full snapshots
//! - [`editor`] — live document state combining both
//! - [`draft`] — JSON export/import of a workflow definition
//! - [`sla`] — dwell-time classification against SLA thresholds
//!
//! ```text
//! user action ──► EditorState::apply_local_edit ──► History (bounded, 50)
//!                          │
//!                          ▼
//!                    WorkflowGraph ◄── EditorState::apply_remote_delta
//!                          │                 (collaborators, unhistorized)
//!                          ▼
//!                  WorkflowDraft (JSON export/import)
//! ```

pub mod draft;
pub mod editor;
pub mod graph;
pub mod history;
pub mod sla;

pub use draft::{DraftError, WorkflowDraft};
pub use editor::EditorState;
pub use graph::{
    EdgePatch, GraphEdge, GraphNode, NodeKind, NodePatch, Position, RemoteDelta, WorkflowGraph,
};
pub use history::{History, DEFAULT_CAPACITY};
pub use sla::SlaStatus;
