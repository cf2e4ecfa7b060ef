//! Draft export/import — the locally-held JSON form of a workflow graph.
//!
//! A draft is the `{entityType, nodes, edges}` document the editor writes
//! out and reads back. Import is a boundary operation: malformed input is
//! rejected with an error and never touches in-memory editor state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{GraphEdge, GraphNode, WorkflowGraph};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("malformed draft JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serialized workflow definition for one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDraft {
    pub entity_type: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowDraft {
    /// Snapshot the given graph into an exportable draft.
    pub fn from_graph(entity_type: impl Into<String>, graph: &WorkflowGraph) -> Self {
        Self {
            entity_type: entity_type.into(),
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
        }
    }

    /// Consume the draft into a live graph.
    pub fn into_graph(self) -> WorkflowGraph {
        WorkflowGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    pub fn to_json(&self) -> Result<String, DraftError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DraftError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEdge, GraphNode, NodeKind};

    #[test]
    fn test_export_import_round_trip() {
        // The end-to-end round-trip law: build A -> B, export, re-import,
        // and the node/edge sets are structurally equal.
        let mut g = WorkflowGraph::new();
        g.upsert_node(GraphNode::new("a", NodeKind::State, "A").at(0.0, 0.0));
        g.upsert_node(GraphNode::new("b", NodeKind::End, "B").at(0.0, 120.0));
        g.upsert_edge(GraphEdge::new("e1", "a", "b"));

        let json = WorkflowDraft::from_graph("Order", &g).to_json().unwrap();
        let restored = WorkflowDraft::from_json(&json).unwrap();

        assert_eq!(restored.entity_type, "Order");
        assert_eq!(restored.into_graph(), g);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = WorkflowDraft::from_json("{\"entityType\": ");
        assert!(matches!(result, Err(DraftError::Parse(_))));
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        let result = WorkflowDraft::from_json("{\"foo\": 1}");
        assert!(result.is_err());
    }
}
