//! Workflow graph document model.
//!
//! A workflow definition is a flat node/edge collection keyed by string id.
//! Nodes and edges are created by local user actions or remote deltas,
//! mutated in place by id, and deleted by id. Node positions are advisory —
//! the layout adapters overwrite them on demand.
//!
//! # Design decisions
//!
//! * **Insertion order is preserved.** Nodes and edges live in `Vec`s, not
//!   maps, so rendering and layout see a stable, deterministic order.
//! * **Deleting a node does not cascade.** Edges referencing a removed node
//!   id stay in the collection; [`WorkflowGraph::live_edges`] filters them at
//!   render time. Dangling edges are tolerated, never treated as corruption.
//! * **Duplication always mints a fresh id** derived from a UUID, so
//!   duplicating twice can never collide.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ───────────────────────────────────────────────────────────────────
// Core types
// ───────────────────────────────────────────────────────────────────

/// 2D position on the editor canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Node role within the workflow state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    State,
    Decision,
    End,
}

/// A workflow state node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub position: Position,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub guards: Vec<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            position: Position::default(),
            actions: Vec::new(),
            guards: Vec::new(),
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Position::new(x, y);
        self
    }
}

/// A directed transition between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: String::new(),
            condition: None,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Partial updates (wire-level deltas)
// ───────────────────────────────────────────────────────────────────

/// Partial node update as carried by the collaboration channel.
///
/// Only `id` is mandatory; absent fields leave the existing value untouched.
/// Applying a patch for an unknown id inserts a new node (upsert semantics).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guards: Option<Vec<String>>,
}

impl NodePatch {
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl From<&GraphNode> for NodePatch {
    fn from(node: &GraphNode) -> Self {
        Self {
            id: node.id.clone(),
            kind: Some(node.kind),
            label: Some(node.label.clone()),
            position: Some(node.position),
            actions: Some(node.actions.clone()),
            guards: Some(node.guards.clone()),
        }
    }
}

/// Partial edge update as carried by the collaboration channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgePatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl EdgePatch {
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl From<&GraphEdge> for EdgePatch {
    fn from(edge: &GraphEdge) -> Self {
        Self {
            id: edge.id.clone(),
            source: Some(edge.source.clone()),
            target: Some(edge.target.clone()),
            label: Some(edge.label.clone()),
            condition: edge.condition.clone(),
        }
    }
}

/// A remote mutation received from a collaborator.
///
/// Applied directly to the live collections with upsert-or-delete
/// semantics — deliberately outside the undo/redo history.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteDelta {
    NodeUpsert(NodePatch),
    EdgeUpsert(EdgePatch),
    NodeDelete(String),
    EdgeDelete(String),
}

// ───────────────────────────────────────────────────────────────────
// WorkflowGraph
// ───────────────────────────────────────────────────────────────────

/// The in-memory node/edge collection for one workflow document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────── node operations ─────────────────────

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Insert a node, replacing any existing node with the same id.
    pub fn upsert_node(&mut self, node: GraphNode) {
        match self.nodes.iter().position(|n| n.id == node.id) {
            Some(idx) => self.nodes[idx] = node,
            None => self.nodes.push(node),
        }
    }

    /// Remove a node by id. Incident edges are left in place (no cascade);
    /// they become orphans and are filtered by [`live_edges`](Self::live_edges).
    pub fn remove_node(&mut self, id: &str) -> Option<GraphNode> {
        let idx = self.nodes.iter().position(|n| n.id == id)?;
        Some(self.nodes.remove(idx))
    }

    /// Merge a partial update into an existing node, or insert a new node
    /// built from the patch when the id is unknown.
    pub fn apply_node_patch(&mut self, patch: &NodePatch) {
        if let Some(node) = self.node_mut(&patch.id) {
            if let Some(kind) = patch.kind {
                node.kind = kind;
            }
            if let Some(label) = &patch.label {
                node.label = label.clone();
            }
            if let Some(position) = patch.position {
                node.position = position;
            }
            if let Some(actions) = &patch.actions {
                node.actions = actions.clone();
            }
            if let Some(guards) = &patch.guards {
                node.guards = guards.clone();
            }
            return;
        }

        self.nodes.push(GraphNode {
            id: patch.id.clone(),
            kind: patch.kind.unwrap_or(NodeKind::State),
            label: patch.label.clone().unwrap_or_default(),
            position: patch.position.unwrap_or_default(),
            actions: patch.actions.clone().unwrap_or_default(),
            guards: patch.guards.clone().unwrap_or_default(),
        });
    }

    /// Clone a node under a freshly minted id.
    ///
    /// The copy is offset slightly so it does not sit exactly on top of the
    /// original. Returns `None` when the source id is unknown.
    pub fn duplicate_node(&mut self, id: &str) -> Option<String> {
        let source = self.node(id)?.clone();
        let fresh_id = format!("{}-{}", source.id, short_uid());
        let copy = GraphNode {
            id: fresh_id.clone(),
            position: Position::new(source.position.x + 40.0, source.position.y + 40.0),
            ..source
        };
        self.nodes.push(copy);
        Some(fresh_id)
    }

    // ───────────────────── edge operations ─────────────────────

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut GraphEdge> {
        self.edges.iter_mut().find(|e| e.id == id)
    }

    pub fn upsert_edge(&mut self, edge: GraphEdge) {
        match self.edges.iter().position(|e| e.id == edge.id) {
            Some(idx) => self.edges[idx] = edge,
            None => self.edges.push(edge),
        }
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<GraphEdge> {
        let idx = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(idx))
    }

    /// Merge a partial update into an existing edge, or insert a new edge
    /// when the id is unknown. An inserted edge with no endpoints is an
    /// orphan until a later patch fills them in.
    pub fn apply_edge_patch(&mut self, patch: &EdgePatch) {
        if let Some(edge) = self.edge_mut(&patch.id) {
            if let Some(source) = &patch.source {
                edge.source = source.clone();
            }
            if let Some(target) = &patch.target {
                edge.target = target.clone();
            }
            if let Some(label) = &patch.label {
                edge.label = label.clone();
            }
            if patch.condition.is_some() {
                edge.condition = patch.condition.clone();
            }
            return;
        }

        self.edges.push(GraphEdge {
            id: patch.id.clone(),
            source: patch.source.clone().unwrap_or_default(),
            target: patch.target.clone().unwrap_or_default(),
            label: patch.label.clone().unwrap_or_default(),
            condition: patch.condition.clone(),
        });
    }

    /// Connect two nodes with a freshly minted edge id.
    pub fn connect(&mut self, source: &str, target: &str) -> String {
        let id = format!("e-{}", short_uid());
        self.edges.push(GraphEdge::new(id.clone(), source, target));
        id
    }

    // ───────────────────── deltas & queries ─────────────────────

    /// Apply a remote delta with upsert-or-delete semantics.
    pub fn apply_delta(&mut self, delta: &RemoteDelta) {
        match delta {
            RemoteDelta::NodeUpsert(patch) => self.apply_node_patch(patch),
            RemoteDelta::EdgeUpsert(patch) => self.apply_edge_patch(patch),
            RemoteDelta::NodeDelete(id) => {
                self.remove_node(id);
            }
            RemoteDelta::EdgeDelete(id) => {
                self.remove_edge(id);
            }
        }
    }

    /// Edges whose endpoints both resolve to a present node.
    pub fn live_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges
            .iter()
            .filter(|e| self.node(&e.source).is_some() && self.node(&e.target).is_some())
    }

    /// Edges referencing at least one missing node id.
    pub fn orphan_edges(&self) -> Vec<&GraphEdge> {
        self.edges
            .iter()
            .filter(|e| self.node(&e.source).is_none() || self.node(&e.target).is_none())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

/// Short unique suffix for generated ids (8 hex chars of a UUIDv4).
fn short_uid() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

// ===================================================================
// Tests
// ===================================================================
