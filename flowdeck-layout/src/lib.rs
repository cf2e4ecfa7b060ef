//! # flowdeck-layout — interchangeable graph layout strategies
//!
//! Two pure functions assigning 2D positions to workflow nodes given the
//! edge set:
//!
//! - [`hierarchical`] — layered top-down with longest-path layering and
//!   barycenter ordering; the default for workflows with clear stage order
//! - [`compact`] — a faster single-pass layered placement with fixed
//!   spacing constants
//!
//! Both strategies give every node exactly one position, never mutate
//! their inputs, tolerate disconnected nodes and dangling edges, and are
//! deterministic for identical inputs.

pub mod compact;
pub mod hierarchical;

use flowdeck_core::graph::{GraphEdge, GraphNode};

/// Selectable layout strategy, as toggled from the editor toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutEngine {
    #[default]
    Hierarchical,
    Compact,
}

impl LayoutEngine {
    /// Run the selected strategy.
    pub fn layout(self, nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<GraphNode> {
        match self {
            LayoutEngine::Hierarchical => hierarchical::layout(nodes, edges),
            LayoutEngine::Compact => compact::layout(nodes, edges),
        }
    }
}
