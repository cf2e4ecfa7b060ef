//! Compact layered layout.
//!
//! The fast path: a single breadth-first pass assigning each node a
//! (row, column) slot with fixed spacing constants. No crossing
//! minimization — the trade against the hierarchical strategy is speed and
//! simplicity over visual polish.
//!
//! Same contract as the hierarchical adapter: pure, deterministic,
//! cycle-tolerant, disconnected nodes placed in supply order, dangling
//! edges ignored.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use flowdeck_core::graph::{GraphEdge, GraphNode, Position};

/// Fixed horizontal spacing between columns.
const X_SPACING: f32 = 220.0;
/// Fixed vertical spacing between rows.
const Y_SPACING: f32 = 120.0;

/// Assign every node a position from a single-pass layered placement.
pub fn layout(nodes: &[GraphNode], edges: &[GraphEdge]) -> Vec<GraphNode> {
    let n = nodes.len();
    if n == 0 {
        return Vec::new();
    }

    let index: FxHashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut out = vec![Vec::new(); n];
    let mut indegree = vec![0usize; n];
    let mut connected = vec![false; n];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        else {
            continue;
        };
        if s == t {
            connected[s] = true;
            continue;
        }
        out[s].push(t);
        indegree[t] += 1;
        connected[s] = true;
        connected[t] = true;
    }

    // Breadth-first depth assignment. Roots are taken in supply order;
    // cycle-only components get their first member (in supply order) as an
    // artificial root at depth 0.
    let mut depth: Vec<Option<usize>> = vec![None; n];
    let mut queue = VecDeque::new();
    for i in 0..n {
        if connected[i] && indegree[i] == 0 {
            depth[i] = Some(0);
            queue.push_back(i);
        }
    }
    let bfs = |queue: &mut VecDeque<usize>, depth: &mut Vec<Option<usize>>| {
        while let Some(u) = queue.pop_front() {
            let d = depth[u].unwrap_or(0);
            for &v in &out[u] {
                if depth[v].is_none() {
                    depth[v] = Some(d + 1);
                    queue.push_back(v);
                }
            }
        }
    };
    bfs(&mut queue, &mut depth);
    for i in 0..n {
        if connected[i] && depth[i].is_none() {
            depth[i] = Some(0);
            queue.push_back(i);
            bfs(&mut queue, &mut depth);
        }
    }

    // Columns fill left-to-right per row in supply order.
    let mut next_col: FxHashMap<usize, usize> = FxHashMap::default();
    let mut positions = vec![Position::default(); n];
    let mut max_depth = 0usize;
    for i in 0..n {
        if let Some(d) = depth[i] {
            let col = next_col.entry(d).or_insert(0);
            positions[i] = Position::new(*col as f32 * X_SPACING, d as f32 * Y_SPACING);
            *col += 1;
            max_depth = max_depth.max(d);
        }
    }

    // Disconnected nodes: trailing row in supply order.
    let fallback_y = if connected.iter().any(|&c| c) {
        (max_depth + 1) as f32 * Y_SPACING
    } else {
        0.0
    };
    let mut fallback_col = 0usize;
    for i in 0..n {
        if !connected[i] {
            positions[i] = Position::new(fallback_col as f32 * X_SPACING, fallback_y);
            fallback_col += 1;
        }
    }

    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let mut placed = node.clone();
            placed.position = positions[i];
            placed
        })
        .collect()
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::graph::NodeKind;

    fn node(id: &str) -> GraphNode {
        GraphNode::new(id, NodeKind::State, id.to_uppercase())
    }

    fn edge(id: &str, s: &str, t: &str) -> GraphEdge {
        GraphEdge::new(id, s, t)
    }

    #[test]
    fn test_chain_rows() {
        let nodes = vec![node("a"), node("b"), node("c")];
        let edges = vec![edge("e1", "a", "b"), edge("e2", "b", "c")];

        let placed = layout(&nodes, &edges);
        assert_eq!(placed[0].position, Position::new(0.0, 0.0));
        assert_eq!(placed[1].position, Position::new(0.0, Y_SPACING));
        assert_eq!(placed[2].position, Position::new(0.0, 2.0 * Y_SPACING));
    }

    #[test]
    fn test_siblings_fill_columns() {
        let nodes = vec![node("root"), node("l"), node("r")];
        let edges = vec![edge("e1", "root", "l"), edge("e2", "root", "r")];

        let placed = layout(&nodes, &edges);
        let l = placed.iter().find(|n| n.id == "l").unwrap();
        let r = placed.iter().find(|n| n.id == "r").unwrap();

        assert_eq!(l.position, Position::new(0.0, Y_SPACING));
        assert_eq!(r.position, Position::new(X_SPACING, Y_SPACING));
    }

    #[test]
    fn test_deterministic() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let edges = vec![
            edge("e1", "a", "b"),
            edge("e2", "a", "c"),
            edge("e3", "c", "d"),
        ];
        assert_eq!(layout(&nodes, &edges), layout(&nodes, &edges));
    }

    #[test]
    fn test_no_edges_fallback_origin() {
        let nodes = vec![node("a"), node("b")];
        let placed = layout(&nodes, &[]);

        assert_eq!(placed[0].position, Position::new(0.0, 0.0));
        assert_eq!(placed[1].position, Position::new(X_SPACING, 0.0));
    }

    #[test]
    fn test_cycle_gets_artificial_root() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![edge("e1", "a", "b"), edge("e2", "b", "a")];

        let placed = layout(&nodes, &edges);
        // First member in supply order anchors the cycle at depth 0.
        assert_eq!(placed[0].position.y, 0.0);
        assert_eq!(placed[1].position.y, Y_SPACING);
    }

    #[test]
    fn test_inputs_not_mutated() {
        let nodes = vec![node("a").at(3.0, 3.0)];
        let before = nodes.clone();
        let _ = layout(&nodes, &[]);
        assert_eq!(nodes, before);
    }
}
