//! Client-side boundary of the layout engine.
//!
//! The engine never owns client nodes or edges. It reads geometry through [`LayoutGraph`], learns
//! about structural changes through an explicit [`ChangeBatch`], and reports its output as an
//! [`Outcome`].

use crate::algo::fdp::RunStats;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

pub mod memory;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Bounding-box size of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Opaque back-reference from a client node/edge into the engine's model arena.
///
/// Handles carry a generation so a slot recycled for a different node is never mistaken for the
/// old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Read/write access the engine needs from the client graph.
///
/// Nodes and edges listed as deleted in a [`ChangeBatch`] must stay addressable (their handle and
/// endpoints readable) until the `process` call consuming that batch returns. They must not be
/// yielded by [`LayoutGraph::node_ids`] any more.
pub trait LayoutGraph {
    type NodeId: Copy + Eq + Hash + Debug;
    type EdgeId: Copy + Eq + Hash + Debug;

    /// Every node currently in the graph.
    fn node_ids(&self) -> Vec<Self::NodeId>;

    /// `None` means the client has no valid position for the node.
    fn position(&self, node: Self::NodeId) -> Option<Point>;

    /// `None` means the client has no valid bounding box for the node.
    fn size(&self, node: Self::NodeId) -> Option<Size>;

    /// Pinned nodes exert and receive forces but are never moved by the engine.
    fn is_pinned(&self, _node: Self::NodeId) -> bool {
        false
    }

    fn set_position(&mut self, node: Self::NodeId, position: Point);

    fn node_handle(&self, node: Self::NodeId) -> Option<ModelHandle>;

    fn set_node_handle(&mut self, node: Self::NodeId, handle: Option<ModelHandle>);

    /// `(tail, head)`, or `None` if the client does not know the edge.
    fn endpoints(&self, edge: Self::EdgeId) -> Option<(Self::NodeId, Self::NodeId)>;

    fn edge_handle(&self, edge: Self::EdgeId) -> Option<ModelHandle>;

    fn set_edge_handle(&mut self, edge: Self::EdgeId, handle: Option<ModelHandle>);
}

/// Modification flags for a node that stayed in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeChange {
    /// The client moved the node; its position overrides the engine's last output.
    pub moved: bool,
    /// The client changed the node's size. Sizes are re-read on every run, so this is advisory.
    pub resized: bool,
}

impl NodeChange {
    pub const MOVED: NodeChange = NodeChange {
        moved: true,
        resized: false,
    };
    pub const RESIZED: NodeChange = NodeChange {
        moved: false,
        resized: true,
    };

    fn merge(&mut self, other: NodeChange) {
        self.moved |= other.moved;
        self.resized |= other.resized;
    }
}

/// One round of structural and geometric changes, applied by `SpringEmbedder::process`.
///
/// The five sets stay disjoint: deleting something inserted in the same batch cancels both
/// entries, and modifications of freshly inserted nodes are dropped (insertion reads the current
/// position anyway).
#[derive(Debug, Clone)]
pub struct ChangeBatch<N: Hash + Eq, E: Hash + Eq> {
    pub inserted_nodes: IndexSet<N>,
    pub inserted_edges: IndexSet<E>,
    pub modified_nodes: IndexMap<N, NodeChange>,
    pub deleted_edges: IndexSet<E>,
    pub deleted_nodes: IndexSet<N>,
}

impl<N: Hash + Eq, E: Hash + Eq> Default for ChangeBatch<N, E> {
    fn default() -> Self {
        Self {
            inserted_nodes: IndexSet::new(),
            inserted_edges: IndexSet::new(),
            modified_nodes: IndexMap::new(),
            deleted_edges: IndexSet::new(),
            deleted_nodes: IndexSet::new(),
        }
    }
}

impl<N: Hash + Eq, E: Hash + Eq> ChangeBatch<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inserted_nodes.is_empty()
            && self.inserted_edges.is_empty()
            && self.modified_nodes.is_empty()
            && self.deleted_edges.is_empty()
            && self.deleted_nodes.is_empty()
    }

    pub fn insert_node(&mut self, node: N) -> &mut Self {
        self.inserted_nodes.insert(node);
        self
    }

    pub fn insert_edge(&mut self, edge: E) -> &mut Self {
        self.inserted_edges.insert(edge);
        self
    }

    pub fn modify_node(&mut self, node: N, change: NodeChange) -> &mut Self {
        if self.inserted_nodes.contains(&node) {
            return self;
        }
        self.modified_nodes
            .entry(node)
            .or_default()
            .merge(change);
        self
    }

    pub fn delete_edge(&mut self, edge: E) -> &mut Self {
        if self.inserted_edges.shift_remove(&edge) {
            return self;
        }
        self.deleted_edges.insert(edge);
        self
    }

    pub fn delete_node(&mut self, node: N) -> &mut Self {
        self.modified_nodes.shift_remove(&node);
        if self.inserted_nodes.shift_remove(&node) {
            return self;
        }
        self.deleted_nodes.insert(node);
        self
    }
}

/// Result of one `process` call.
#[derive(Debug, Clone)]
pub struct Outcome<N> {
    /// Every node whose position was written back (the "moved" notification).
    pub moved: Vec<N>,
    pub stats: RunStats,
}

impl<N> Default for Outcome<N> {
    fn default() -> Self {
        Self {
            moved: Vec::new(),
            stats: RunStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeBatch, NodeChange};

    #[test]
    fn delete_cancels_insert_in_the_same_batch() {
        let mut batch: ChangeBatch<u32, u32> = ChangeBatch::new();
        batch.insert_node(1).insert_edge(7).delete_edge(7).delete_node(1);
        assert!(batch.is_empty());
    }

    #[test]
    fn modifications_merge_and_skip_fresh_nodes() {
        let mut batch: ChangeBatch<u32, u32> = ChangeBatch::new();
        batch
            .insert_node(1)
            .modify_node(1, NodeChange::MOVED)
            .modify_node(2, NodeChange::MOVED)
            .modify_node(2, NodeChange::RESIZED);
        assert!(!batch.modified_nodes.contains_key(&1));
        assert_eq!(
            batch.modified_nodes.get(&2),
            Some(&NodeChange {
                moved: true,
                resized: true
            })
        );
    }

    #[test]
    fn delete_drops_pending_modification() {
        let mut batch: ChangeBatch<u32, u32> = ChangeBatch::new();
        batch.modify_node(3, NodeChange::MOVED).delete_node(3);
        assert!(batch.modified_nodes.is_empty());
        assert!(batch.deleted_nodes.contains(&3));
    }
}
