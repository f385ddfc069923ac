//! String-keyed in-memory client graph.
//!
//! Every mutation is recorded into a pending [`ChangeBatch`] so the graph can drive
//! `SpringEmbedder::process` directly:
//!
//! ```
//! use springbok::graph::memory::Graph;
//! use springbok::{Point, Size, SpringEmbedder};
//!
//! let mut g = Graph::new();
//! g.add_node("a", Some(Point::new(0.0, 0.0)), Some(Size::new(10.0, 10.0))).unwrap();
//! g.add_node("b", Some(Point::new(500.0, 0.0)), Some(Size::new(10.0, 10.0))).unwrap();
//! g.add_edge("ab", "a", "b").unwrap();
//!
//! let mut layout = SpringEmbedder::new();
//! let batch = g.take_changes();
//! layout.process(&mut g, &batch).unwrap();
//! assert!(g.position("a").unwrap().distance(g.position("b").unwrap()) < 500.0);
//! ```
//!
//! Removed nodes and edges are kept as retired entries until the [`Graph::take_changes`] call
//! after the one that reported them, so the engine can still resolve them while it consumes the
//! batch that deletes them.

use super::{ChangeBatch, LayoutGraph, ModelHandle, NodeChange, Point, Size};
use rustc_hash::FxBuildHasher;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node already exists: {id}")]
    DuplicateNode { id: String },
    #[error("edge already exists: {id}")]
    DuplicateEdge { id: String },
    #[error("unknown node: {id}")]
    UnknownNode { id: String },
    #[error("unknown edge: {id}")]
    UnknownEdge { id: String },
}

#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub id: String,
    pub position: Option<Point>,
    pub size: Option<Size>,
    pub pinned: bool,
    handle: Option<ModelHandle>,
    retired: bool,
}

#[derive(Debug, Clone)]
pub struct EdgeEntry {
    pub id: String,
    pub tail: NodeKey,
    pub head: NodeKey,
    handle: Option<ModelHandle>,
    retired: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    // Keys index these vectors directly and are never reused.
    nodes: Vec<Option<NodeEntry>>,
    edges: Vec<Option<EdgeEntry>>,
    node_index: HashMap<String, NodeKey>,
    edge_index: HashMap<String, EdgeKey>,
    pending: ChangeBatch<NodeKey, EdgeKey>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node_key(&self, id: &str) -> Option<NodeKey> {
        self.node_index.get(id).copied()
    }

    pub fn edge_key(&self, id: &str) -> Option<EdgeKey> {
        self.edge_index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&NodeEntry> {
        self.node_key(id).and_then(|k| self.live_node(k))
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeEntry> {
        let k = self.edge_key(id)?;
        self.edges[k.0 as usize].as_ref().filter(|e| !e.retired)
    }

    pub fn position(&self, id: &str) -> Option<Point> {
        self.node(id).and_then(|n| n.position)
    }

    /// Live node ids in insertion order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| !n.retired)
            .map(|n| n.id.as_str())
    }

    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        position: Option<Point>,
        size: Option<Size>,
    ) -> Result<NodeKey, GraphError> {
        let id = id.into();
        if self.node_index.contains_key(&id) {
            return Err(GraphError::DuplicateNode { id });
        }
        let key = NodeKey(self.nodes.len() as u32);
        self.nodes.push(Some(NodeEntry {
            id: id.clone(),
            position,
            size,
            pinned: false,
            handle: None,
            retired: false,
        }));
        self.node_index.insert(id, key);
        self.pending.insert_node(key);
        Ok(key)
    }

    pub fn add_edge(
        &mut self,
        id: impl Into<String>,
        tail: &str,
        head: &str,
    ) -> Result<EdgeKey, GraphError> {
        let id = id.into();
        if self.edge_index.contains_key(&id) {
            return Err(GraphError::DuplicateEdge { id });
        }
        let tail = self.require_node(tail)?;
        let head = self.require_node(head)?;
        let key = EdgeKey(self.edges.len() as u32);
        self.edges.push(Some(EdgeEntry {
            id: id.clone(),
            tail,
            head,
            handle: None,
            retired: false,
        }));
        self.edge_index.insert(id, key);
        self.pending.insert_edge(key);
        Ok(key)
    }

    pub fn move_node(&mut self, id: &str, position: Point) -> Result<(), GraphError> {
        let key = self.require_node(id)?;
        if let Some(n) = self.nodes[key.0 as usize].as_mut() {
            n.position = Some(position);
        }
        self.pending.modify_node(key, NodeChange::MOVED);
        Ok(())
    }

    /// Drops the client position. The change is reported as a move; the engine keeps its own
    /// position for the node and writes it back on the next run.
    pub fn clear_position(&mut self, id: &str) -> Result<(), GraphError> {
        let key = self.require_node(id)?;
        if let Some(n) = self.nodes[key.0 as usize].as_mut() {
            n.position = None;
        }
        self.pending.modify_node(key, NodeChange::MOVED);
        Ok(())
    }

    pub fn resize_node(&mut self, id: &str, size: Option<Size>) -> Result<(), GraphError> {
        let key = self.require_node(id)?;
        if let Some(n) = self.nodes[key.0 as usize].as_mut() {
            n.size = size;
        }
        self.pending.modify_node(key, NodeChange::RESIZED);
        Ok(())
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<(), GraphError> {
        let key = self.require_node(id)?;
        if let Some(n) = self.nodes[key.0 as usize].as_mut() {
            n.pinned = pinned;
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<(), GraphError> {
        let Some(key) = self.edge_index.remove(id) else {
            return Err(GraphError::UnknownEdge { id: id.to_string() });
        };
        if let Some(e) = self.edges[key.0 as usize].as_mut() {
            e.retired = true;
        }
        self.pending.delete_edge(key);
        Ok(())
    }

    /// Removes the node together with every incident edge.
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        let key = self.require_node(id)?;
        let incident: Vec<String> = self
            .edges
            .iter()
            .flatten()
            .filter(|e| !e.retired && (e.tail == key || e.head == key))
            .map(|e| e.id.clone())
            .collect();
        for edge_id in incident {
            self.remove_edge(&edge_id)?;
        }
        self.node_index.remove(id);
        if let Some(n) = self.nodes[key.0 as usize].as_mut() {
            n.retired = true;
        }
        self.pending.delete_node(key);
        Ok(())
    }

    /// Hands out the changes recorded since the previous call. Entries retired by earlier batches
    /// are dropped; entries deleted by the returned batch stay until the next call.
    pub fn take_changes(&mut self) -> ChangeBatch<NodeKey, EdgeKey> {
        let batch = std::mem::take(&mut self.pending);
        for (i, slot) in self.nodes.iter_mut().enumerate() {
            let stale = slot.as_ref().is_some_and(|n| n.retired)
                && !batch.deleted_nodes.contains(&NodeKey(i as u32));
            if stale {
                *slot = None;
            }
        }
        for (i, slot) in self.edges.iter_mut().enumerate() {
            let stale = slot.as_ref().is_some_and(|e| e.retired)
                && !batch.deleted_edges.contains(&EdgeKey(i as u32));
            if stale {
                *slot = None;
            }
        }
        batch
    }

    fn require_node(&self, id: &str) -> Result<NodeKey, GraphError> {
        self.node_key(id)
            .ok_or_else(|| GraphError::UnknownNode { id: id.to_string() })
    }

    fn live_node(&self, key: NodeKey) -> Option<&NodeEntry> {
        self.nodes
            .get(key.0 as usize)?
            .as_ref()
            .filter(|n| !n.retired)
    }

    fn any_node(&self, key: NodeKey) -> Option<&NodeEntry> {
        self.nodes.get(key.0 as usize)?.as_ref()
    }

    fn any_node_mut(&mut self, key: NodeKey) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(key.0 as usize)?.as_mut()
    }

    fn any_edge(&self, key: EdgeKey) -> Option<&EdgeEntry> {
        self.edges.get(key.0 as usize)?.as_ref()
    }
}

impl LayoutGraph for Graph {
    type NodeId = NodeKey;
    type EdgeId = EdgeKey;

    fn node_ids(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_ref().is_some_and(|n| !n.retired))
            .map(|(i, _)| NodeKey(i as u32))
            .collect()
    }

    fn position(&self, node: NodeKey) -> Option<Point> {
        self.any_node(node).and_then(|n| n.position)
    }

    fn size(&self, node: NodeKey) -> Option<Size> {
        self.any_node(node).and_then(|n| n.size)
    }

    fn is_pinned(&self, node: NodeKey) -> bool {
        self.any_node(node).is_some_and(|n| n.pinned)
    }

    fn set_position(&mut self, node: NodeKey, position: Point) {
        if let Some(n) = self.any_node_mut(node) {
            n.position = Some(position);
        }
    }

    fn node_handle(&self, node: NodeKey) -> Option<ModelHandle> {
        self.any_node(node).and_then(|n| n.handle)
    }

    fn set_node_handle(&mut self, node: NodeKey, handle: Option<ModelHandle>) {
        if let Some(n) = self.any_node_mut(node) {
            n.handle = handle;
        }
    }

    fn endpoints(&self, edge: EdgeKey) -> Option<(NodeKey, NodeKey)> {
        self.any_edge(edge).map(|e| (e.tail, e.head))
    }

    fn edge_handle(&self, edge: EdgeKey) -> Option<ModelHandle> {
        self.any_edge(edge).and_then(|e| e.handle)
    }

    fn set_edge_handle(&mut self, edge: EdgeKey, handle: Option<ModelHandle>) {
        if let Some(e) = self.edges.get_mut(edge.0 as usize).and_then(Option::as_mut) {
            e.handle = handle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Graph, GraphError};
    use crate::graph::{LayoutGraph, NodeChange, Point};

    #[test]
    fn mutations_are_recorded_as_a_batch() {
        let mut g = Graph::new();
        let a = g.add_node("a", None, None).unwrap();
        let b = g.add_node("b", None, None).unwrap();
        let ab = g.add_edge("ab", "a", "b").unwrap();

        let batch = g.take_changes();
        assert_eq!(batch.inserted_nodes.iter().copied().collect::<Vec<_>>(), vec![a, b]);
        assert!(batch.inserted_edges.contains(&ab));
        assert!(g.take_changes().is_empty());

        g.move_node("a", Point::new(3.0, 4.0)).unwrap();
        let batch = g.take_changes();
        assert_eq!(batch.modified_nodes.get(&a), Some(&NodeChange::MOVED));
    }

    #[test]
    fn remove_node_retires_incident_edges_first() {
        let mut g = Graph::new();
        g.add_node("a", None, None).unwrap();
        g.add_node("b", None, None).unwrap();
        let ab = g.add_edge("ab", "a", "b").unwrap();
        let _ = g.take_changes();

        let a = g.node_key("a").unwrap();
        g.remove_node("a").unwrap();
        let batch = g.take_changes();
        assert!(batch.deleted_edges.contains(&ab));
        assert!(batch.deleted_nodes.contains(&a));
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        assert!(!g.node_ids().contains(&a));
        // Retired entries stay resolvable for the engine.
        assert!(g.endpoints(ab).is_some());
    }

    #[test]
    fn duplicate_and_unknown_ids_are_rejected() {
        let mut g = Graph::new();
        g.add_node("a", None, None).unwrap();
        assert_eq!(
            g.add_node("a", None, None),
            Err(GraphError::DuplicateNode { id: "a".into() })
        );
        assert_eq!(
            g.add_edge("e", "a", "zz"),
            Err(GraphError::UnknownNode { id: "zz".into() })
        );
        assert_eq!(
            g.remove_edge("e"),
            Err(GraphError::UnknownEdge { id: "e".into() })
        );
    }
}
