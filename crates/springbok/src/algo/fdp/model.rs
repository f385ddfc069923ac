//! The engine's private mirror of the client graph.
//!
//! Nodes and edges live in generation-checked arenas; the client keeps a [`ModelHandle`] per
//! node/edge as its back-reference. A handle pointing at an empty slot, or at a slot recycled
//! for something else, is reported as an inconsistency rather than silently reused.

use crate::error::{Error, Result};
use crate::graph::{ModelHandle, Point, Size};

#[derive(Debug, Clone)]
pub(crate) struct ModelNode<N> {
    pub(crate) external: N,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) pinned: bool,
    /// Snapshot of the client size, refreshed at the start of every run.
    pub(crate) size: Option<Size>,
    pub(crate) out_edges: Vec<ModelHandle>,
    pub(crate) in_edges: Vec<ModelHandle>,
}

impl<N> ModelNode<N> {
    fn incident_edges(&self) -> usize {
        self.out_edges.len() + self.in_edges.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ModelEdge<E> {
    pub(crate) external: E,
    pub(crate) tail: ModelHandle,
    pub(crate) head: ModelHandle,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> ModelHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return ModelHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        ModelHandle {
            index,
            generation: 0,
        }
    }

    fn get(&self, h: ModelHandle) -> Option<&T> {
        self.slots
            .get(h.index as usize)
            .filter(|s| s.generation == h.generation)
            .and_then(|s| s.value.as_ref())
    }

    fn get_mut(&mut self, h: ModelHandle) -> Option<&mut T> {
        self.slots
            .get_mut(h.index as usize)
            .filter(|s| s.generation == h.generation)
            .and_then(|s| s.value.as_mut())
    }

    fn remove(&mut self, h: ModelHandle) -> Option<T> {
        let slot = self.slots.get_mut(h.index as usize)?;
        if slot.generation != h.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(h.index);
        self.len -= 1;
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (ModelHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| {
                (
                    ModelHandle {
                        index: i as u32,
                        generation: s.generation,
                    },
                    v,
                )
            })
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Model<N, E> {
    nodes: Arena<ModelNode<N>>,
    edges: Arena<ModelEdge<E>>,
}

impl<N, E> Default for Model<N, E> {
    fn default() -> Self {
        Self {
            nodes: Arena::default(),
            edges: Arena::default(),
        }
    }
}

impl<N: Copy + Eq + std::fmt::Debug, E: Copy + Eq + std::fmt::Debug> Model<N, E> {
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len
    }

    pub(crate) fn edge_count(&self) -> usize {
        self.edges.len
    }

    pub(crate) fn insert_node(&mut self, external: N, at: Point) -> ModelHandle {
        self.nodes.insert(ModelNode {
            external,
            x: at.x,
            y: at.y,
            pinned: false,
            size: None,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
        })
    }

    pub(crate) fn node(&self, h: ModelHandle) -> Option<&ModelNode<N>> {
        self.nodes.get(h)
    }

    pub(crate) fn node_mut(&mut self, h: ModelHandle) -> Option<&mut ModelNode<N>> {
        self.nodes.get_mut(h)
    }

    /// Resolves a client back-reference, rejecting missing or stale handles.
    pub(crate) fn require_node(&self, external: N, h: Option<ModelHandle>) -> Result<ModelHandle> {
        match h {
            Some(h) if self.nodes.get(h).is_some_and(|n| n.external == external) => Ok(h),
            Some(_) => Err(Error::inconsistency(format!(
                "node {external:?} refers to a stale or foreign model slot"
            ))),
            None => Err(Error::inconsistency(format!(
                "node {external:?} has no model node"
            ))),
        }
    }

    pub(crate) fn require_edge(&self, external: E, h: Option<ModelHandle>) -> Result<ModelHandle> {
        match h {
            Some(h) if self.edges.get(h).is_some_and(|e| e.external == external) => Ok(h),
            Some(_) => Err(Error::inconsistency(format!(
                "edge {external:?} refers to a stale or foreign model slot"
            ))),
            None => Err(Error::inconsistency(format!(
                "edge {external:?} has no model edge"
            ))),
        }
    }

    pub(crate) fn contains_node(&self, h: ModelHandle) -> bool {
        self.nodes.get(h).is_some()
    }

    pub(crate) fn contains_edge(&self, h: ModelHandle) -> bool {
        self.edges.get(h).is_some()
    }

    pub(crate) fn insert_edge(
        &mut self,
        external: E,
        tail: ModelHandle,
        head: ModelHandle,
    ) -> Result<ModelHandle> {
        if !self.contains_node(tail) || !self.contains_node(head) {
            return Err(Error::inconsistency(format!(
                "edge {external:?} has an endpoint without a model node"
            )));
        }
        let h = self.edges.insert(ModelEdge {
            external,
            tail,
            head,
        });
        if let Some(t) = self.nodes.get_mut(tail) {
            t.out_edges.push(h);
        }
        if let Some(n) = self.nodes.get_mut(head) {
            n.in_edges.push(h);
        }
        Ok(h)
    }

    pub(crate) fn remove_edge(&mut self, h: ModelHandle) -> Option<ModelEdge<E>> {
        let edge = self.edges.remove(h)?;
        if let Some(t) = self.nodes.get_mut(edge.tail) {
            t.out_edges.retain(|&e| e != h);
        }
        if let Some(n) = self.nodes.get_mut(edge.head) {
            n.in_edges.retain(|&e| e != h);
        }
        Some(edge)
    }

    /// Fails with `StillHasEdges` while any model edge touches the node.
    pub(crate) fn remove_node(&mut self, h: ModelHandle) -> Result<ModelNode<N>> {
        let Some(node) = self.nodes.get(h) else {
            return Err(Error::inconsistency("deleting a node without a model node"));
        };
        let edges = node.incident_edges();
        if edges > 0 {
            return Err(Error::StillHasEdges { edges });
        }
        self.nodes
            .remove(h)
            .ok_or_else(|| Error::inconsistency("model node vanished during removal"))
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (ModelHandle, &ModelNode<N>)> {
        self.nodes.iter()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (ModelHandle, &ModelEdge<E>)> {
        self.edges.iter()
    }
}
