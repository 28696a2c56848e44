//! `Network` — the ordered node population.
//!
//! Nodes live in one dense `Vec`; a node's *index* is its current position
//! and changes whenever a removal swaps the last node into the hole.  The
//! permanent [`NodeId`] does not change, and `index_of` maps it back to the
//! current position in O(1).
//!
//! Indices are only valid until the next structural change.  Components that
//! need to remember a node across rounds keep its `NodeId`.

use ps_core::NodeId;

use crate::{Liveness, NetworkError, NetworkResult, Node};

#[cfg(feature = "fx-hash")]
type IdMap = rustc_hash::FxHashMap<NodeId, usize>;
#[cfg(not(feature = "fx-hash"))]
type IdMap = std::collections::HashMap<NodeId, usize>;

/// Liveness head-count.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Census {
    pub up:   usize,
    pub down: usize,
    pub dead: usize,
}

/// The node population.
#[derive(Debug, Default)]
pub struct Network {
    nodes:    Vec<Node>,
    index:    IdMap,
    next_id:  u64,
    /// Nominal maximum size; the default upper bound for churn.
    capacity: usize,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            index: IdMap::default(),
            next_id: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Hand out a fresh, never-reused `NodeId`.
    pub fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── Access ────────────────────────────────────────────────────────────

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    pub fn node(&self, index: usize) -> NetworkResult<&Node> {
        let len = self.nodes.len();
        self.nodes.get(index).ok_or(NetworkError::IndexOutOfRange { index, len })
    }

    pub fn node_mut(&mut self, index: usize) -> NetworkResult<&mut Node> {
        let len = self.nodes.len();
        self.nodes.get_mut(index).ok_or(NetworkError::IndexOutOfRange { index, len })
    }

    /// Current index of `id`, or `None` if it has been removed.
    #[inline]
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(self.index_of(id)?)
    }

    pub fn by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let i = self.index_of(id)?;
        self.nodes.get_mut(i)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    // ── Structural changes ────────────────────────────────────────────────

    /// Append `node`; returns its index.  A node whose id is already
    /// present is rejected.
    pub fn add(&mut self, node: Node) -> NetworkResult<usize> {
        let id = node.id();
        if self.index.contains_key(&id) {
            return Err(NetworkError::DuplicateNode(id));
        }
        let i = self.nodes.len();
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        self.index.insert(id, i);
        self.nodes.push(node);
        Ok(i)
    }

    pub fn remove_last(&mut self) -> Option<Node> {
        let node = self.nodes.pop()?;
        self.index.remove(&node.id());
        Some(node)
    }

    /// Exchange the nodes at `i` and `j`.
    pub fn swap(&mut self, i: usize, j: usize) -> NetworkResult<()> {
        let len = self.nodes.len();
        for index in [i, j] {
            if index >= len {
                return Err(NetworkError::IndexOutOfRange { index, len });
            }
        }
        self.nodes.swap(i, j);
        self.index.insert(self.nodes[i].id(), i);
        self.index.insert(self.nodes[j].id(), j);
        Ok(())
    }

    /// Remove the node at `index` in O(1): the last node takes its place.
    pub fn remove_at(&mut self, index: usize) -> NetworkResult<Node> {
        let last = self.nodes.len().checked_sub(1).ok_or(NetworkError::IndexOutOfRange {
            index,
            len: 0,
        })?;
        self.swap(index, last)?;
        self.remove_last().ok_or(NetworkError::IndexOutOfRange { index, len: 0 })
    }

    /// Remove every `Dead` node.  Returns how many were removed.
    pub fn purge_dead(&mut self) -> NetworkResult<usize> {
        let mut removed = 0;
        for i in (0..self.nodes.len()).rev() {
            if self.nodes[i].liveness() == Liveness::Dead {
                self.remove_at(i)?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, size = self.nodes.len(), "purged dead nodes");
        }
        Ok(removed)
    }

    // ── Liveness ──────────────────────────────────────────────────────────

    pub fn set_liveness(&mut self, index: usize, liveness: Liveness) -> NetworkResult<bool> {
        Ok(self.node_mut(index)?.set_liveness(liveness))
    }

    pub fn census(&self) -> Census {
        let mut c = Census::default();
        for n in &self.nodes {
            match n.liveness() {
                Liveness::Up => c.up += 1,
                Liveness::Down => c.down += 1,
                Liveness::Dead => c.dead += 1,
            }
        }
        c
    }
}
