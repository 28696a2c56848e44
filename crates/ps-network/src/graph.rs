//! Graph views over the population.
//!
//! Both views read neighbour sets straight from a linkable protocol slot and
//! borrow the network, so they cannot outlive the pass that created them.
//! Vertices are node indices.

use ps_core::{NodeId, ProtocolId};

use crate::{Linkable, Network, NetworkError, NetworkResult, ProtocolTable};

fn require_linkable(protocols: &ProtocolTable, pid: ProtocolId) -> NetworkResult<()> {
    if protocols.spec(pid)?.is_linkable() {
        Ok(())
    } else {
        Err(NetworkError::Protocol(format!("slot {pid} is not linkable")))
    }
}

// ── OverlayGraph ──────────────────────────────────────────────────────────────

/// Read-only directed overlay.  An edge `i → j` exists iff `j` is in `i`'s
/// neighbour set and both endpoints are `Up`.
pub struct OverlayGraph<'a> {
    network:   &'a Network,
    protocols: &'a ProtocolTable,
    pid:       ProtocolId,
}

impl<'a> OverlayGraph<'a> {
    pub fn new(
        network:   &'a Network,
        protocols: &'a ProtocolTable,
        pid:       ProtocolId,
    ) -> NetworkResult<Self> {
        require_linkable(protocols, pid)?;
        Ok(Self { network, protocols, pid })
    }

    pub fn size(&self) -> usize {
        self.network.len()
    }

    fn links(&self, i: usize) -> Option<&'a dyn Linkable> {
        let node = self.network.get(i)?;
        if !node.is_up() {
            return None;
        }
        self.protocols.linkable(node, self.pid)
    }

    fn up_id(&self, j: usize) -> Option<NodeId> {
        self.network.get(j).filter(|n| n.is_up()).map(|n| n.id())
    }

    pub fn is_edge(&self, i: usize, j: usize) -> bool {
        match (self.links(i), self.up_id(j)) {
            (Some(l), Some(id)) => l.contains(id),
            _ => false,
        }
    }

    /// Indices of `i`'s `Up` neighbours, in neighbour-set order.
    pub fn neighbours(&self, i: usize) -> Vec<usize> {
        let Some(l) = self.links(i) else {
            return Vec::new();
        };
        (0..l.degree())
            .filter_map(|k| l.neighbor(k))
            .filter_map(|id| self.network.index_of(id))
            .filter(|j| self.network.get(*j).is_some_and(|n| n.is_up()))
            .collect()
    }

    pub fn degree(&self, i: usize) -> usize {
        self.neighbours(i).len()
    }
}

// ── OverlayGraphMut ───────────────────────────────────────────────────────────

/// Wiring view: adds edges through a linkable slot.
pub struct OverlayGraphMut<'a> {
    network:    &'a mut Network,
    protocols:  &'a ProtocolTable,
    pid:        ProtocolId,
    /// Also add the reverse edge on every `set_edge`.
    undirected: bool,
}

impl<'a> OverlayGraphMut<'a> {
    pub fn new(
        network:    &'a mut Network,
        protocols:  &'a ProtocolTable,
        pid:        ProtocolId,
        undirected: bool,
    ) -> NetworkResult<Self> {
        require_linkable(protocols, pid)?;
        Ok(Self { network, protocols, pid, undirected })
    }

    pub fn size(&self) -> usize {
        self.network.len()
    }

    /// Add `i → j` (and `j → i` if undirected).  Returns `true` if any edge
    /// was new.
    pub fn set_edge(&mut self, i: usize, j: usize) -> NetworkResult<bool> {
        let id_i = self.network.node(i)?.id();
        let id_j = self.network.node(j)?.id();
        let mut added = self.link(i, id_j)?;
        if self.undirected {
            added |= self.link(j, id_i)?;
        }
        Ok(added)
    }

    fn link(&mut self, from: usize, to: NodeId) -> NetworkResult<bool> {
        let pid = self.pid;
        let node = self.network.node_mut(from)?;
        let id = node.id();
        let links = self.protocols.linkable_mut(node, pid).ok_or_else(|| {
            NetworkError::Protocol(format!("slot {pid} of {id} is not available for wiring"))
        })?;
        Ok(links.add_neighbor(to))
    }

    /// Call `pack` on every node's neighbour set.
    pub fn pack(&mut self) {
        for i in 0..self.network.len() {
            if let Some(node) = self.network.get_mut(i) {
                if let Some(links) = self.protocols.linkable_mut(node, self.pid) {
                    links.pack();
                }
            }
        }
    }
}
