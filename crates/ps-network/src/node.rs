//! A single population member: identity, liveness, protocol stack.

use ps_core::{NodeId, ProtocolId};

use crate::{NetworkError, NetworkResult, Protocol, ProtocolObject};

/// Participation state of a node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Liveness {
    /// Fully operational.
    #[default]
    Up,
    /// Unreachable, state preserved; may come back `Up`.
    Down,
    /// Terminal.  Purged from the population at the end of the pass.
    Dead,
}

/// One node of the simulated network.
///
/// Holds exactly one protocol instance per registered slot, indexed by
/// `ProtocolId`.  While a slot's instance is executing it is *checked out*:
/// the slot reads as empty until the dispatcher puts the instance back, so a
/// protocol never observes itself through the network.
pub struct Node {
    id:        NodeId,
    liveness:  Liveness,
    protocols: Vec<Option<Box<dyn Protocol>>>,
}

impl Node {
    pub fn new(id: NodeId, protocols: Vec<Box<dyn Protocol>>) -> Self {
        Self { id, liveness: Liveness::Up, protocols: protocols.into_iter().map(Some).collect() }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn liveness(&self) -> Liveness {
        self.liveness
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.liveness == Liveness::Up
    }

    /// Change the liveness state.  `Dead` is terminal: returns `false` and
    /// leaves the node unchanged if it is already dead.
    pub fn set_liveness(&mut self, liveness: Liveness) -> bool {
        if self.liveness == Liveness::Dead {
            return false;
        }
        self.liveness = liveness;
        true
    }

    /// Number of protocol slots.
    pub fn slots(&self) -> usize {
        self.protocols.len()
    }

    // ── Protocol access ───────────────────────────────────────────────────

    /// The instance in slot `pid`, downcast to its concrete type.
    pub fn protocol<P: Protocol>(&self, pid: ProtocolId) -> Option<&P> {
        self.protocol_dyn(pid)?.as_any().downcast_ref::<P>()
    }

    pub fn protocol_mut<P: Protocol>(&mut self, pid: ProtocolId) -> Option<&mut P> {
        self.protocol_dyn_mut(pid)?.as_any_mut().downcast_mut::<P>()
    }

    pub fn protocol_dyn(&self, pid: ProtocolId) -> Option<&dyn Protocol> {
        self.protocols.get(pid.index())?.as_deref()
    }

    pub fn protocol_dyn_mut(&mut self, pid: ProtocolId) -> Option<&mut (dyn Protocol + 'static)> {
        self.protocols.get_mut(pid.index())?.as_deref_mut()
    }

    /// Take the instance out of slot `pid` for execution.
    pub fn checkout(&mut self, pid: ProtocolId) -> Option<Box<dyn Protocol>> {
        self.protocols.get_mut(pid.index())?.take()
    }

    /// Return an instance taken with [`checkout`](Self::checkout).
    pub fn checkin(&mut self, pid: ProtocolId, protocol: Box<dyn Protocol>) {
        if let Some(slot) = self.protocols.get_mut(pid.index()) {
            *slot = Some(protocol);
        }
    }

    /// Deep copy under a new identity, `Up`.
    ///
    /// Fails with [`NetworkError::CloningFailure`] if any slot is checked out.
    pub fn duplicate(&self, id: NodeId) -> NetworkResult<Node> {
        let protocols = self
            .protocols
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.as_deref().map(|p| p.box_clone()).ok_or_else(|| {
                    NetworkError::CloningFailure(format!("slot {i} of {} is checked out", self.id))
                })
            })
            .collect::<NetworkResult<Vec<_>>>()?;
        Ok(Node::new(id, protocols))
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("liveness", &self.liveness)
            .field("slots", &self.protocols.len())
            .finish()
    }
}
