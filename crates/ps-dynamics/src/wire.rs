//! Overlay wiring through a linkable protocol slot.
//!
//! Both wirings read `protocol` (the name of the linkable slot) and honour
//! the flags `undir` (add every edge in both directions) and `pack` (compact
//! neighbour sets afterwards).

use ps_core::params::key;
use ps_core::{Params, PsError, ProtocolId, RandPermutation};
use ps_network::{
    Control, ControlContext, InitContext, NetworkError, NetworkResult, Node, NodeInitializer,
    OverlayGraphMut, ProtocolTable,
};

pub const PAR_PROT: &str = "protocol";
pub const PAR_K: &str = "k";
pub const PAR_UNDIR: &str = "undir";
pub const PAR_PACK: &str = "pack";

fn linkable_slot(
    params:    &Params,
    prefix:    &str,
    protocols: &ProtocolTable,
) -> NetworkResult<ProtocolId> {
    let name_key = key(prefix, PAR_PROT);
    let name = params.get_str(&name_key)?;
    let pid = protocols.lookup(name)?;
    if !protocols.spec(pid)?.is_linkable() {
        return Err(PsError::illegal(name_key, format!("protocol {name:?} is not linkable")).into());
    }
    Ok(pid)
}

// ── WireKOut ──────────────────────────────────────────────────────────────────

/// Random out-degree-`k` overlay: every node links to `k` distinct other
/// nodes chosen uniformly (all others if the network is smaller than
/// `k + 1`).
#[derive(Debug, Clone)]
pub struct WireKOut {
    pid:        ProtocolId,
    k:          usize,
    undirected: bool,
    pack:       bool,
    perm:       RandPermutation,
}

impl WireKOut {
    pub fn new(pid: ProtocolId, k: usize) -> Self {
        Self { pid, k, undirected: false, pack: false, perm: RandPermutation::new() }
    }

    pub fn from_params(
        params:    &Params,
        prefix:    &str,
        protocols: &ProtocolTable,
    ) -> NetworkResult<Self> {
        let pid = linkable_slot(params, prefix, protocols)?;
        let k = params.get_usize(&key(prefix, PAR_K))?;
        let mut w = Self::new(pid, k);
        w.undirected = params.contains(&key(prefix, PAR_UNDIR));
        w.pack = params.contains(&key(prefix, PAR_PACK));
        Ok(w)
    }

    pub fn undirected(mut self) -> Self {
        self.undirected = true;
        self
    }
}

impl Control for WireKOut {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let n = ctx.network.len();
        let mut g = OverlayGraphMut::new(ctx.network, ctx.protocols, self.pid, self.undirected)?;
        if n >= 2 {
            let k = self.k.min(n - 1);
            for i in 0..n {
                self.perm.reset(n);
                let mut linked = 0;
                while linked < k {
                    let j = self.perm.next(ctx.rng)?;
                    if j != i {
                        g.set_edge(i, j)?;
                        linked += 1;
                    }
                }
            }
        }
        if self.pack {
            g.pack();
        }
        Ok(false)
    }
}

impl NodeInitializer for WireKOut {
    /// Link the fresh node to `k` random existing nodes.  Only out-edges are
    /// added: existing nodes are not modified.
    fn initialize(&mut self, node: &mut Node, ctx: &mut InitContext<'_>) -> NetworkResult<()> {
        let n = ctx.network.len();
        let k = self.k.min(n);
        let id = node.id();
        let links = ctx.protocols.linkable_mut(node, self.pid).ok_or_else(|| {
            NetworkError::Protocol(format!("slot {} of {id} is not linkable", self.pid))
        })?;
        self.perm.reset(n);
        for _ in 0..k {
            let j = self.perm.next(ctx.rng)?;
            if let Some(other) = ctx.network.get(j) {
                links.add_neighbor(other.id());
            }
        }
        if self.pack {
            links.pack();
        }
        Ok(())
    }
}

// ── WireRingLattice ───────────────────────────────────────────────────────────

/// Ring lattice: node `i` links to the `k` nodes after it and the `k`
/// nodes before it on the index ring, for an out-degree of `2k`.
#[derive(Debug, Clone)]
pub struct WireRingLattice {
    pid:  ProtocolId,
    k:    usize,
    pack: bool,
}

impl WireRingLattice {
    pub fn new(pid: ProtocolId, k: usize) -> Self {
        Self { pid, k, pack: false }
    }

    pub fn from_params(
        params:    &Params,
        prefix:    &str,
        protocols: &ProtocolTable,
    ) -> NetworkResult<Self> {
        let pid = linkable_slot(params, prefix, protocols)?;
        let k = params.get_usize(&key(prefix, PAR_K))?;
        Ok(Self { pid, k, pack: params.contains(&key(prefix, PAR_PACK)) })
    }
}

impl Control for WireRingLattice {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let n = ctx.network.len();
        let mut g = OverlayGraphMut::new(ctx.network, ctx.protocols, self.pid, false)?;
        for i in 0..n {
            for d in 1..=self.k.min(n.saturating_sub(1)) {
                g.set_edge(i, (i + d) % n)?;
                g.set_edge(i, (i + n - d) % n)?;
            }
        }
        if self.pack {
            g.pack();
        }
        Ok(false)
    }
}
