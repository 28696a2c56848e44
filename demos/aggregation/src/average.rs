//! Push-pull averaging and the neighbour list it gossips over.
//!
//! In a cycle-driven run the exchange is instantaneous: the initiator reads
//! the peer's value and both adopt the mean in the same step.  With `delay`
//! or `transport` configured the exchange is split into a `Push` and a
//! `Pull` message, so the same protocol runs under the event engine.

use std::any::Any;

use ps_core::params::key;
use ps_core::{NodeId, ProtocolId, PsError};
use ps_network::{
    CycleProtocol, EventProtocol, Linkable, NetworkError, NetworkResult, Protocol, ProtocolContext,
};
use ps_sim::{Resolver, SimResult};

pub const PAR_LINKABLE: &str = "linkable";
pub const PAR_DELAY: &str = "delay";
pub const PAR_TRANSPORT: &str = "transport";

// ── Neighbors ─────────────────────────────────────────────────────────────────

/// Unbounded, insertion-ordered neighbour list.
#[derive(Clone, Debug, Default)]
pub struct Neighbors {
    links: Vec<NodeId>,
}

impl Protocol for Neighbors {}

impl Linkable for Neighbors {
    fn degree(&self) -> usize {
        self.links.len()
    }

    fn neighbor(&self, i: usize) -> Option<NodeId> {
        self.links.get(i).copied()
    }

    fn add_neighbor(&mut self, id: NodeId) -> bool {
        if self.links.contains(&id) {
            return false;
        }
        self.links.push(id);
        true
    }

    fn contains(&self, id: NodeId) -> bool {
        self.links.contains(&id)
    }

    fn pack(&mut self) {
        self.links.shrink_to_fit();
    }
}

// ── Average ───────────────────────────────────────────────────────────────────

/// Messages of the delayed exchange.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Exchange {
    Push { from: NodeId, value: f64 },
    Pull { value: f64 },
}

/// How the two halves of an exchange travel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Both values are read and written in the initiator's step.
    InPlace,
    /// Messages taking a fixed number of time units each way.
    Fixed(u64),
    /// Messages delayed by the sender's transport slot.
    Transport(ProtocolId),
}

/// One node's running estimate of the global average.
#[derive(Clone, Debug)]
pub struct Average {
    value:    f64,
    links:    ProtocolId,
    delivery: Delivery,
}

impl Average {
    pub fn new(links: ProtocolId) -> Self {
        Self { value: 0.0, links, delivery: Delivery::InPlace }
    }

    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delivery = Delivery::Fixed(delay);
        self
    }

    pub fn with_transport(mut self, transport: ProtocolId) -> Self {
        self.delivery = Delivery::Transport(transport);
        self
    }

    /// Reads `linkable` (name of the neighbour slot), then either
    /// `transport` (name of a transport slot) or `delay`.
    pub fn from_params(res: &Resolver<'_>, prefix: &str) -> SimResult<Self> {
        let link_key = key(prefix, PAR_LINKABLE);
        let name = res.params.get_str(&link_key)?;
        let links = res.protocols.lookup(name)?;
        if !res.protocols.spec(links)?.is_linkable() {
            return Err(PsError::illegal(link_key, format!("protocol {name:?} is not linkable")).into());
        }
        let mut avg = Self::new(links);
        let transport_key = key(prefix, PAR_TRANSPORT);
        let delay_key = key(prefix, PAR_DELAY);
        if res.params.contains(&transport_key) {
            let name = res.params.get_str(&transport_key)?;
            let tr = res.protocols.lookup(name)?;
            if !res.protocols.spec(tr)?.is_transport() {
                let reason = format!("protocol {name:?} is not a transport");
                return Err(PsError::illegal(transport_key, reason).into());
            }
            avg = avg.with_transport(tr);
        } else if res.params.contains(&delay_key) {
            avg = avg.with_delay(res.params.get_u64(&delay_key)?);
        }
        Ok(avg)
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    /// A uniformly chosen neighbour that is present and Up.
    fn pick_peer(&self, ctx: &mut ProtocolContext<'_>) -> Option<NodeId> {
        let degree = ctx.linkable(self.links)?.degree();
        if degree == 0 {
            return None;
        }
        let i = ctx.rng.index(degree);
        let peer = ctx.linkable(self.links)?.neighbor(i)?;
        ctx.network.by_id(peer).filter(|n| n.is_up()).map(|_| peer)
    }

    fn post(&self, ctx: &mut ProtocolContext<'_>, to: NodeId, msg: Exchange) -> NetworkResult<()> {
        match self.delivery {
            Delivery::Transport(tr) => ctx.send_via(tr, to, ctx.pid, msg),
            Delivery::Fixed(delay) => {
                ctx.send(delay, to, ctx.pid, msg);
                Ok(())
            }
            Delivery::InPlace => {
                ctx.send(1, to, ctx.pid, msg);
                Ok(())
            }
        }
    }
}

impl Protocol for Average {}

impl CycleProtocol for Average {
    fn next_cycle(&mut self, ctx: &mut ProtocolContext<'_>) -> NetworkResult<()> {
        let Some(peer) = self.pick_peer(ctx) else {
            return Ok(());
        };
        match self.delivery {
            Delivery::InPlace => {
                let pid = ctx.pid;
                let Some(other) =
                    ctx.network.by_id_mut(peer).and_then(|n| n.protocol_mut::<Average>(pid))
                else {
                    return Ok(());
                };
                let mean = (self.value + other.value) / 2.0;
                other.value = mean;
                self.value = mean;
            }
            Delivery::Fixed(_) | Delivery::Transport(_) => {
                let push = Exchange::Push { from: ctx.node_id, value: self.value };
                self.post(ctx, peer, push)?;
            }
        }
        Ok(())
    }
}

impl EventProtocol for Average {
    fn process_event(
        &mut self,
        payload: Box<dyn Any>,
        ctx:     &mut ProtocolContext<'_>,
    ) -> NetworkResult<()> {
        let msg = payload
            .downcast::<Exchange>()
            .map_err(|_| NetworkError::Protocol("averaging slot received a foreign message".into()))?;
        match *msg {
            Exchange::Push { from, value } => {
                let reply = Exchange::Pull { value: self.value };
                self.post(ctx, from, reply)?;
                self.value = (self.value + value) / 2.0;
            }
            Exchange::Pull { value } => {
                self.value = (self.value + value) / 2.0;
            }
        }
        Ok(())
    }
}
