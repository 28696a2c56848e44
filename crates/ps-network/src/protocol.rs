//! Protocol capability contracts and the per-simulation protocol table.
//!
//! A protocol is any `Clone + 'static` type that opts in with
//! `impl Protocol for T {}`.  What the engine may *do* with it is declared
//! once, when its slot is registered:
//!
//! ```rust,ignore
//! let avg = table.register(
//!     ProtocolSpec::new("avg")
//!         .scheduled(Scheduler::every(1)?)
//!         .cycle::<Average>()
//!         .event::<Average>(),
//! );
//! ```
//!
//! Each capability becomes a plain function pointer in the slot's
//! [`ProtocolSpec`]; the dispatch loops call through it and never inspect
//! instance types themselves.

use std::any::{Any, type_name};

use ps_core::{NodeId, ProtocolId, SimRng, Time};
use ps_schedule::Scheduler;

use crate::{Network, NetworkError, NetworkResult, Node, Outgoing, ProtocolContext};

// ── Instance traits ───────────────────────────────────────────────────────────

/// Object plumbing every protocol instance gets for free from `Clone`.
pub trait ProtocolObject {
    fn box_clone(&self) -> Box<dyn Protocol>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Protocol + Clone> ProtocolObject for T {
    fn box_clone(&self) -> Box<dyn Protocol> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A protocol instance owned by a node.
pub trait Protocol: ProtocolObject + 'static {}

/// Cycle-driven capability: one step per active round.
pub trait CycleProtocol: Protocol {
    fn next_cycle(&mut self, ctx: &mut ProtocolContext<'_>) -> NetworkResult<()>;
}

/// Event-driven capability: react to a delivered message.
pub trait EventProtocol: Protocol {
    fn process_event(
        &mut self,
        payload: Box<dyn Any>,
        ctx:     &mut ProtocolContext<'_>,
    ) -> NetworkResult<()>;
}

/// Neighbour-set capability, consumed by overlay views and wiring.
pub trait Linkable: Protocol {
    fn degree(&self) -> usize;

    /// The `i`-th neighbour, `None` past the end.
    fn neighbor(&self, i: usize) -> Option<NodeId>;

    /// Add `id`; returns `false` if it was already present.
    fn add_neighbor(&mut self, id: NodeId) -> bool;

    fn contains(&self, id: NodeId) -> bool;

    /// Release spare capacity once wiring is complete.
    fn pack(&mut self) {}
}

/// Latency model: how long a message from `src` to `dest` is in flight.
pub trait Transport: Protocol {
    fn latency(&self, src: NodeId, dest: NodeId, rng: &mut SimRng) -> u64;
}

// ── Capability thunks ─────────────────────────────────────────────────────────

pub type CycleStep = fn(&mut dyn Protocol, &mut ProtocolContext<'_>) -> NetworkResult<()>;
pub type EventStep =
    fn(&mut dyn Protocol, Box<dyn Any>, &mut ProtocolContext<'_>) -> NetworkResult<()>;
pub type LinkableRef = fn(&dyn Protocol) -> Option<&dyn Linkable>;
pub type LinkableMut = fn(&mut dyn Protocol) -> Option<&mut dyn Linkable>;
pub type TransportRef = fn(&dyn Protocol) -> Option<&dyn Transport>;

fn mismatch<P>(pid: ProtocolId) -> NetworkError {
    NetworkError::Protocol(format!("slot {pid} does not hold a {}", type_name::<P>()))
}

fn cycle_step<P: CycleProtocol>(
    p:   &mut dyn Protocol,
    ctx: &mut ProtocolContext<'_>,
) -> NetworkResult<()> {
    match p.as_any_mut().downcast_mut::<P>() {
        Some(p) => p.next_cycle(ctx),
        None => Err(mismatch::<P>(ctx.pid)),
    }
}

fn event_step<P: EventProtocol>(
    p:       &mut dyn Protocol,
    payload: Box<dyn Any>,
    ctx:     &mut ProtocolContext<'_>,
) -> NetworkResult<()> {
    match p.as_any_mut().downcast_mut::<P>() {
        Some(p) => p.process_event(payload, ctx),
        None => Err(mismatch::<P>(ctx.pid)),
    }
}

fn linkable_ref<P: Linkable>(p: &dyn Protocol) -> Option<&dyn Linkable> {
    p.as_any().downcast_ref::<P>().map(|l| l as &dyn Linkable)
}

fn linkable_mut<P: Linkable>(p: &mut dyn Protocol) -> Option<&mut dyn Linkable> {
    p.as_any_mut().downcast_mut::<P>().map(|l| l as &mut dyn Linkable)
}

fn transport_ref<P: Transport>(p: &dyn Protocol) -> Option<&dyn Transport> {
    p.as_any().downcast_ref::<P>().map(|t| t as &dyn Transport)
}

// ── ProtocolSpec ──────────────────────────────────────────────────────────────

/// Registration record of one protocol slot.
#[derive(Clone)]
pub struct ProtocolSpec {
    name:      String,
    scheduler: Scheduler,
    cycle:     Option<CycleStep>,
    event:     Option<EventStep>,
    linkable:  Option<(LinkableRef, LinkableMut)>,
    transport: Option<TransportRef>,
}

impl ProtocolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:      name.into(),
            scheduler: Scheduler::default(),
            cycle:     None,
            event:     None,
            linkable:  None,
            transport: None,
        }
    }

    pub fn scheduled(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn cycle<P: CycleProtocol>(mut self) -> Self {
        self.cycle = Some(cycle_step::<P>);
        self
    }

    pub fn event<P: EventProtocol>(mut self) -> Self {
        self.event = Some(event_step::<P>);
        self
    }

    pub fn linkable<P: Linkable>(mut self) -> Self {
        self.linkable = Some((linkable_ref::<P> as LinkableRef, linkable_mut::<P> as LinkableMut));
        self
    }

    pub fn transport<P: Transport>(mut self) -> Self {
        self.transport = Some(transport_ref::<P>);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_cycle(&self) -> bool {
        self.cycle.is_some()
    }

    pub fn is_event(&self) -> bool {
        self.event.is_some()
    }

    pub fn is_linkable(&self) -> bool {
        self.linkable.is_some()
    }

    pub fn is_transport(&self) -> bool {
        self.transport.is_some()
    }
}

impl std::fmt::Debug for ProtocolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolSpec")
            .field("name", &self.name)
            .field("scheduler", &self.scheduler)
            .field("cycle", &self.is_cycle())
            .field("event", &self.is_event())
            .field("linkable", &self.is_linkable())
            .field("transport", &self.is_transport())
            .finish()
    }
}

// ── ProtocolTable ─────────────────────────────────────────────────────────────

/// All registered slots, indexed by `ProtocolId` in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ProtocolTable {
    specs: Vec<ProtocolSpec>,
}

impl ProtocolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot.  Ids are dense: the n-th registration gets `ProtocolId(n)`.
    pub fn register(&mut self, spec: ProtocolSpec) -> ProtocolId {
        let pid = ProtocolId(self.specs.len() as u16);
        self.specs.push(spec);
        pid
    }

    pub fn get(&self, pid: ProtocolId) -> Option<&ProtocolSpec> {
        self.specs.get(pid.index())
    }

    pub fn spec(&self, pid: ProtocolId) -> NetworkResult<&ProtocolSpec> {
        self.get(pid).ok_or(NetworkError::UnknownSlot(pid))
    }

    /// Slot registered under `name`.
    pub fn lookup(&self, name: &str) -> NetworkResult<ProtocolId> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .map(|i| ProtocolId(i as u16))
            .ok_or_else(|| NetworkError::UnknownProtocol(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProtocolId, &ProtocolSpec)> + '_ {
        self.specs.iter().enumerate().map(|(i, s)| (ProtocolId(i as u16), s))
    }

    // ── Capability access ─────────────────────────────────────────────────

    pub fn linkable<'n>(&self, node: &'n Node, pid: ProtocolId) -> Option<&'n dyn Linkable> {
        let (as_link, _) = self.get(pid)?.linkable?;
        as_link(node.protocol_dyn(pid)?)
    }

    pub fn transport<'n>(&self, node: &'n Node, pid: ProtocolId) -> Option<&'n dyn Transport> {
        let as_transport = self.get(pid)?.transport?;
        as_transport(node.protocol_dyn(pid)?)
    }

    pub fn linkable_mut<'n>(
        &self,
        node: &'n mut Node,
        pid:  ProtocolId,
    ) -> Option<&'n mut dyn Linkable> {
        let (_, as_link_mut) = self.get(pid)?.linkable?;
        as_link_mut(node.protocol_dyn_mut(pid)?)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// Run the cycle step of slot `pid` on the node at `index`.
    ///
    /// Returns `Ok(false)` if the slot has no cycle capability.
    #[allow(clippy::too_many_arguments)]
    pub fn run_cycle(
        &self,
        pid:     ProtocolId,
        network: &mut Network,
        rng:     &mut SimRng,
        time:    Time,
        index:   usize,
        outbox:  &mut Vec<Outgoing>,
    ) -> NetworkResult<bool> {
        let Some(step) = self.spec(pid)?.cycle else {
            return Ok(false);
        };
        self.with_instance(pid, network, rng, time, index, outbox, |p, ctx| step(p, ctx))?;
        Ok(true)
    }

    /// Deliver `payload` to the event handler of slot `pid` on the node at
    /// `index`.
    ///
    /// Returns `Ok(false)` if the slot has no event capability.
    #[allow(clippy::too_many_arguments)]
    pub fn deliver(
        &self,
        pid:     ProtocolId,
        network: &mut Network,
        rng:     &mut SimRng,
        time:    Time,
        index:   usize,
        payload: Box<dyn Any>,
        outbox:  &mut Vec<Outgoing>,
    ) -> NetworkResult<bool> {
        let Some(handle) = self.spec(pid)?.event else {
            return Ok(false);
        };
        self.with_instance(pid, network, rng, time, index, outbox, |p, ctx| {
            handle(p, payload, ctx)
        })?;
        Ok(true)
    }

    /// Check the instance out of its node, run `f`, and check it back in.
    ///
    /// The instance goes back to the node by `NodeId`, so it survives any
    /// re-indexing `f` causes; if `f` removed its own node the instance is
    /// dropped with it.
    #[allow(clippy::too_many_arguments)]
    fn with_instance<F>(
        &self,
        pid:     ProtocolId,
        network: &mut Network,
        rng:     &mut SimRng,
        time:    Time,
        index:   usize,
        outbox:  &mut Vec<Outgoing>,
        f:       F,
    ) -> NetworkResult<()>
    where
        F: FnOnce(&mut dyn Protocol, &mut ProtocolContext<'_>) -> NetworkResult<()>,
    {
        let node = network.node_mut(index)?;
        let node_id = node.id();
        if pid.index() >= node.slots() {
            return Err(NetworkError::UnknownSlot(pid));
        }
        let mut instance = node.checkout(pid).ok_or_else(|| {
            NetworkError::Protocol(format!("slot {pid} of {node_id} is already executing"))
        })?;

        let result = {
            let mut ctx = ProtocolContext::new(
                &mut *network,
                rng,
                self,
                time,
                index,
                node_id,
                pid,
                outbox,
            );
            f(&mut *instance, &mut ctx)
        };

        if let Some(node) = network.by_id_mut(node_id) {
            node.checkin(pid, instance);
        }
        result
    }
}
