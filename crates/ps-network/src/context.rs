//! Execution contexts handed to protocol, control and initializer code, and
//! the outgoing-event records they produce.
//!
//! A context borrows the simulation state for the duration of one call.  It
//! never outlives that call, so no component can keep a reference into the
//! population across a churn step.  Anything a component wants to happen
//! later goes into the context's outbox as an [`Outgoing`] record; the
//! event engine drains the outbox into its queue when the call returns.

use std::any::Any;
use std::fmt;

use ps_core::{NodeId, ProtocolId, SimRng, Time};
use ps_schedule::TimePoint;

use crate::{Linkable, Liveness, Network, NetworkError, NetworkResult, Node, ProtocolTable};

// ── Outgoing events ───────────────────────────────────────────────────────────

/// How a recurring cycle event computes the delay to its next firing.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum DelayPolicy {
    /// The `step` of the slot's scheduler.
    #[default]
    Step,
    /// Exponentially distributed with the given mean.
    Exponential { mean: f64 },
}

/// The self-rescheduling event that emulates cycle-driven execution inside
/// the event engine.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct NextCycle {
    /// Run the cycle step even if the node is `Down`.
    pub persist_exec:     bool,
    /// Keep rescheduling even if the node is `Down`.
    pub persist_schedule: bool,
    pub delay:            DelayPolicy,
}

/// What an event carries.
pub enum Payload {
    /// Opaque message for the target slot's event handler.
    Message(Box<dyn Any>),
    NextCycle(NextCycle),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Message(_) => f.write_str("Message(..)"),
            Payload::NextCycle(nc) => f.debug_tuple("NextCycle").field(nc).finish(),
        }
    }
}

/// An event a component asks to have enqueued.
#[derive(Debug)]
pub struct Outgoing {
    pub at:      Time,
    pub target:  NodeId,
    pub pid:     ProtocolId,
    pub payload: Payload,
}

impl Outgoing {
    pub fn message(at: Time, target: NodeId, pid: ProtocolId, msg: impl Any) -> Self {
        Self { at, target, pid, payload: Payload::Message(Box::new(msg)) }
    }

    pub fn next_cycle(at: Time, target: NodeId, pid: ProtocolId, nc: NextCycle) -> Self {
        Self { at, target, pid, payload: Payload::NextCycle(nc) }
    }
}

// ── ProtocolContext ───────────────────────────────────────────────────────────

/// What a protocol step sees.
///
/// The executing instance is checked out of its node for the duration of
/// the step: `self.network` shows that slot as empty.
pub struct ProtocolContext<'a> {
    pub network:   &'a mut Network,
    pub rng:       &'a mut SimRng,
    pub protocols: &'a ProtocolTable,
    /// Current round (cycle mode) or event time (event mode).
    pub time:      Time,
    /// Position of the executing node when the step started.  The step may
    /// reorder the population; `node_id` stays valid.
    pub node:      usize,
    pub node_id:   NodeId,
    pub pid:       ProtocolId,
    outbox:        &'a mut Vec<Outgoing>,
}

impl<'a> ProtocolContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network:   &'a mut Network,
        rng:       &'a mut SimRng,
        protocols: &'a ProtocolTable,
        time:      Time,
        node:      usize,
        node_id:   NodeId,
        pid:       ProtocolId,
        outbox:    &'a mut Vec<Outgoing>,
    ) -> Self {
        Self { network, rng, protocols, time, node, node_id, pid, outbox }
    }

    /// The executing node.
    pub fn this_node(&self) -> Option<&Node> {
        self.network.by_id(self.node_id)
    }

    pub fn this_node_mut(&mut self) -> Option<&mut Node> {
        self.network.by_id_mut(self.node_id)
    }

    /// The executing node's instance in another slot, as a neighbour set.
    pub fn linkable(&self, pid: ProtocolId) -> Option<&dyn Linkable> {
        self.protocols.linkable(self.this_node()?, pid)
    }

    /// Change the executing node's liveness.
    pub fn set_liveness(&mut self, liveness: Liveness) -> bool {
        self.this_node_mut().is_some_and(|n| n.set_liveness(liveness))
    }

    /// Send `msg` to slot `pid` of `target`, `delay` units from now.
    pub fn send(&mut self, delay: u64, target: NodeId, pid: ProtocolId, msg: impl Any) {
        let at = self.time.offset(delay);
        self.outbox.push(Outgoing::message(at, target, pid, msg));
    }

    /// Send `msg` to slot `pid` of `target` with the delay chosen by the
    /// executing node's instance in slot `transport`.
    pub fn send_via(
        &mut self,
        transport: ProtocolId,
        target:    NodeId,
        pid:       ProtocolId,
        msg:       impl Any,
    ) -> NetworkResult<()> {
        let node = self.network.by_id(self.node_id).ok_or(NetworkError::NodeNotFound(self.node_id))?;
        let model = self.protocols.transport(node, transport).ok_or_else(|| {
            NetworkError::Protocol(format!("slot {transport} of {} is not a transport", self.node_id))
        })?;
        let delay = model.latency(self.node_id, target, self.rng);
        self.send(delay, target, pid, msg);
        Ok(())
    }

    /// Send at an absolute time.  A time before now is reported as an
    /// ordering violation when the event is enqueued.
    pub fn send_at(&mut self, at: Time, target: NodeId, pid: ProtocolId, msg: impl Any) {
        self.outbox.push(Outgoing::message(at, target, pid, msg));
    }

    pub fn schedule(&mut self, event: Outgoing) {
        self.outbox.push(event);
    }
}

// ── ControlContext ────────────────────────────────────────────────────────────

/// What a control (churn, observer, bootstrap) sees when it executes.
pub struct ControlContext<'a> {
    pub network:   &'a mut Network,
    pub rng:       &'a mut SimRng,
    pub protocols: &'a ProtocolTable,
    /// The point being executed; `TimePoint::Final` after the last round.
    pub point:     TimePoint,
    /// Simulation time of `point` (the last reached time for `Final`).
    pub time:      Time,
    outbox:        &'a mut Vec<Outgoing>,
}

impl<'a> ControlContext<'a> {
    pub fn new(
        network:   &'a mut Network,
        rng:       &'a mut SimRng,
        protocols: &'a ProtocolTable,
        point:     TimePoint,
        time:      Time,
        outbox:    &'a mut Vec<Outgoing>,
    ) -> Self {
        Self { network, rng, protocols, point, time, outbox }
    }

    pub fn schedule(&mut self, event: Outgoing) {
        self.outbox.push(event);
    }

    /// Split into the pieces a node initializer needs, keeping mutable
    /// access to nothing but the RNG and the outbox.
    pub fn init_context(&mut self) -> InitContext<'_> {
        InitContext {
            network:   &*self.network,
            rng:       &mut *self.rng,
            protocols: self.protocols,
            time:      self.time,
            outbox:    &mut *self.outbox,
        }
    }
}

// ── InitContext ───────────────────────────────────────────────────────────────

/// What a node initializer sees.  The node being set up is not yet part of
/// `network`.
pub struct InitContext<'a> {
    pub network:   &'a Network,
    pub rng:       &'a mut SimRng,
    pub protocols: &'a ProtocolTable,
    pub time:      Time,
    outbox:        &'a mut Vec<Outgoing>,
}

impl<'a> InitContext<'a> {
    pub fn new(
        network:   &'a Network,
        rng:       &'a mut SimRng,
        protocols: &'a ProtocolTable,
        time:      Time,
        outbox:    &'a mut Vec<Outgoing>,
    ) -> Self {
        Self { network, rng, protocols, time, outbox }
    }

    pub fn schedule(&mut self, event: Outgoing) {
        self.outbox.push(event);
    }
}

// ── Component contracts ───────────────────────────────────────────────────────

/// A component run by the controller at the time points its scheduler
/// selects.  Returning `Ok(true)` stops the simulation.
pub trait Control {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool>;
}

/// In-place setup of a freshly created node.  A list of initializers runs in
/// its configured order.
pub trait NodeInitializer {
    fn initialize(&mut self, node: &mut Node, ctx: &mut InitContext<'_>) -> NetworkResult<()>;
}
