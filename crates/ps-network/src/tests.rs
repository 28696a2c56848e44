//! Unit tests for ps-network.

use std::any::Any;

use ps_core::{NodeId, ProtocolId, SimRng, Time};

use crate::{
    CycleProtocol, EventProtocol, Linkable, Network, NetworkResult, Node, Protocol,
    ProtocolContext, ProtocolSpec, ProtocolTable,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Counter protocol: counts its own steps and bumps the first neighbour's
/// counter through the network.
#[derive(Clone, Default, Debug)]
struct Counter {
    steps:    u32,
    received: Vec<u32>,
}

impl Protocol for Counter {}

impl CycleProtocol for Counter {
    fn next_cycle(&mut self, ctx: &mut ProtocolContext<'_>) -> NetworkResult<()> {
        self.steps += 1;
        // The executing slot is checked out.
        assert!(ctx.this_node().unwrap().protocol::<Counter>(ctx.pid).is_none());
        let link_pid = ProtocolId(1);
        let peer = ctx.linkable(link_pid).and_then(|l| l.neighbor(0));
        if let Some(peer) = peer {
            if let Some(other) = ctx.network.by_id_mut(peer) {
                if let Some(c) = other.protocol_mut::<Counter>(ctx.pid) {
                    c.steps += 10;
                }
            }
            ctx.send(3, peer, ctx.pid, 7u32);
        }
        Ok(())
    }
}

impl EventProtocol for Counter {
    fn process_event(
        &mut self,
        payload: Box<dyn Any>,
        _ctx:    &mut ProtocolContext<'_>,
    ) -> NetworkResult<()> {
        if let Ok(v) = payload.downcast::<u32>() {
            self.received.push(*v);
        }
        Ok(())
    }
}

#[derive(Clone, Default, Debug)]
struct Links(Vec<NodeId>);

impl Protocol for Links {}

impl Linkable for Links {
    fn degree(&self) -> usize {
        self.0.len()
    }

    fn neighbor(&self, i: usize) -> Option<NodeId> {
        self.0.get(i).copied()
    }

    fn add_neighbor(&mut self, id: NodeId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }
}

fn table() -> ProtocolTable {
    let mut t = ProtocolTable::new();
    t.register(ProtocolSpec::new("counter").cycle::<Counter>().event::<Counter>());
    t.register(ProtocolSpec::new("links").linkable::<Links>());
    t
}

fn network(n: usize) -> Network {
    let mut net = Network::with_capacity(n);
    for _ in 0..n {
        let id = net.allocate_id();
        let protos: Vec<Box<dyn Protocol>> =
            vec![Box::new(Counter::default()), Box::new(Links::default())];
        net.add(Node::new(id, protos)).unwrap();
    }
    net
}

// ── Node ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod node {
    use super::*;
    use crate::{Liveness, NetworkError};

    #[test]
    fn dead_is_terminal() {
        let mut n = Node::new(NodeId(0), vec![]);
        assert!(n.is_up());
        assert!(n.set_liveness(Liveness::Down));
        assert!(n.set_liveness(Liveness::Up));
        assert!(n.set_liveness(Liveness::Dead));
        assert!(!n.set_liveness(Liveness::Up));
        assert_eq!(n.liveness(), Liveness::Dead);
    }

    #[test]
    fn typed_access_and_wrong_type() {
        let net = network(1);
        let n = net.get(0).unwrap();
        assert!(n.protocol::<Counter>(ProtocolId(0)).is_some());
        assert!(n.protocol::<Links>(ProtocolId(0)).is_none());
        assert!(n.protocol::<Counter>(ProtocolId(9)).is_none());
    }

    #[test]
    fn duplicate_is_deep_and_fails_while_checked_out() {
        let mut net = network(1);
        let n = net.get_mut(0).unwrap();
        n.protocol_mut::<Counter>(ProtocolId(0)).unwrap().steps = 4;
        let copy = n.duplicate(NodeId(99)).unwrap();
        assert_eq!(copy.id(), NodeId(99));
        assert_eq!(copy.protocol::<Counter>(ProtocolId(0)).unwrap().steps, 4);

        let taken = n.checkout(ProtocolId(1)).unwrap();
        assert!(matches!(n.duplicate(NodeId(100)), Err(NetworkError::CloningFailure(_))));
        n.checkin(ProtocolId(1), taken);
        assert!(n.duplicate(NodeId(100)).is_ok());
    }
}

// ── Network ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod population {
    use super::*;
    use crate::{Census, Liveness, NetworkError};

    #[test]
    fn remove_at_moves_last_into_hole() {
        let mut net = network(4);
        let removed = net.remove_at(1).unwrap();
        assert_eq!(removed.id(), NodeId(1));
        assert_eq!(net.len(), 3);
        assert_eq!(net.get(1).unwrap().id(), NodeId(3));
        assert_eq!(net.index_of(NodeId(3)), Some(1));
        assert_eq!(net.index_of(NodeId(1)), None);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut net = network(2);
        net.remove_last().unwrap();
        assert_eq!(net.allocate_id(), NodeId(2));
    }

    #[test]
    fn swap_updates_index() {
        let mut net = network(3);
        net.swap(0, 2).unwrap();
        assert_eq!(net.index_of(NodeId(0)), Some(2));
        assert_eq!(net.index_of(NodeId(2)), Some(0));
        assert!(net.swap(0, 3).is_err());
    }

    #[test]
    fn purge_removes_only_dead() {
        let mut net = network(5);
        net.set_liveness(0, Liveness::Dead).unwrap();
        net.set_liveness(3, Liveness::Dead).unwrap();
        net.set_liveness(4, Liveness::Down).unwrap();
        assert_eq!(net.census(), Census { up: 2, down: 1, dead: 2 });
        assert_eq!(net.purge_dead().unwrap(), 2);
        assert_eq!(net.census(), Census { up: 2, down: 1, dead: 0 });
        for n in net.iter() {
            assert_eq!(net.index_of(n.id()).map(|i| net.get(i).unwrap().id()), Some(n.id()));
        }
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut net = network(2);
        let protos: Vec<Box<dyn Protocol>> =
            vec![Box::new(Counter::default()), Box::new(Links::default())];
        let err = net.add(Node::new(NodeId(1), protos)).unwrap_err();
        assert!(matches!(err, NetworkError::DuplicateNode(NodeId(1))));
        assert_eq!(net.len(), 2);
        assert_eq!(net.index_of(NodeId(1)), Some(1));
    }

    #[test]
    fn remove_from_empty_fails() {
        let mut net = Network::new();
        assert!(net.remove_at(0).is_err());
        assert!(net.remove_last().is_none());
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dispatch {
    use super::*;
    use crate::{Liveness, NetworkError, Payload};

    /// Moves itself to the back of the population, then goes Down.
    #[derive(Clone, Default, Debug)]
    struct Shuffle;

    impl Protocol for Shuffle {}

    impl CycleProtocol for Shuffle {
        fn next_cycle(&mut self, ctx: &mut ProtocolContext<'_>) -> NetworkResult<()> {
            let last = ctx.network.len() - 1;
            ctx.network.swap(ctx.node, last)?;
            assert!(ctx.set_liveness(Liveness::Down));
            Ok(())
        }
    }

    #[test]
    fn cycle_step_reaches_neighbour_and_emits_event() {
        let t = table();
        let mut net = network(2);
        let n1 = net.get(1).unwrap().id();
        t.linkable_mut(net.get_mut(0).unwrap(), ProtocolId(1)).unwrap().add_neighbor(n1);

        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        let ran = t.run_cycle(ProtocolId(0), &mut net, &mut rng, Time(4), 0, &mut outbox).unwrap();
        assert!(ran);

        let c0 = net.get(0).unwrap().protocol::<Counter>(ProtocolId(0)).unwrap();
        let c1 = net.get(1).unwrap().protocol::<Counter>(ProtocolId(0)).unwrap();
        assert_eq!(c0.steps, 1);
        assert_eq!(c1.steps, 10);

        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].at, Time(7));
        assert_eq!(outbox[0].target, n1);
        assert!(matches!(outbox[0].payload, Payload::Message(_)));
    }

    #[test]
    fn deliver_calls_event_handler() {
        let t = table();
        let mut net = network(1);
        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        t.deliver(ProtocolId(0), &mut net, &mut rng, Time(1), 0, Box::new(5u32), &mut outbox)
            .unwrap();
        let c = net.get(0).unwrap().protocol::<Counter>(ProtocolId(0)).unwrap();
        assert_eq!(c.received, vec![5]);
    }

    #[test]
    fn missing_capability_is_not_an_error() {
        let t = table();
        let mut net = network(1);
        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        let ran = t.run_cycle(ProtocolId(1), &mut net, &mut rng, Time(0), 0, &mut outbox).unwrap();
        assert!(!ran);
    }

    #[test]
    fn wrong_instance_type_is_reported() {
        let mut t = ProtocolTable::new();
        t.register(ProtocolSpec::new("counter").cycle::<Counter>());
        let mut net = Network::new();
        let protos: Vec<Box<dyn Protocol>> = vec![Box::new(Links::default())];
        net.add(Node::new(NodeId(0), protos)).unwrap();
        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        let err = t.run_cycle(ProtocolId(0), &mut net, &mut rng, Time(0), 0, &mut outbox);
        assert!(matches!(err, Err(NetworkError::Protocol(_))));
        // The instance went back into its slot.
        assert!(net.get(0).unwrap().protocol::<Links>(ProtocolId(0)).is_some());
    }

    #[test]
    fn executing_node_is_found_after_reordering() {
        let mut t = ProtocolTable::new();
        t.register(ProtocolSpec::new("shuffle").cycle::<Shuffle>());
        let mut net = Network::new();
        for i in 0..2 {
            let protos: Vec<Box<dyn Protocol>> = vec![Box::new(Shuffle)];
            net.add(Node::new(NodeId(i), protos)).unwrap();
        }
        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        t.run_cycle(ProtocolId(0), &mut net, &mut rng, Time(0), 0, &mut outbox).unwrap();

        assert_eq!(net.index_of(NodeId(0)), Some(1));
        assert_eq!(net.by_id(NodeId(0)).unwrap().liveness(), Liveness::Down);
        assert_eq!(net.by_id(NodeId(1)).unwrap().liveness(), Liveness::Up);
        assert!(net.by_id(NodeId(0)).unwrap().protocol::<Shuffle>(ProtocolId(0)).is_some());
    }

    #[test]
    fn lookup_by_name() {
        let t = table();
        assert_eq!(t.lookup("links").unwrap(), ProtocolId(1));
        assert!(matches!(t.lookup("nope"), Err(NetworkError::UnknownProtocol(_))));
        assert!(t.spec(ProtocolId(0)).unwrap().is_cycle());
        assert!(!t.spec(ProtocolId(1)).unwrap().is_event());
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod transport {
    use super::*;
    use ps_core::{Params, PsError};

    use crate::{NetworkError, Transport, UniformTransport};

    /// Sends one message to itself through the transport in slot `via`.
    #[derive(Clone, Debug)]
    struct Relay {
        via: ProtocolId,
    }

    impl Protocol for Relay {}

    impl CycleProtocol for Relay {
        fn next_cycle(&mut self, ctx: &mut ProtocolContext<'_>) -> NetworkResult<()> {
            ctx.send_via(self.via, ctx.node_id, ctx.pid, 1u32)
        }
    }

    fn relay_network(second: Box<dyn Protocol>, t: &mut ProtocolTable, spec: ProtocolSpec) -> Network {
        t.register(ProtocolSpec::new("relay").cycle::<Relay>());
        t.register(spec);
        let mut net = Network::new();
        let protos: Vec<Box<dyn Protocol>> = vec![Box::new(Relay { via: ProtocolId(1) }), second];
        net.add(Node::new(NodeId(0), protos)).unwrap();
        net
    }

    #[test]
    fn uniform_latency_covers_its_range() {
        let tr = UniformTransport::new(2, 5).unwrap();
        let mut rng = SimRng::new(3);
        let mut seen = [false; 4];
        for _ in 0..1000 {
            let d = tr.latency(NodeId(0), NodeId(1), &mut rng);
            assert!((2..=5).contains(&d), "latency {d}");
            seen[(d - 2) as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn uniform_latency_with_equal_bounds_is_fixed() {
        let tr = UniformTransport::new(4, 4).unwrap();
        let mut rng = SimRng::new(3);
        assert!((0..20).all(|_| tr.latency(NodeId(0), NodeId(0), &mut rng) == 4));
    }

    #[test]
    fn uniform_bounds_from_params() {
        let params = Params::parse("protocol.tr.mindelay 3").unwrap();
        let tr = UniformTransport::from_params(&params, "protocol.tr").unwrap();
        assert_eq!((tr.min(), tr.max()), (3, 3));

        let params = Params::parse("protocol.tr.mindelay 3\nprotocol.tr.maxdelay 1").unwrap();
        let err = UniformTransport::from_params(&params, "protocol.tr").unwrap_err();
        assert!(matches!(err, PsError::IllegalParameter { .. }), "{err}");
    }

    #[test]
    fn send_via_uses_the_transport_delay() {
        let mut t = ProtocolTable::new();
        let tr = UniformTransport::new(4, 4).unwrap();
        let mut net =
            relay_network(Box::new(tr), &mut t, ProtocolSpec::new("tr").transport::<UniformTransport>());
        assert!(t.spec(ProtocolId(1)).unwrap().is_transport());

        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        t.run_cycle(ProtocolId(0), &mut net, &mut rng, Time(10), 0, &mut outbox).unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].at, Time(14));
        assert_eq!(outbox[0].target, NodeId(0));
    }

    #[test]
    fn send_via_a_non_transport_slot_fails() {
        let mut t = ProtocolTable::new();
        let mut net =
            relay_network(Box::new(Links::default()), &mut t, ProtocolSpec::new("links").linkable::<Links>());
        let mut rng = SimRng::new(1);
        let mut outbox = Vec::new();
        let err = t.run_cycle(ProtocolId(0), &mut net, &mut rng, Time(0), 0, &mut outbox);
        assert!(matches!(err, Err(NetworkError::Protocol(_))));
        assert!(outbox.is_empty());
    }
}

// ── Graph views ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod graph {
    use super::*;
    use crate::{Liveness, OverlayGraph, OverlayGraphMut};

    #[test]
    fn edges_require_both_endpoints_up() {
        let t = table();
        let mut net = network(3);
        {
            let mut g = OverlayGraphMut::new(&mut net, &t, ProtocolId(1), false).unwrap();
            g.set_edge(0, 1).unwrap();
            g.set_edge(0, 2).unwrap();
            g.set_edge(1, 2).unwrap();
        }
        let g = OverlayGraph::new(&net, &t, ProtocolId(1)).unwrap();
        assert!(g.is_edge(0, 1));
        assert!(!g.is_edge(1, 0));
        assert_eq!(g.neighbours(0), vec![1, 2]);

        net.set_liveness(2, Liveness::Down).unwrap();
        let g = OverlayGraph::new(&net, &t, ProtocolId(1)).unwrap();
        assert!(!g.is_edge(0, 2));
        assert!(!g.is_edge(1, 2));
        assert_eq!(g.degree(0), 1);
        assert!(g.neighbours(2).is_empty());
    }

    #[test]
    fn undirected_wiring_adds_both_directions() {
        let t = table();
        let mut net = network(2);
        let mut g = OverlayGraphMut::new(&mut net, &t, ProtocolId(1), true).unwrap();
        assert!(g.set_edge(0, 1).unwrap());
        assert!(!g.set_edge(1, 0).unwrap());
        let g = OverlayGraph::new(&net, &t, ProtocolId(1)).unwrap();
        assert!(g.is_edge(0, 1) && g.is_edge(1, 0));
    }

    #[test]
    fn non_linkable_slot_is_rejected() {
        let t = table();
        let net = network(1);
        assert!(OverlayGraph::new(&net, &t, ProtocolId(0)).is_err());
    }
}
