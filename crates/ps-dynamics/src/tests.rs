//! Unit tests for ps-dynamics.

use std::cell::RefCell;
use std::rc::Rc;

use ps_core::{NodeId, Params, ProtocolId, SimRng, Time};
use ps_network::{
    Control, ControlContext, CycleProtocol, InitContext, Linkable, Network, NetworkResult, Node,
    NodeInitializer, Outgoing, Protocol, ProtocolContext, ProtocolSpec, ProtocolTable,
};
use ps_schedule::{Scheduler, TimePoint};

use crate::{NodeFactory, PrototypeFactory, populate};

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Clone, Default, Debug)]
struct Idle;

impl Protocol for Idle {}

impl CycleProtocol for Idle {
    fn next_cycle(&mut self, _ctx: &mut ProtocolContext<'_>) -> NetworkResult<()> {
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

    fn pack(&mut self) {
        self.0.shrink_to_fit();
    }
}

const IDLE: ProtocolId = ProtocolId(0);
const LINKS: ProtocolId = ProtocolId(1);

fn table() -> ProtocolTable {
    let mut t = ProtocolTable::new();
    t.register(
        ProtocolSpec::new("idle")
            .scheduled(Scheduler::new(Time(2), Time(20), 4).unwrap())
            .cycle::<Idle>(),
    );
    t.register(ProtocolSpec::new("links").linkable::<Links>());
    t
}

fn factory() -> PrototypeFactory {
    let protos: Vec<Box<dyn Protocol>> = vec![Box::new(Idle), Box::new(Links::default())];
    PrototypeFactory::new(protos)
}

fn network(n: usize, capacity: usize) -> Network {
    let mut net = Network::with_capacity(capacity);
    populate(&mut net, n, &factory()).unwrap();
    net
}

/// Run `control` once at time 0 and return what it scheduled.
fn run(
    control: &mut dyn Control,
    net:     &mut Network,
    table:   &ProtocolTable,
    rng:     &mut SimRng,
) -> Vec<Outgoing> {
    let mut outbox = Vec::new();
    let mut ctx = ControlContext::new(net, rng, table, TimePoint::At(Time(0)), Time(0), &mut outbox);
    let stop = control.execute(&mut ctx).unwrap();
    assert!(!stop);
    outbox
}

fn out_degree(net: &Network, t: &ProtocolTable, i: usize) -> usize {
    t.linkable(net.get(i).unwrap(), LINKS).unwrap().degree()
}

// ── Factory ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod factory {
    use super::*;

    #[test]
    fn prototype_copies_are_independent() {
        let f = factory();
        let mut a = f.create(NodeId(1)).unwrap();
        let b = f.create(NodeId(2)).unwrap();
        a.protocol_mut::<Links>(LINKS).unwrap().0.push(NodeId(7));
        assert_eq!(b.protocol::<Links>(LINKS).unwrap().degree(), 0);
        assert_eq!(f.prototype().protocol::<Links>(LINKS).unwrap().degree(), 0);
    }

    #[test]
    fn closures_are_factories() {
        let f = |id: NodeId| -> NetworkResult<Node> {
            let protos: Vec<Box<dyn Protocol>> = vec![Box::new(Idle)];
            Ok(Node::new(id, protos))
        };
        let mut net = Network::new();
        populate(&mut net, 3, &f).unwrap();
        assert_eq!(net.len(), 3);
        assert_eq!(net.get(2).unwrap().id(), NodeId(2));
    }
}

// ── DynamicNetwork ────────────────────────────────────────────────────────────

#[cfg(test)]
mod churn {
    use proptest::prelude::*;
    use ps_core::PsError;
    use ps_network::Liveness;

    use super::*;
    use crate::DynamicNetwork;

    #[test]
    fn fractional_growth_is_truncated_and_bounded() {
        let t = table();
        let mut rng = SimRng::new(1);

        let mut net = network(10, 100);
        let mut dn = DynamicNetwork::new(0.5, Box::new(factory())).with_bounds(0, 100);
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 15);

        let mut net = network(10, 100);
        let mut dn = DynamicNetwork::new(0.5, Box::new(factory())).with_bounds(0, 12);
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 12);
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 12);
    }

    #[test]
    fn max_defaults_to_capacity() {
        let t = table();
        let mut rng = SimRng::new(2);
        let mut net = network(8, 10);
        let mut dn = DynamicNetwork::new(5.0, Box::new(factory()));
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 10);
    }

    #[test]
    fn substitute_keeps_size_and_ignores_bounds() {
        let t = table();
        let mut rng = SimRng::new(3);
        let mut net = network(10, 10);
        let before: Vec<NodeId> = net.iter().map(|n| n.id()).collect();
        let mut dn = DynamicNetwork::new(0.5, Box::new(factory())).with_bounds(0, 10).substituting();
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 10);
        let survivors = net.iter().filter(|n| before.contains(&n.id())).count();
        assert_eq!(survivors, 5);
    }

    #[test]
    fn removal_respects_minsize() {
        let t = table();
        let mut rng = SimRng::new(4);
        let mut net = network(10, 10);
        let mut dn = DynamicNetwork::new(-4.0, Box::new(factory())).with_bounds(7, 10);
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 7);
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 7);
        for n in net.iter() {
            assert_eq!(net.index_of(n.id()).and_then(|i| net.get(i)).map(|m| m.id()), Some(n.id()));
        }
    }

    #[test]
    fn down_mode_keeps_nodes() {
        let t = table();
        let mut rng = SimRng::new(5);
        let mut net = network(10, 10);
        let mut dn = DynamicNetwork::new(-3.0, Box::new(factory())).down_mode();
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.len(), 10);
        let c = net.census();
        assert_eq!((c.up, c.down), (7, 3));
    }

    #[test]
    fn down_mode_stops_when_nobody_is_up() {
        let t = table();
        let mut rng = SimRng::new(6);
        let mut net = network(3, 3);
        let mut dn = DynamicNetwork::new(-10.0, Box::new(factory())).down_mode();
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(net.census().down, 3);
        assert!(net.iter().all(|n| n.liveness() == Liveness::Down));
    }

    struct Record(&'static str, Rc<RefCell<Vec<(&'static str, NodeId)>>>);

    impl NodeInitializer for Record {
        fn initialize(&mut self, node: &mut Node, _ctx: &mut InitContext<'_>) -> NetworkResult<()> {
            self.1.borrow_mut().push((self.0, node.id()));
            Ok(())
        }
    }

    #[test]
    fn initializers_run_in_order_on_new_nodes_only() {
        let t = table();
        let mut rng = SimRng::new(7);
        let mut net = network(4, 10);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut dn = DynamicNetwork::new(2.0, Box::new(factory()))
            .initializer(Box::new(Record("a", log.clone())))
            .initializer(Box::new(Record("b", log.clone())));
        run(&mut dn, &mut net, &t, &mut rng);
        assert_eq!(
            *log.borrow(),
            vec![("a", NodeId(4)), ("b", NodeId(4)), ("a", NodeId(5)), ("b", NodeId(5))]
        );
    }

    #[test]
    fn from_params_reads_keys() {
        let p = Params::new()
            .with("dynamics.churn.add", "0.1")
            .with("dynamics.churn.maxsize", "50")
            .with_flag("dynamics.churn.substitute");
        let dn = DynamicNetwork::from_params(&p, "dynamics.churn", Box::new(factory()), vec![])
            .unwrap();
        assert_eq!(dn.plan(40, 50), (4, 4));

        let missing = Params::new();
        assert!(matches!(
            DynamicNetwork::from_params(&missing, "dynamics.churn", Box::new(factory()), vec![]),
            Err(PsError::MissingParameter(_))
        ));

        let inverted = Params::new()
            .with("c.add", "1")
            .with("c.minsize", "9")
            .with("c.maxsize", "3");
        assert!(DynamicNetwork::from_params(&inverted, "c", Box::new(factory()), vec![]).is_err());
    }

    #[test]
    fn zero_rate_does_nothing() {
        let dn = DynamicNetwork::new(0.0, Box::new(factory()));
        assert_eq!(dn.plan(10, 100), (0, 0));
    }

    proptest! {
        #[test]
        fn size_stays_within_bounds(
            start in 0usize..60,
            rate in -30.0f64..30.0,
            min in 0usize..20,
            extra in 0usize..60,
        ) {
            let max = min + extra;
            let dn = DynamicNetwork::new(rate, Box::new(factory())).with_bounds(min, max);
            let (add, remove) = dn.plan(start, max);
            let after = start + add - remove.min(start + add);
            if start >= min && start <= max {
                prop_assert!(after >= min && after <= max);
            }
            if rate > 0.0 {
                prop_assert_eq!(remove, 0);
            }
        }
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod wire {
    use std::collections::HashSet;

    use super::*;
    use crate::{WireKOut, WireRingLattice};

    #[test]
    fn kout_links_k_distinct_others() {
        let t = table();
        let mut rng = SimRng::new(8);
        let mut net = network(20, 20);
        let mut w = WireKOut::new(LINKS, 4);
        run(&mut w, &mut net, &t, &mut rng);
        for (i, n) in net.iter().enumerate() {
            let l = n.protocol::<Links>(LINKS).unwrap();
            assert_eq!(l.degree(), 4, "node {i}");
            assert!(!l.contains(n.id()));
            let distinct: HashSet<_> = l.0.iter().collect();
            assert_eq!(distinct.len(), 4);
        }
    }

    #[test]
    fn kout_caps_at_network_size() {
        let t = table();
        let mut rng = SimRng::new(9);
        let mut net = network(3, 3);
        let mut w = WireKOut::new(LINKS, 10);
        run(&mut w, &mut net, &t, &mut rng);
        assert!((0..3).all(|i| out_degree(&net, &t, i) == 2));
    }

    #[test]
    fn kout_as_initializer_links_new_node() {
        let t = table();
        let mut rng = SimRng::new(10);
        let net = network(6, 10);
        let mut fresh = factory().create(NodeId(42)).unwrap();
        let mut outbox = Vec::new();
        let mut ctx = InitContext::new(&net, &mut rng, &t, Time(0), &mut outbox);
        WireKOut::new(LINKS, 3).initialize(&mut fresh, &mut ctx).unwrap();
        assert_eq!(fresh.protocol::<Links>(LINKS).unwrap().degree(), 3);
    }

    #[test]
    fn kout_from_params_requires_linkable_slot() {
        let t = table();
        let ok = Params::new().with("init.wire.protocol", "links").with("init.wire.k", "2");
        assert!(WireKOut::from_params(&ok, "init.wire", &t).is_ok());
        let wrong = Params::new().with("init.wire.protocol", "idle").with("init.wire.k", "2");
        assert!(WireKOut::from_params(&wrong, "init.wire", &t).is_err());
    }

    #[test]
    fn ring_lattice_degree() {
        let t = table();
        let mut rng = SimRng::new(11);
        let mut net = network(10, 10);
        let mut w = WireRingLattice::new(LINKS, 2);
        run(&mut w, &mut net, &t, &mut rng);
        for i in 0..10 {
            assert_eq!(out_degree(&net, &t, i), 4);
        }
        let l0 = net.get(0).unwrap().protocol::<Links>(LINKS).unwrap();
        for id in [1, 2, 9, 8] {
            assert!(l0.contains(NodeId(id)));
        }
    }
}

// ── CdScheduler ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod cd {
    use ps_network::Payload;

    use super::*;
    use crate::CdScheduler;

    #[test]
    fn arms_one_event_per_node_and_cycle_slot() {
        let t = table();
        let mut rng = SimRng::new(12);
        let mut net = network(5, 5);
        let mut cd = CdScheduler::new(&t);
        let out = run(&mut cd, &mut net, &t, &mut rng);
        assert_eq!(out.len(), 5);
        for o in &out {
            assert_eq!(o.pid, IDLE);
            assert_eq!(o.at, Time(2));
            assert!(matches!(o.payload, Payload::NextCycle(_)));
        }
    }

    #[test]
    fn randstart_stays_within_first_step() {
        let t = table();
        let mut rng = SimRng::new(13);
        let mut net = network(50, 50);
        let mut cd = CdScheduler::new(&t).randstart();
        let out = run(&mut cd, &mut net, &t, &mut rng);
        assert!(out.iter().all(|o| o.at >= Time(2) && o.at < Time(6)));
    }

    #[test]
    fn from_params_requires_explicit_step() {
        let t = table();
        let p = Params::new().with("init.cd.protocol", "idle");
        assert!(CdScheduler::from_params(&p, "init.cd", &t).is_err());
        let p = p
            .with("protocol.idle.step", "4")
            .with_flag("init.cd.persistschedule")
            .with("init.cd.expdelay", "3.5");
        assert!(CdScheduler::from_params(&p, "init.cd", &t).is_ok());
        let not_cycle = Params::new().with("init.cd.protocol", "links");
        assert!(CdScheduler::from_params(&not_cycle, "init.cd", &t).is_err());
    }

    #[test]
    fn initializer_arms_joining_node_at_now() {
        let t = table();
        let mut rng = SimRng::new(14);
        let net = network(2, 5);
        let mut node = factory().create(NodeId(9)).unwrap();
        let mut outbox = Vec::new();
        let mut ctx = InitContext::new(&net, &mut rng, &t, Time(7), &mut outbox);
        CdScheduler::new(&t).initialize(&mut node, &mut ctx).unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].at, Time(7));
        assert_eq!(outbox[0].target, NodeId(9));
    }

    #[test]
    fn no_event_after_schedule_ends() {
        let t = table();
        let mut rng = SimRng::new(15);
        let net = network(1, 1);
        let mut node = factory().create(NodeId(3)).unwrap();
        let mut outbox = Vec::new();
        let mut ctx = InitContext::new(&net, &mut rng, &t, Time(25), &mut outbox);
        CdScheduler::new(&t).initialize(&mut node, &mut ctx).unwrap();
        assert!(outbox.is_empty());
    }
}
