//! `CycleDriver` — one pass of every cycle-capable slot over the population.
//!
//! # One round
//!
//! ```text
//! for node in order (Sequential | Shuffled | RandomPick):
//!   skip unless Up
//!   for slot in declaration order:
//!     skip unless slot.scheduler.active(round)
//!     slot.next_cycle(node)
//!     stop visiting this node if it left Up
//!       (with persist_down, only if it became Dead)
//! ```
//!
//! The node order is resolved into `NodeId`s before the first step runs, so
//! a step that re-indexes the population never makes the pass skip or
//! repeat a node.

use ps_core::{NodeId, ProtocolId, RandPermutation, SimRng, Time};
use ps_network::{Liveness, Network, Outgoing, ProtocolTable};

use crate::{SimError, SimResult};

/// Order in which a round visits the population.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NodeOrder {
    /// Index order.
    #[default]
    Sequential,
    /// One fresh uniform permutation per round.
    Shuffled,
    /// `N` uniform draws with replacement: some nodes run twice, some not
    /// at all.
    RandomPick,
}

/// The cycle-driven dispatch loop.
#[derive(Debug)]
pub struct CycleDriver {
    slots:        Vec<ProtocolId>,
    order:        NodeOrder,
    persist_down: bool,
    perm:         RandPermutation,
    visit:        Vec<NodeId>,
    outbox:       Vec<Outgoing>,
}

impl CycleDriver {
    /// Drive every cycle-capable slot of `protocols`, in declaration order.
    pub fn new(protocols: &ProtocolTable) -> Self {
        Self {
            slots:        protocols
                .iter()
                .filter(|(_, spec)| spec.is_cycle())
                .map(|(pid, _)| pid)
                .collect(),
            order:        NodeOrder::Sequential,
            persist_down: false,
            perm:         RandPermutation::new(),
            visit:        Vec::new(),
            outbox:       Vec::new(),
        }
    }

    pub fn with_order(mut self, order: NodeOrder) -> Self {
        self.order = order;
        self
    }

    /// When set, a node that goes `Down` during one of its own steps still
    /// receives its remaining slots this round.  `Dead` always ends the
    /// node's round.
    pub fn persist_down(mut self, persist: bool) -> Self {
        self.persist_down = persist;
        self
    }

    pub fn order(&self) -> NodeOrder {
        self.order
    }

    pub fn slots(&self) -> &[ProtocolId] {
        &self.slots
    }

    /// Run round `time`.  Returns the number of cycle steps invoked.
    pub fn run_round(
        &mut self,
        time:      Time,
        network:   &mut Network,
        protocols: &ProtocolTable,
        rng:       &mut SimRng,
    ) -> SimResult<u64> {
        self.resolve_order(network, rng)?;

        let mut steps = 0;
        for &id in &self.visit {
            if !network.by_id(id).is_some_and(|n| n.is_up()) {
                continue;
            }
            for &pid in &self.slots {
                let spec = protocols.spec(pid)?;
                if !spec.scheduler().active(time) {
                    continue;
                }
                let Some(index) = network.index_of(id) else { break };
                protocols.run_cycle(pid, network, rng, time, index, &mut self.outbox)?;
                steps += 1;

                if !self.outbox.is_empty() {
                    self.outbox.clear();
                    return Err(SimError::Config(format!(
                        "protocol {:?} scheduled an event in cycle-driven mode",
                        spec.name()
                    )));
                }

                let carry_on = match network.by_id(id).map(|n| n.liveness()) {
                    Some(Liveness::Up) => true,
                    Some(Liveness::Down) => self.persist_down,
                    _ => false,
                };
                if !carry_on {
                    break;
                }
            }
        }
        tracing::trace!(round = %time, steps, "cycle pass");
        Ok(steps)
    }

    fn resolve_order(&mut self, network: &Network, rng: &mut SimRng) -> SimResult<()> {
        let n = network.len();
        self.visit.clear();
        match self.order {
            NodeOrder::Sequential => {
                self.visit.extend(network.iter().map(|node| node.id()));
            }
            NodeOrder::Shuffled => {
                self.perm.reset(n);
                while self.perm.has_next() {
                    let i = self.perm.next(rng)?;
                    self.visit.extend(network.get(i).map(|node| node.id()));
                }
            }
            NodeOrder::RandomPick => {
                if n > 0 {
                    for _ in 0..n {
                        let i = rng.index(n);
                        self.visit.extend(network.get(i).map(|node| node.id()));
                    }
                }
            }
        }
        Ok(())
    }
}
