//! `CdScheduler` — cycle-driven protocols inside an event-driven run.
//!
//! For every selected slot, each node gets one recurring
//! [`NextCycle`] event.  The event engine runs the slot's cycle step when it
//! fires and re-arms it `delay` units later while the slot's scheduler still
//! allows it.
//!
//! # Configuration keys
//!
//! | Key               | Default               | Meaning                                 |
//! |-------------------|-----------------------|-----------------------------------------|
//! | `protocol`        | every cycle slot      | list of slot names to drive             |
//! | `randstart`       | off                   | first firing uniform in `[from, from + step)` |
//! | `persistexec`     | off                   | run the step on `Down` nodes too        |
//! | `persistschedule` | off                   | keep re-arming on `Down` nodes          |
//! | `expdelay`        | constant `step`       | mean of an exponential re-arm delay     |
//!
//! The slots' own schedulers must set `step` explicitly.

use ps_core::params::key;
use ps_core::{Params, PsError, ProtocolId, SimRng, Time};
use ps_network::{
    Control, ControlContext, DelayPolicy, InitContext, NetworkResult, NextCycle, Node,
    NodeInitializer, Outgoing, ProtocolTable,
};
use ps_schedule::Scheduler;

pub const PAR_PROT: &str = "protocol";
pub const PAR_RANDSTART: &str = "randstart";
pub const PAR_PERSIST_EXEC: &str = "persistexec";
pub const PAR_PERSIST_SCHEDULE: &str = "persistschedule";
pub const PAR_EXP_DELAY: &str = "expdelay";

#[derive(Debug, Clone)]
struct Slot {
    pid:       ProtocolId,
    scheduler: Scheduler,
}

/// Bootstrap control and node initializer for cycle emulation.
#[derive(Debug, Clone)]
pub struct CdScheduler {
    slots:     Vec<Slot>,
    randstart: bool,
    event:     NextCycle,
}

impl CdScheduler {
    /// Drive every cycle-capable slot of `protocols` with default event
    /// settings.
    pub fn new(protocols: &ProtocolTable) -> Self {
        let slots = protocols
            .iter()
            .filter(|(_, spec)| spec.is_cycle())
            .map(|(pid, spec)| Slot { pid, scheduler: *spec.scheduler() })
            .collect();
        Self { slots, randstart: false, event: NextCycle::default() }
    }

    pub fn from_params(
        params:    &Params,
        prefix:    &str,
        protocols: &ProtocolTable,
    ) -> NetworkResult<Self> {
        let names = params.get_list(&key(prefix, PAR_PROT));
        let mut sched = if names.is_empty() {
            Self::new(protocols)
        } else {
            let mut slots = Vec::with_capacity(names.len());
            for name in &names {
                let pid = protocols.lookup(name)?;
                let spec = protocols.spec(pid)?;
                if !spec.is_cycle() {
                    return Err(PsError::illegal(
                        key(prefix, PAR_PROT),
                        format!("protocol {name:?} has no cycle step"),
                    )
                    .into());
                }
                slots.push(Slot { pid, scheduler: *spec.scheduler() });
            }
            Self { slots, randstart: false, event: NextCycle::default() }
        };

        // The emulated cycle length must be stated, not defaulted.
        for slot in &mut sched.slots {
            let name = protocols.spec(slot.pid)?.name();
            slot.scheduler = Scheduler::from_params_strict(params, &key("protocol", name))?;
        }

        sched.randstart = params.contains(&key(prefix, PAR_RANDSTART));
        sched.event.persist_exec = params.contains(&key(prefix, PAR_PERSIST_EXEC));
        sched.event.persist_schedule = params.contains(&key(prefix, PAR_PERSIST_SCHEDULE));
        let delay_key = key(prefix, PAR_EXP_DELAY);
        if params.contains(&delay_key) {
            let mean = params.get_f64(&delay_key)?;
            if mean <= 0.0 {
                return Err(PsError::illegal(delay_key, "mean delay must be positive").into());
            }
            sched.event.delay = DelayPolicy::Exponential { mean };
        }
        Ok(sched)
    }

    pub fn randstart(mut self) -> Self {
        self.randstart = true;
        self
    }

    pub fn with_event(mut self, event: NextCycle) -> Self {
        self.event = event;
        self
    }

    /// First firing time of `slot` for a node joining at `now`, or `None` if
    /// the slot's schedule is already over.
    fn first_firing(&self, slot: &Slot, now: Time, rng: &mut SimRng) -> Option<Time> {
        let s = &slot.scheduler;
        let base = s.start().max(now);
        let at = if self.randstart { base.offset(rng.below(s.step())) } else { base };
        (at < s.until()).then_some(at)
    }

    fn arm(&self, node: &Node, now: Time, rng: &mut SimRng, out: &mut Vec<Outgoing>) {
        for slot in &self.slots {
            if let Some(at) = self.first_firing(slot, now, rng) {
                out.push(Outgoing::next_cycle(at, node.id(), slot.pid, self.event));
            }
        }
    }
}

impl Control for CdScheduler {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let mut out = Vec::new();
        for node in ctx.network.iter() {
            self.arm(node, ctx.time, ctx.rng, &mut out);
        }
        tracing::debug!(events = out.len(), slots = self.slots.len(), "armed cycle emulation");
        for event in out {
            ctx.schedule(event);
        }
        Ok(false)
    }
}

impl NodeInitializer for CdScheduler {
    fn initialize(&mut self, node: &mut Node, ctx: &mut InitContext<'_>) -> NetworkResult<()> {
        let mut out = Vec::new();
        self.arm(node, ctx.time, ctx.rng, &mut out);
        for event in out {
            ctx.schedule(event);
        }
        Ok(())
    }
}
