//! `EventEngine` — the event-driven dispatch loop.
//!
//! # Loop
//!
//! ```text
//! while let Some(t) = queue.peek_time():
//!   stop if t > end_time, or the event / wall-clock budget is spent
//!   pop → now = t
//!   Control(i)        → execute; re-arm from its cursor while < until
//!   Node(Message)     → deliver if the target is Up
//!   Node(NextCycle)   → run the cycle step if Up (or Down + persist_exec);
//!                       re-arm after `delay` if Up (or Down + persist_schedule)
//!                       and now + delay < until
//!   drain the outbox into the queue
//! ```
//!
//! Both `NextCycle` decisions use the liveness the node had when the event
//! fired: a node that goes `Down` during its own step is still re-armed, and
//! runs again if something brings it back `Up` in the meantime.  The re-arm
//! goes through the outbox after whatever the step sent, so equal-time
//! entries keep the order in which they were produced.
//!
//! Events for a node that has left the population are dropped.  A node that
//! turns itself `Dead` is removed right after the delivery that did it, and
//! is not re-armed.

use std::time::{Duration, Instant};

use ps_core::{NodeId, ProtocolId, SimRng, Time};
use ps_network::{
    ControlContext, DelayPolicy, Liveness, Network, NextCycle, Outgoing, Payload, ProtocolTable,
};
use ps_schedule::{EventQueue, ScheduleCursor, TimePoint};

use crate::{ScheduledControl, SimError, SimObserver, SimResult, StopReason};

/// What sits in the queue.
#[derive(Debug)]
pub enum Entry {
    Node {
        target:  NodeId,
        pid:     ProtocolId,
        payload: Payload,
    },
    /// Index into the control list handed to [`EventEngine::run`].
    Control(usize),
}

/// The event-driven dispatch loop and its queue.
#[derive(Debug)]
pub struct EventEngine {
    queue:      EventQueue<Entry>,
    end_time:   Time,
    max_events: Option<u64>,
    wall_time:  Option<Duration>,
    log_time:   Option<u64>,
    processed:  u64,
    outbox:     Vec<Outgoing>,
}

impl EventEngine {
    /// Events stamped after `end_time` are never processed.
    pub fn new(end_time: Time) -> Self {
        Self {
            queue: EventQueue::new(),
            end_time,
            max_events: None,
            wall_time: None,
            log_time: None,
            processed: 0,
            outbox: Vec::new(),
        }
    }

    pub fn with_max_events(mut self, max: u64) -> Self {
        self.max_events = Some(max);
        self
    }

    pub fn with_wall_time(mut self, limit: Duration) -> Self {
        self.wall_time = Some(limit);
        self
    }

    /// Emit an `info` status line every `period` units of simulated time.
    pub fn with_log_time(mut self, period: u64) -> Self {
        self.log_time = Some(period.max(1));
        self
    }

    pub fn now(&self) -> Time {
        self.queue.now()
    }

    /// Events popped so far, controls included.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue one node event.  Fails with an ordering violation if it is
    /// stamped before now.
    pub fn enqueue(&mut self, event: Outgoing) -> SimResult<()> {
        let Outgoing { at, target, pid, payload } = event;
        self.queue.push(at, Entry::Node { target, pid, payload })?;
        Ok(())
    }

    /// Move every event out of `outbox` into the queue, in order.
    pub fn enqueue_all(&mut self, outbox: &mut Vec<Outgoing>) -> SimResult<()> {
        for event in outbox.drain(..) {
            let Outgoing { at, target, pid, payload } = event;
            self.queue.push(at, Entry::Node { target, pid, payload })?;
        }
        Ok(())
    }

    /// Run until a stop condition.  `controls` are armed at their first
    /// scheduled time and re-armed after every execution.
    pub fn run(
        &mut self,
        network:   &mut Network,
        protocols: &ProtocolTable,
        rng:       &mut SimRng,
        controls:  &mut [ScheduledControl],
        observer:  &mut dyn SimObserver,
    ) -> SimResult<StopReason> {
        let started = Instant::now();
        let mut cursors: Vec<ScheduleCursor> = Vec::with_capacity(controls.len());
        for (i, c) in controls.iter().enumerate() {
            let mut cursor = c.scheduler.cursor();
            if let Some(t) = cursor.next() {
                self.arm_control(i, t, c)?;
            }
            cursors.push(cursor);
        }
        let mut next_log = self.log_time.map(|_| Time::ZERO);

        loop {
            let Some(t) = self.queue.peek_time() else {
                return Ok(StopReason::QueueEmpty);
            };
            if t > self.end_time {
                return Ok(StopReason::EndTime);
            }
            if self.max_events.is_some_and(|max| self.processed >= max) {
                return Ok(StopReason::EventBudget);
            }
            if self.wall_time.is_some_and(|limit| started.elapsed() >= limit) {
                return Ok(StopReason::WallClock);
            }
            let Some(event) = self.queue.pop() else {
                return Ok(StopReason::QueueEmpty);
            };
            self.processed += 1;
            let now = event.time;

            if let (Some(period), Some(at)) = (self.log_time, next_log) {
                if now >= at {
                    tracing::info!(
                        time = %now,
                        size = network.len(),
                        processed = self.processed,
                        pending = self.queue.len(),
                        "status"
                    );
                    next_log = Some(Time(now.0 - now.0 % period).offset(period));
                }
            }

            match event.body {
                Entry::Control(i) => {
                    let c = controls.get_mut(i).ok_or_else(|| {
                        SimError::Config(format!("control entry {i} out of range"))
                    })?;
                    let stop = {
                        let mut ctx = ControlContext::new(
                            network,
                            rng,
                            protocols,
                            TimePoint::At(now),
                            now,
                            &mut self.outbox,
                        );
                        c.control.execute(&mut ctx)?
                    };
                    network.purge_dead()?;
                    self.flush()?;
                    if stop {
                        tracing::info!(time = %now, control = %c.name, "stop requested");
                        return Ok(StopReason::Control(c.name.clone()));
                    }
                    if let Some(next) = cursors.get_mut(i).and_then(|cur| cur.next()) {
                        self.arm_control(i, next, c)?;
                    }
                }
                Entry::Node { target, pid, payload } => {
                    if self.deliver(now, target, pid, payload, network, protocols, rng)? {
                        self.flush()?;
                        observer.on_event(now, target, pid);
                    }
                }
            }
        }
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    fn arm_control(&mut self, i: usize, at: Time, c: &ScheduledControl) -> SimResult<()> {
        if at < c.scheduler.until() && at <= self.end_time && at >= self.queue.now() {
            self.queue.push(at, Entry::Control(i))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> SimResult<()> {
        let mut outbox = std::mem::take(&mut self.outbox);
        let result = self.enqueue_all(&mut outbox);
        self.outbox = outbox;
        result
    }

    /// Hand one node event to its target.  Returns `false` if it was
    /// dropped.
    #[allow(clippy::too_many_arguments)]
    fn deliver(
        &mut self,
        now:       Time,
        target:    NodeId,
        pid:       ProtocolId,
        payload:   Payload,
        network:   &mut Network,
        protocols: &ProtocolTable,
        rng:       &mut SimRng,
    ) -> SimResult<bool> {
        let Some(index) = network.index_of(target) else {
            tracing::debug!(time = %now, %target, %pid, "dropped event for removed node");
            return Ok(false);
        };
        let liveness = network.node(index)?.liveness();

        match payload {
            Payload::Message(msg) => {
                if liveness != Liveness::Up {
                    tracing::trace!(time = %now, %target, ?liveness, "dropped message");
                    return Ok(false);
                }
                tracing::trace!(time = %now, %target, %pid, "deliver");
                if !protocols.deliver(pid, network, rng, now, index, msg, &mut self.outbox)? {
                    return Err(SimError::Config(format!(
                        "protocol {:?} received an event but has no event handler",
                        protocols.spec(pid)?.name()
                    )));
                }
            }
            Payload::NextCycle(nc) => {
                let exec = match liveness {
                    Liveness::Up => true,
                    Liveness::Down => nc.persist_exec,
                    Liveness::Dead => false,
                };
                if exec && !protocols.run_cycle(pid, network, rng, now, index, &mut self.outbox)? {
                    return Err(SimError::Config(format!(
                        "protocol {:?} is driven by cycle events but has no cycle step",
                        protocols.spec(pid)?.name()
                    )));
                }
                self.rearm(now, target, pid, nc, liveness, network, protocols, rng)?;
            }
        }

        if network.by_id(target).is_some_and(|n| n.liveness() == Liveness::Dead) {
            if let Some(i) = network.index_of(target) {
                network.remove_at(i)?;
                tracing::debug!(time = %now, %target, "removed dead node");
            }
        }
        Ok(true)
    }

    /// Queue the next firing of a `NextCycle` event.  `fired` is the
    /// target's liveness when the current firing was popped.
    #[allow(clippy::too_many_arguments)]
    fn rearm(
        &mut self,
        now:       Time,
        target:    NodeId,
        pid:       ProtocolId,
        nc:        NextCycle,
        fired:     Liveness,
        network:   &Network,
        protocols: &ProtocolTable,
        rng:       &mut SimRng,
    ) -> SimResult<()> {
        let keep = match fired {
            Liveness::Up => true,
            Liveness::Down => nc.persist_schedule,
            Liveness::Dead => false,
        };
        let gone = network.by_id(target).is_none_or(|n| n.liveness() == Liveness::Dead);
        if !keep || gone {
            return Ok(());
        }
        let scheduler = protocols.spec(pid)?.scheduler();
        let delay = match nc.delay {
            DelayPolicy::Step => scheduler.step(),
            DelayPolicy::Exponential { mean } => (rng.exponential(mean)?.ceil() as u64).max(1),
        };
        let at = now.offset(delay);
        if at < scheduler.until() {
            self.outbox.push(Outgoing::next_cycle(at, target, pid, nc));
        }
        Ok(())
    }
}
