//! The `Simulation` controller: owns the world and runs it in the mode
//! chosen at build time.

use std::fmt;
use std::time::Duration;

use ps_core::{Params, PsError, SimRng, Time};
use ps_network::{Control, ControlContext, Network, Outgoing, ProtocolTable};
use ps_schedule::{Scheduler, TimePoint};

use crate::{CycleDriver, EventEngine, NodeOrder, SimError, SimObserver, SimResult};

pub const PAR_CYCLES: &str = "simulation.cycles";
pub const PAR_SHUFFLE: &str = "simulation.shuffle";
pub const PAR_GETPAIR: &str = "simulation.getpair";
pub const PAR_PERSIST_DOWN: &str = "simulation.persistdown";
pub const PAR_END_TIME: &str = "simulation.endtime";
pub const PAR_MAX_EVENTS: &str = "simulation.maxevents";
pub const PAR_WALL_TIME: &str = "simulation.walltime";
pub const PAR_LOG_TIME: &str = "simulation.logtime";

// ── Mode ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleSettings {
    pub cycles:       u64,
    pub order:        NodeOrder,
    pub persist_down: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EventSettings {
    pub end_time:   Time,
    pub max_events: Option<u64>,
    pub wall_time:  Option<Duration>,
    pub log_time:   Option<u64>,
}

/// Execution discipline, fixed for the whole run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Cycle(CycleSettings),
    Event(EventSettings),
}

impl Mode {
    pub fn cycles(cycles: u64) -> Self {
        Mode::Cycle(CycleSettings { cycles, order: NodeOrder::Sequential, persist_down: false })
    }

    pub fn event(end_time: Time) -> Self {
        Mode::Event(EventSettings { end_time, max_events: None, wall_time: None, log_time: None })
    }

    /// Probe the configuration: `simulation.cycles` selects cycle-driven
    /// mode and is checked first, then `simulation.endtime` selects
    /// event-driven mode.
    pub fn from_params(params: &Params) -> SimResult<Self> {
        if params.contains(PAR_CYCLES) {
            let order = if params.contains(PAR_SHUFFLE) {
                NodeOrder::Shuffled
            } else if params.contains(PAR_GETPAIR) {
                NodeOrder::RandomPick
            } else {
                NodeOrder::Sequential
            };
            return Ok(Mode::Cycle(CycleSettings {
                cycles:       params.get_u64(PAR_CYCLES)?,
                order,
                persist_down: params.contains(PAR_PERSIST_DOWN),
            }));
        }
        if params.contains(PAR_END_TIME) {
            let optional = |k: &str| -> SimResult<Option<u64>> {
                Ok(if params.contains(k) { Some(params.get_u64(k)?) } else { None })
            };
            return Ok(Mode::Event(EventSettings {
                end_time:   Time(params.get_u64(PAR_END_TIME)?),
                max_events: optional(PAR_MAX_EVENTS)?,
                wall_time:  optional(PAR_WALL_TIME)?.map(Duration::from_millis),
                log_time:   optional(PAR_LOG_TIME)?,
            }));
        }
        Err(PsError::MissingParameter(format!("{PAR_CYCLES} or {PAR_END_TIME}")).into())
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Mode::Cycle(_))
    }
}

// ── Controls ──────────────────────────────────────────────────────────────────

/// Where a scheduled control runs in a cycle-driven round.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Population changes, before any protocol step.
    Dynamics,
    /// Measurement; before the steps if the scheduler has `precycle`.
    Observer,
}

/// A control together with the schedule it runs on.
pub struct ScheduledControl {
    pub name:      String,
    pub phase:     Phase,
    pub scheduler: Scheduler,
    pub control:   Box<dyn Control>,
}

impl ScheduledControl {
    pub fn new(
        name:      impl Into<String>,
        phase:     Phase,
        scheduler: Scheduler,
        control:   Box<dyn Control>,
    ) -> Self {
        Self { name: name.into(), phase, scheduler, control }
    }
}

impl fmt::Debug for ScheduledControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledControl")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// Why the main loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// All configured cycles ran.
    Completed,
    /// The named control returned `true`.
    Control(String),
    QueueEmpty,
    EndTime,
    EventBudget,
    WallClock,
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub stop:   StopReason,
    /// Last round (cycle mode) or last event time (event mode).
    pub time:   Time,
    /// Completed rounds; zero in event mode.
    pub rounds: u64,
    /// Cycle steps invoked by the cycle driver.
    pub steps:  u64,
    /// Queue entries processed; zero in cycle mode.
    pub events: u64,
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// The top-level driver.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Simulation {
    pub network:              Network,
    pub protocols:            ProtocolTable,
    pub rng:                  SimRng,
    pub(crate) mode:          Mode,
    pub(crate) initializers:  Vec<(String, Box<dyn Control>)>,
    pub(crate) controls:      Vec<ScheduledControl>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("mode", &self.mode)
            .field("size", &self.network.len())
            .field("protocols", &self.protocols.len())
            .field("controls", &self.controls)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn controls(&self) -> &[ScheduledControl] {
        &self.controls
    }

    /// Run the initializers once, then the main loop, then every control
    /// whose scheduler includes the final time point.
    pub fn run(&mut self, observer: &mut dyn SimObserver) -> SimResult<RunReport> {
        tracing::info!(
            mode = if self.mode.is_cycle() { "cycle" } else { "event" },
            size = self.network.len(),
            protocols = self.protocols.len(),
            controls = self.controls.len(),
            "simulation start"
        );
        let mut outbox = Vec::new();
        self.run_initializers(&mut outbox)?;

        let report = match self.mode {
            Mode::Cycle(settings) => {
                if !outbox.is_empty() {
                    return Err(cycle_mode_events("initializers"));
                }
                self.run_cycles(settings, observer)?
            }
            Mode::Event(settings) => self.run_events(settings, &mut outbox, observer)?,
        };

        self.run_controls(TimePoint::Final, report.time, |_| true, &mut outbox)?;
        if !outbox.is_empty() {
            return Err(final_events(outbox.len()));
        }
        observer.on_sim_end(report.time, &self.network);
        tracing::info!(
            stop = ?report.stop,
            time = %report.time,
            rounds = report.rounds,
            steps = report.steps,
            events = report.events,
            size = self.network.len(),
            "simulation end"
        );
        Ok(report)
    }

    fn run_initializers(&mut self, outbox: &mut Vec<Outgoing>) -> SimResult<()> {
        let Self { network, rng, protocols, initializers, .. } = self;
        for (name, init) in initializers.iter_mut() {
            let mut ctx = ControlContext::new(
                network,
                rng,
                protocols,
                TimePoint::At(Time::ZERO),
                Time::ZERO,
                outbox,
            );
            init.execute(&mut ctx)?;
            tracing::debug!(initializer = %name, size = network.len(), "initialized");
        }
        Ok(())
    }

    /// Execute every selected control active at `point`, in declaration
    /// order.  Returns the name of the first control that asked to stop;
    /// the others still run.
    fn run_controls(
        &mut self,
        point:  TimePoint,
        time:   Time,
        select: impl Fn(&ScheduledControl) -> bool,
        outbox: &mut Vec<Outgoing>,
    ) -> SimResult<Option<String>> {
        let Self { network, rng, protocols, controls, .. } = self;
        let mut stop = None;
        for c in controls.iter_mut() {
            if !select(c) || !c.scheduler.active_at(point) {
                continue;
            }
            let mut ctx = ControlContext::new(network, rng, protocols, point, time, outbox);
            if c.control.execute(&mut ctx)? && stop.is_none() {
                stop = Some(c.name.clone());
            }
        }
        Ok(stop)
    }

    fn run_cycles(
        &mut self,
        settings: CycleSettings,
        observer: &mut dyn SimObserver,
    ) -> SimResult<RunReport> {
        let mut driver = CycleDriver::new(&self.protocols)
            .with_order(settings.order)
            .persist_down(settings.persist_down);
        let mut report = RunReport {
            stop:   StopReason::Completed,
            time:   Time::ZERO,
            rounds: 0,
            steps:  0,
            events: 0,
        };
        let mut outbox = Vec::new();

        for c in 0..settings.cycles {
            let t = Time(c);
            let point = TimePoint::At(t);
            report.time = t;
            observer.on_round_start(t);

            let mut stop =
                self.run_controls(point, t, |s| s.phase == Phase::Dynamics, &mut outbox)?;
            if stop.is_none() {
                stop = self.run_controls(
                    point,
                    t,
                    |s| s.phase == Phase::Observer && s.scheduler.precycle(),
                    &mut outbox,
                )?;
            }
            if !outbox.is_empty() {
                return Err(cycle_mode_events("controls"));
            }
            if let Some(name) = stop {
                report.stop = StopReason::Control(name);
                break;
            }

            report.steps += driver.run_round(t, &mut self.network, &self.protocols, &mut self.rng)?;

            let stop = self.run_controls(
                point,
                t,
                |s| s.phase == Phase::Observer && !s.scheduler.precycle(),
                &mut outbox,
            )?;
            if !outbox.is_empty() {
                return Err(cycle_mode_events("controls"));
            }
            let purged = self.network.purge_dead()?;
            report.rounds += 1;
            observer.on_round_end(t, &self.network);
            tracing::info!(round = c, size = self.network.len(), purged, "cycle complete");

            if let Some(name) = stop {
                report.stop = StopReason::Control(name);
                break;
            }
        }
        Ok(report)
    }

    fn run_events(
        &mut self,
        settings: EventSettings,
        outbox:   &mut Vec<Outgoing>,
        observer: &mut dyn SimObserver,
    ) -> SimResult<RunReport> {
        let mut engine = EventEngine::new(settings.end_time);
        if let Some(max) = settings.max_events {
            engine = engine.with_max_events(max);
        }
        if let Some(limit) = settings.wall_time {
            engine = engine.with_wall_time(limit);
        }
        if let Some(period) = settings.log_time {
            engine = engine.with_log_time(period);
        }
        engine.enqueue_all(outbox)?;

        let stop = engine.run(
            &mut self.network,
            &self.protocols,
            &mut self.rng,
            &mut self.controls,
            observer,
        )?;
        Ok(RunReport {
            stop,
            time: engine.now(),
            rounds: 0,
            steps: 0,
            events: engine.processed(),
        })
    }
}

fn cycle_mode_events(source: &str) -> SimError {
    SimError::Config(format!("{source} scheduled events, but cycle-driven mode has no event queue"))
}

fn final_events(count: usize) -> SimError {
    SimError::Config(format!("final controls scheduled {count} event(s) after the run ended"))
}
