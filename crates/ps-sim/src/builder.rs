//! Fluent builder for constructing a [`Simulation`].

use ps_core::{Params, SimRng, Time};
use ps_dynamics::{NodeFactory, populate};
use ps_network::{Control, Network, ProtocolTable};
use ps_schedule::Scheduler;

use crate::registry::Resolver;
use crate::{ComponentRegistry, Mode, Phase, ScheduledControl, SimError, SimResult, Simulation};

pub const PAR_SEED: &str = "random.seed";
pub const PAR_SIZE: &str = "network.size";
pub const PAR_CAPACITY: &str = "network.capacity";

/// Fluent builder for [`Simulation`].
///
/// # Required inputs
///
/// - [`ProtocolTable`]: the registered protocol slots
/// - a [`NodeFactory`] producing one instance per slot for every bootstrap
///   node
/// - a [`Mode`], via `.mode(..)`, `.cycles(n)` or `.end_time(t)`
///
/// # Optional inputs (have defaults)
///
/// | Method             | Default            |
/// |--------------------|--------------------|
/// | `.seed(s)`         | `0`                |
/// | `.size(n)`         | `0` nodes          |
/// | `.capacity(c)`     | the bootstrap size |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(table, Box::new(PrototypeFactory::new(protos)))
///     .seed(42)
///     .size(1_000)
///     .cycles(30)
///     .init("wire", Box::new(WireKOut::new(links, 20)))
///     .observer("avg", Scheduler::default(), Box::new(AverageObserver::new(avg)))
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    protocols:    ProtocolTable,
    factory:      Box<dyn NodeFactory>,
    seed:         u64,
    size:         usize,
    capacity:     Option<usize>,
    mode:         Option<Mode>,
    initializers: Vec<(String, Box<dyn Control>)>,
    controls:     Vec<ScheduledControl>,
}

impl SimBuilder {
    pub fn new(protocols: ProtocolTable, factory: Box<dyn NodeFactory>) -> Self {
        Self {
            protocols,
            factory,
            seed:         0,
            size:         0,
            capacity:     None,
            mode:         None,
            initializers: Vec::new(),
            controls:     Vec::new(),
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Bootstrap population size.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Nominal maximum population; churn's default upper bound.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn cycles(self, cycles: u64) -> Self {
        self.mode(Mode::cycles(cycles))
    }

    pub fn end_time(self, end_time: Time) -> Self {
        self.mode(Mode::event(end_time))
    }

    /// Run `control` once, before the first round, after the initializers
    /// already added.
    pub fn init(mut self, name: impl Into<String>, control: Box<dyn Control>) -> Self {
        self.initializers.push((name.into(), control));
        self
    }

    pub fn dynamics(
        mut self,
        name:      impl Into<String>,
        scheduler: Scheduler,
        control:   Box<dyn Control>,
    ) -> Self {
        self.controls.push(ScheduledControl::new(name, Phase::Dynamics, scheduler, control));
        self
    }

    pub fn observer(
        mut self,
        name:      impl Into<String>,
        scheduler: Scheduler,
        control:   Box<dyn Control>,
    ) -> Self {
        self.controls.push(ScheduledControl::new(name, Phase::Observer, scheduler, control));
        self
    }

    /// Validate, create the bootstrap population and return a ready-to-run
    /// [`Simulation`].
    pub fn build(self) -> SimResult<Simulation> {
        let mode = self
            .mode
            .ok_or_else(|| SimError::Config("no simulation mode selected".into()))?;
        let capacity = self.capacity.unwrap_or(self.size);
        if capacity < self.size {
            return Err(SimError::Config(format!(
                "capacity {capacity} is below the bootstrap size {}",
                self.size
            )));
        }

        // Dynamics first so that at equal times churn precedes measurement
        // in the event queue as it does in a cycle round.
        let mut controls = self.controls;
        controls.sort_by_key(|c| c.phase != Phase::Dynamics);

        let mut network = Network::with_capacity(capacity);
        populate(&mut network, self.size, self.factory.as_ref())?;

        Ok(Simulation {
            network,
            protocols: self.protocols,
            rng: SimRng::new(self.seed),
            mode,
            initializers: self.initializers,
            controls,
        })
    }

    /// Resolve a whole simulation from configuration.
    ///
    /// | Prefix          | Becomes                                           |
    /// |-----------------|---------------------------------------------------|
    /// | `protocol.<n>`  | protocol slot `n` (value = registered type key)   |
    /// | `init.<n>`      | control run once before the first round           |
    /// | `dynamics.<n>`  | scheduled control, [`Phase::Dynamics`]            |
    /// | `observer.<n>`  | scheduled control, [`Phase::Observer`]            |
    ///
    /// Each component reads its own settings, and its [`Scheduler`], under
    /// its full key.
    pub fn from_params(params: &Params, registry: &ComponentRegistry) -> SimResult<Simulation> {
        let mode = Mode::from_params(params)?;
        let (protocols, prefixes) = registry.protocol_table(params)?;
        let size = params.get_usize(PAR_SIZE)?;
        let capacity = params.get_usize_or(PAR_CAPACITY, size)?;
        let seed = params.get_u64_or(PAR_SEED, 0)?;

        let (factory, initializers, controls) = {
            let res = Resolver::new(params, &protocols, registry, &prefixes);
            let factory = res.factory()?;

            let mut initializers = Vec::new();
            for prefix in params.names("init")? {
                initializers.push((prefix.clone(), res.control(&prefix)?));
            }

            let mut controls = Vec::new();
            for (group, phase) in [("dynamics", Phase::Dynamics), ("observer", Phase::Observer)] {
                for prefix in params.names(group)? {
                    let scheduler = Scheduler::from_params(params, &prefix)?;
                    let control = res.control(&prefix)?;
                    controls.push(ScheduledControl::new(prefix, phase, scheduler, control));
                }
            }
            (factory, initializers, controls)
        };

        let mut builder = SimBuilder::new(protocols, Box::new(factory))
            .seed(seed)
            .size(size)
            .capacity(capacity)
            .mode(mode);
        builder.initializers = initializers;
        builder.controls = controls;
        builder.build()
    }
}
