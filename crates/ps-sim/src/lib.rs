//! `ps-sim` — dispatch loops and the simulation controller for the `ps`
//! overlay protocol simulator.
//!
//! # Cycle-driven round
//!
//! ```text
//! for round in 0..cycles:
//!   ① Dynamics   — churn controls active at this round
//!   ② Precycle   — observers whose scheduler has `precycle`
//!   ③ Dispatch   — CycleDriver: every Up node, every active cycle slot
//!   ④ Observers  — the remaining observers active at this round
//!   ⑤ Purge      — nodes that went Dead during the round leave
//! then every control with FINAL runs once
//! ```
//!
//! # Event-driven run
//!
//! [`EventEngine`] pops `(time, insertion order)`-ordered entries until the
//! queue empties or a budget (end time, event count, wall clock) is spent.
//! Controls are queue entries too, re-armed from their scheduler's cursor.
//!
//! # Cargo features
//!
//! | Feature   | Effect                                              |
//! |-----------|-----------------------------------------------------|
//! | `fx-hash` | FxHash for the population's `NodeId → index` map    |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use ps_sim::{ComponentRegistry, NoopObserver, SimBuilder};
//!
//! let mut registry = ComponentRegistry::with_builtins();
//! registry.protocol("Average", |s| s.cycle::<Average>(), |res, prefix| Average::boxed(res, prefix));
//! let mut sim = SimBuilder::from_params(&params, &registry)?;
//! let report = sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod cycle;
pub mod error;
pub mod event;
pub mod observer;
pub mod registry;
pub mod simulation;


pub use builder::SimBuilder;
pub use cycle::{CycleDriver, NodeOrder};
pub use error::{SimError, SimResult};
pub use event::{Entry, EventEngine};
pub use observer::{NoopObserver, SimObserver};
pub use registry::{ComponentRegistry, Resolver};
pub use simulation::{
    CycleSettings, EventSettings, Mode, Phase, RunReport, ScheduledControl, Simulation, StopReason,
};
