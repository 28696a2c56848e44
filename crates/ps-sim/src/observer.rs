//! Simulation observer trait for progress reporting and data collection.

use ps_core::{NodeId, ProtocolId, Time};
use ps_network::Network;

/// Callbacks invoked by [`Simulation::run`][crate::Simulation::run] at key
/// points of either dispatch loop.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Observers that must run *inside* the
/// schedule (and may stop it) are [`Control`][ps_network::Control]s
/// registered under `observer.*` instead.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct Progress;
///
/// impl SimObserver for Progress {
///     fn on_round_end(&mut self, time: Time, network: &Network) {
///         println!("round {time}: {} nodes", network.len());
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the start of each cycle-driven round, before churn.
    fn on_round_start(&mut self, _time: Time) {}

    /// Called after each cycle-driven round, once dead nodes are purged.
    fn on_round_end(&mut self, _time: Time, _network: &Network) {}

    /// Called after each event-driven delivery to a node.
    fn on_event(&mut self, _time: Time, _target: NodeId, _pid: ProtocolId) {}

    /// Called once after the final controls have run.
    fn on_sim_end(&mut self, _time: Time, _network: &Network) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
