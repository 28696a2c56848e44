//! Initial value assignments for the averaging slot.

use ps_core::params::key;
use ps_core::{ProtocolId, PsError};
use ps_network::{Control, ControlContext, NetworkError, NetworkResult, Node};
use ps_sim::{Resolver, SimResult};

use crate::average::Average;

pub const PAR_PROT: &str = "protocol";
pub const PAR_MAX: &str = "max";
pub const PAR_MIN: &str = "min";
pub const PAR_VALUE: &str = "value";
pub const PAR_PEAKS: &str = "peaks";

fn average_slot(res: &Resolver<'_>, prefix: &str) -> SimResult<ProtocolId> {
    Ok(res.protocols.lookup(res.params.get_str(&key(prefix, PAR_PROT))?)?)
}

fn set_value(node: &mut Node, pid: ProtocolId, value: f64) -> NetworkResult<()> {
    let id = node.id();
    let avg = node
        .protocol_mut::<Average>(pid)
        .ok_or_else(|| NetworkError::Protocol(format!("slot {pid} of {id} is not an averaging slot")))?;
    avg.set_value(value);
    Ok(())
}

// ── LinearDistribution ────────────────────────────────────────────────────────

/// Evenly spaced values from `min` to `max` in population order.
#[derive(Copy, Clone, Debug)]
pub struct LinearDistribution {
    pid: ProtocolId,
    min: f64,
    max: f64,
}

impl LinearDistribution {
    pub fn new(pid: ProtocolId, min: f64, max: f64) -> Self {
        Self { pid, min, max }
    }

    /// `min` defaults to `-max`.
    pub fn from_params(res: &Resolver<'_>, prefix: &str) -> SimResult<Self> {
        let pid = average_slot(res, prefix)?;
        let max = res.params.get_f64(&key(prefix, PAR_MAX))?;
        let min = res.params.get_f64_or(&key(prefix, PAR_MIN), -max)?;
        if min > max {
            return Err(PsError::illegal(key(prefix, PAR_MIN), format!("{min} exceeds max {max}")).into());
        }
        Ok(Self::new(pid, min, max))
    }
}

impl Control for LinearDistribution {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let n = ctx.network.len();
        let step = if n > 1 { (self.max - self.min) / (n - 1) as f64 } else { 0.0 };
        for i in 0..n {
            set_value(ctx.network.node_mut(i)?, self.pid, self.min + i as f64 * step)?;
        }
        Ok(false)
    }
}

// ── PeakDistribution ──────────────────────────────────────────────────────────

/// `value` split evenly over the first `peaks` nodes; everyone else starts
/// at zero.  A `peaks` below 1 is a fraction of the population.
#[derive(Copy, Clone, Debug)]
pub struct PeakDistribution {
    pid:   ProtocolId,
    value: f64,
    peaks: f64,
}

impl PeakDistribution {
    pub fn new(pid: ProtocolId, value: f64, peaks: f64) -> Self {
        Self { pid, value, peaks }
    }

    pub fn from_params(res: &Resolver<'_>, prefix: &str) -> SimResult<Self> {
        let pid = average_slot(res, prefix)?;
        let value = res.params.get_f64(&key(prefix, PAR_VALUE))?;
        let peaks = res.params.get_f64_or(&key(prefix, PAR_PEAKS), 1.0)?;
        if peaks <= 0.0 {
            return Err(PsError::illegal(key(prefix, PAR_PEAKS), "must be positive").into());
        }
        Ok(Self::new(pid, value, peaks))
    }

    fn peak_count(&self, n: usize) -> usize {
        let count = if self.peaks < 1.0 { (self.peaks * n as f64) as usize } else { self.peaks as usize };
        count.clamp(1, n.max(1))
    }
}

impl Control for PeakDistribution {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let n = ctx.network.len();
        if n == 0 {
            return Ok(false);
        }
        let peaks = self.peak_count(n);
        let share = self.value / peaks as f64;
        for i in 0..n {
            let v = if i < peaks { share } else { 0.0 };
            set_value(ctx.network.node_mut(i)?, self.pid, v)?;
        }
        Ok(false)
    }
}
