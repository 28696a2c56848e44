//! Convergence statistics over the averaging slot.

use std::fs::File;
use std::path::Path;

use csv::Writer;
use serde::Serialize;
use tracing::info;

use ps_core::params::key;
use ps_core::{ProtocolId, Time};
use ps_network::{Control, ControlContext, Network, NetworkError, NetworkResult};
use ps_schedule::TimePoint;
use ps_sim::{Resolver, SimResult};

use crate::average::Average;

pub const PAR_PROT: &str = "protocol";
pub const PAR_ACCURACY: &str = "accuracy";

/// One row of the statistics table.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Stats {
    pub time:  u64,
    #[serde(rename = "final")]
    pub last:  bool,
    pub size:  usize,
    pub avg:   f64,
    /// Sample variance; zero for fewer than two nodes.
    pub var:   f64,
    pub min:   f64,
    pub max:   f64,
}

impl Stats {
    /// Statistics over the Up nodes holding an [`Average`] in `pid`, or
    /// `None` if there are none.
    pub fn collect(network: &Network, pid: ProtocolId, point: TimePoint, time: Time) -> Option<Self> {
        let values: Vec<f64> = network
            .iter()
            .filter(|n| n.is_up())
            .filter_map(|n| n.protocol::<Average>(pid))
            .map(Average::value)
            .collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let avg = values.iter().sum::<f64>() / n;
        let var = if values.len() > 1 {
            values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            time: time.0,
            last: point == TimePoint::Final,
            size: values.len(),
            avg,
            var,
            min,
            max,
        })
    }
}

/// Logs [`Stats`] every time it runs, optionally appending them to a CSV
/// file.  With `accuracy` set it stops the run once the variance drops to
/// that bound.
pub struct AverageObserver {
    pid:      ProtocolId,
    accuracy: Option<f64>,
    csv:      Option<Writer<File>>,
}

impl AverageObserver {
    pub fn new(pid: ProtocolId) -> Self {
        Self { pid, accuracy: None, csv: None }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Write a header and one row per execution to `path`.
    pub fn with_csv(mut self, path: &Path) -> NetworkResult<Self> {
        self.csv = Some(Writer::from_path(path).map_err(csv_error)?);
        Ok(self)
    }

    pub fn from_params(res: &Resolver<'_>, prefix: &str, csv: Option<&Path>) -> SimResult<Self> {
        let pid = res.protocols.lookup(res.params.get_str(&key(prefix, PAR_PROT))?)?;
        let mut obs = Self::new(pid);
        let accuracy_key = key(prefix, PAR_ACCURACY);
        if res.params.contains(&accuracy_key) {
            obs = obs.with_accuracy(res.params.get_f64(&accuracy_key)?);
        }
        if let Some(path) = csv {
            obs = obs.with_csv(path)?;
        }
        Ok(obs)
    }
}

impl Control for AverageObserver {
    fn execute(&mut self, ctx: &mut ControlContext<'_>) -> NetworkResult<bool> {
        let Some(stats) = Stats::collect(ctx.network, self.pid, ctx.point, ctx.time) else {
            return Ok(false);
        };
        info!(
            time = stats.time,
            last = stats.last,
            size = stats.size,
            avg = stats.avg,
            var = stats.var,
            min = stats.min,
            max = stats.max,
            "average"
        );
        if let Some(w) = self.csv.as_mut() {
            w.serialize(stats).map_err(csv_error)?;
            w.flush().map_err(|e| NetworkError::Protocol(format!("csv: {e}")))?;
        }
        Ok(self.accuracy.is_some_and(|acc| stats.var <= acc))
    }
}

fn csv_error(e: csv::Error) -> NetworkError {
    NetworkError::Protocol(format!("csv: {e}"))
}
