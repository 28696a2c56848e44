//! Message latency models.
//!
//! A transport occupies a protocol slot like any other protocol, so every
//! node carries its own instance.  A sender names the slot in
//! [`ProtocolContext::send_via`](crate::ProtocolContext::send_via) and its
//! own instance decides the delay.

use ps_core::params::key;
use ps_core::{NodeId, Params, PsError, PsResult, SimRng};

use crate::{Protocol, Transport};

pub const PAR_MINDELAY: &str = "mindelay";
pub const PAR_MAXDELAY: &str = "maxdelay";

/// Delay drawn uniformly from `min..=max`, independent of the endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformTransport {
    min: u64,
    max: u64,
}

impl UniformTransport {
    pub fn new(min: u64, max: u64) -> PsResult<Self> {
        if max < min {
            return Err(PsError::illegal(
                PAR_MAXDELAY,
                format!("{max} is below the minimum delay {min}"),
            ));
        }
        Ok(Self { min, max })
    }

    /// Reads `mindelay`; `maxdelay` defaults to it, giving a fixed delay.
    pub fn from_params(params: &Params, prefix: &str) -> PsResult<Self> {
        let min = params.get_u64(&key(prefix, PAR_MINDELAY))?;
        let max = params.get_u64_or(&key(prefix, PAR_MAXDELAY), min)?;
        Self::new(min, max).map_err(|_| {
            PsError::illegal(key(prefix, PAR_MAXDELAY), format!("{max} is below {PAR_MINDELAY} {min}"))
        })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }
}

impl Protocol for UniformTransport {}

impl Transport for UniformTransport {
    fn latency(&self, _src: NodeId, _dest: NodeId, rng: &mut SimRng) -> u64 {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }
}
