//! Type keys this binary adds to the built-in registry.

use std::path::PathBuf;

use ps_network::{Control, Protocol};
use ps_sim::ComponentRegistry;

use crate::average::{Average, Neighbors};
use crate::distribution::{LinearDistribution, PeakDistribution};
use crate::observer::AverageObserver;

/// Built-ins plus `Average`, `Neighbors`, `LinearDistribution`,
/// `PeakDistribution` and `AverageObserver`.  Every `AverageObserver`
/// writes to `csv` when it is given.
pub fn registry(csv: Option<PathBuf>) -> ComponentRegistry {
    let mut r = ComponentRegistry::with_builtins();
    r.protocol("Average", |s| s.cycle::<Average>().event::<Average>(), |res, prefix| {
        Ok(Box::new(Average::from_params(res, prefix)?) as Box<dyn Protocol>)
    })
    .protocol("Neighbors", |s| s.linkable::<Neighbors>(), |_, _| {
        Ok(Box::new(Neighbors::default()) as Box<dyn Protocol>)
    })
    .control("LinearDistribution", |res, prefix| {
        Ok(Box::new(LinearDistribution::from_params(res, prefix)?) as Box<dyn Control>)
    })
    .control("PeakDistribution", |res, prefix| {
        Ok(Box::new(PeakDistribution::from_params(res, prefix)?) as Box<dyn Control>)
    })
    .control("AverageObserver", move |res, prefix| {
        let obs = AverageObserver::from_params(res, prefix, csv.as_deref())?;
        Ok(Box::new(obs) as Box<dyn Control>)
    });
    r
}
