use ps_core::{Params, Time};
use ps_schedule::TimePoint;
use ps_sim::{NoopObserver, RunReport, SimBuilder, SimError, Simulation, StopReason};

use crate::average::{Average, Delivery};
use crate::components::registry;
use crate::observer::Stats;

const BASE: &str = "
random.seed 11
protocol.links Neighbors
protocol.avg Average
protocol.avg.linkable links
order.protocol links avg
init.wire WireKOut
init.wire.protocol links
init.wire.k 5
";

fn config(extra: &str) -> Params {
    Params::parse(&format!("{BASE}\n{extra}")).unwrap()
}

fn simulate(extra: &str) -> (Simulation, RunReport) {
    let mut sim = SimBuilder::from_params(&config(extra), &registry(None)).unwrap();
    let report = sim.run(&mut NoopObserver).unwrap();
    (sim, report)
}

fn values(sim: &Simulation) -> Vec<f64> {
    let pid = sim.protocols.lookup("avg").unwrap();
    sim.network.iter().map(|n| n.protocol::<Average>(pid).unwrap().value()).collect()
}

fn stats(sim: &Simulation) -> Stats {
    let pid = sim.protocols.lookup("avg").unwrap();
    Stats::collect(&sim.network, pid, TimePoint::Final, Time::ZERO).unwrap()
}

// ── Distributions ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod distribution {
    use super::*;

    #[test]
    fn linear_spans_min_to_max() {
        let (sim, _) = simulate(
            "simulation.cycles 0
             network.size 5
             init.values LinearDistribution
             init.values.protocol avg
             init.values.max 4",
        );
        assert_eq!(values(&sim), vec![-4.0, -2.0, 0.0, 2.0, 4.0]);
    }

    #[test]
    fn linear_honours_explicit_min() {
        let (sim, _) = simulate(
            "simulation.cycles 0
             network.size 3
             init.values LinearDistribution
             init.values.protocol avg
             init.values.min 10
             init.values.max 20",
        );
        assert_eq!(values(&sim), vec![10.0, 15.0, 20.0]);
    }

    #[test]
    fn peak_fraction_splits_value() {
        let (sim, _) = simulate(
            "simulation.cycles 0
             network.size 10
             init.values PeakDistribution
             init.values.protocol avg
             init.values.value 10
             init.values.peaks 0.2",
        );
        let v = values(&sim);
        assert_eq!(&v[..2], &[5.0, 5.0]);
        assert!(v[2..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn stats_use_sample_variance() {
        let (sim, _) = simulate(
            "simulation.cycles 0
             network.size 3
             init.values LinearDistribution
             init.values.protocol avg
             init.values.max 1",
        );
        let s = stats(&sim);
        assert_eq!(s.size, 3);
        assert_eq!(s.avg, 0.0);
        assert_eq!(s.var, 1.0);
        assert_eq!((s.min, s.max), (-1.0, 1.0));
        assert!(s.last);
    }
}

// ── Averaging ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod averaging {
    use super::*;

    const LINEAR: &str = "
network.size 50
init.values LinearDistribution
init.values.protocol avg
init.values.max 100
";

    #[test]
    fn cycle_exchange_preserves_mass_and_converges() {
        let (sim, report) = simulate(&format!("simulation.cycles 30\n{LINEAR}"));
        assert_eq!(report.rounds, 30);
        let s = stats(&sim);
        assert!(s.avg.abs() < 1e-9, "average drifted to {}", s.avg);
        assert!(s.var < 1.0, "variance still {}", s.var);
    }

    #[test]
    fn accuracy_stops_the_run() {
        let (sim, report) = simulate(&format!(
            "simulation.cycles 500
             {LINEAR}
             observer.avg AverageObserver
             observer.avg.protocol avg
             observer.avg.accuracy 0.000001"
        ));
        assert_eq!(report.stop, StopReason::Control("observer.avg".into()));
        assert!(report.rounds < 500);
        assert!(stats(&sim).var <= 1e-6);
    }

    #[test]
    fn message_exchange_runs_under_events() {
        let (sim, report) = simulate(
            "simulation.endtime 300
             network.size 50
             protocol.avg.delay 1
             protocol.avg.step 10
             init.values PeakDistribution
             init.values.protocol avg
             init.values.value 50
             init.sched CdScheduler
             init.sched.protocol avg
             order.init wire values sched",
        );
        assert_eq!(report.stop, StopReason::EndTime);
        assert!(report.events > 0);
        let s = stats(&sim);
        assert!(s.max < 50.0);
        assert!(s.var < 1.0, "variance still {}", s.var);
    }

    #[test]
    fn exchange_through_a_transport_slot() {
        let (sim, report) = simulate(
            "simulation.endtime 300
             network.size 50
             protocol.tr UniformTransport
             protocol.tr.mindelay 1
             protocol.tr.maxdelay 3
             protocol.avg.transport tr
             protocol.avg.step 10
             init.values PeakDistribution
             init.values.protocol avg
             init.values.value 50
             init.sched CdScheduler
             init.sched.protocol avg
             order.init wire values sched",
        );
        let tr = sim.protocols.lookup("tr").unwrap();
        let pid = sim.protocols.lookup("avg").unwrap();
        let avg = sim.network.get(0).unwrap().protocol::<Average>(pid).unwrap();
        assert_eq!(avg.delivery(), Delivery::Transport(tr));
        assert_eq!(report.stop, StopReason::EndTime);
        let s = stats(&sim);
        assert!(s.max < 50.0);
        assert!(s.var < 1.0, "variance still {}", s.var);
    }

    #[test]
    fn observer_writes_csv_rows() {
        let path = std::env::temp_dir().join(format!("ps-aggregation-{}.csv", std::process::id()));
        let params = config(&format!(
            "simulation.cycles 3
             {LINEAR}
             observer.avg AverageObserver
             observer.avg.protocol avg
             observer.avg.FINAL"
        ));
        let mut sim = SimBuilder::from_params(&params, &registry(Some(path.clone()))).unwrap();
        sim.run(&mut NoopObserver).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "time,final,size,avg,var,min,max");
        // three rounds plus the final point
        assert_eq!(lines.len(), 5);
        assert!(lines[4].starts_with("2,true,50,"));
    }
}

// ── Configuration errors ──────────────────────────────────────────────────────

#[cfg(test)]
mod errors {
    use super::*;

    fn build(extra: &str) -> SimError {
        match SimBuilder::from_params(&config(extra), &registry(None)) {
            Ok(_) => panic!("configuration was accepted"),
            Err(e) => e,
        }
    }

    #[test]
    fn average_needs_a_linkable_slot() {
        let err = build(
            "simulation.cycles 1
             network.size 4
             protocol.other Average
             protocol.other.linkable avg",
        );
        assert!(err.is_parameter_error(), "{err}");
    }

    #[test]
    fn average_needs_a_transport_slot() {
        let err = build(
            "simulation.endtime 10
             network.size 4
             protocol.avg.transport links",
        );
        assert!(err.is_parameter_error(), "{err}");
    }

    #[test]
    fn unknown_type_key_is_reported() {
        let err = build(
            "simulation.cycles 1
             network.size 4
             observer.x Averager",
        );
        assert!(matches!(err, SimError::UnknownComponent { kind: "control", .. }), "{err}");
        assert!(crate::is_parameter_error(&anyhow::Error::new(err)));
    }

    #[test]
    fn missing_distribution_bound() {
        let err = build(
            "simulation.cycles 1
             network.size 4
             init.values LinearDistribution
             init.values.protocol avg",
        );
        assert!(err.is_parameter_error(), "{err}");
    }
}
