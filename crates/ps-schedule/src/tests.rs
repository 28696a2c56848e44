//! Unit tests for ps-schedule.

use ps_core::{Params, Time};

use crate::Scheduler;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn active_set(s: &Scheduler, upto: u64) -> Vec<u64> {
    (0..=upto).filter(|t| s.active(Time(*t))).collect()
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scheduler {
    use proptest::prelude::*;
    use ps_core::PsError;

    use super::*;
    use crate::TimePoint;

    #[test]
    fn range_and_step() {
        let s = Scheduler::new(Time(2), Time(10), 3).unwrap();
        assert_eq!(active_set(&s, 12), vec![2, 5, 8]);
    }

    #[test]
    fn single_point() {
        let s = Scheduler::at(Time(7));
        assert!(s.active(Time(7)));
        assert!(!s.active(Time(8)));
        assert!(!s.active(Time(6)));
        assert_eq!(s.step(), 1);
        assert_eq!(s.until(), Time(8));
    }

    #[test]
    fn default_is_always_active() {
        let s = Scheduler::default();
        assert!(s.active(Time(0)));
        assert!(s.active(Time(123_456)));
        assert!(!s.fin());
        assert!(!s.precycle());
    }

    #[test]
    fn final_is_disjoint_from_integer_time() {
        let plain = Scheduler::at(Time(3));
        let fin = Scheduler::at(Time(3)).with_final();
        assert!(!plain.active_at(TimePoint::Final));
        assert!(fin.active_at(TimePoint::Final));
        assert!(!fin.active(Time::MAX));
        assert!(fin.active_at(TimePoint::At(Time(3))));
    }

    #[test]
    fn zero_step_and_empty_range_are_illegal() {
        assert!(matches!(Scheduler::new(Time(0), Time(5), 0), Err(PsError::IllegalParameter { .. })));
        assert!(matches!(Scheduler::new(Time(5), Time(5), 1), Err(PsError::IllegalParameter { .. })));
    }

    #[test]
    fn cursor_has_no_upper_bound() {
        let s = Scheduler::new(Time(1), Time(4), 2).unwrap();
        let mut c = s.cursor();
        assert_eq!(c.peek(), Time(1));
        let got: Vec<Time> = c.by_ref().take(4).collect();
        assert_eq!(got, vec![Time(1), Time(3), Time(5), Time(7)]);
        assert_eq!(c.peek(), Time(9));
    }

    proptest! {
        #[test]
        fn active_is_pure(from in 0u64..50, len in 1u64..50, step in 1u64..10, t in 0u64..200) {
            let s = Scheduler::new(Time(from), Time(from + len), step).unwrap();
            let first = s.active(Time(t));
            for _ in 0..3 {
                prop_assert_eq!(s.active(Time(t)), first);
            }
            let expected = t >= from && t < from + len && (t - from) % step == 0;
            prop_assert_eq!(first, expected);
        }

        #[test]
        fn cursor_visits_exactly_the_active_points(from in 0u64..20, len in 1u64..60, step in 1u64..7) {
            let s = Scheduler::new(Time(from), Time(from + len), step).unwrap();
            let via_cursor: Vec<u64> =
                s.cursor().take_while(|t| *t < s.until()).map(|t| t.0).collect();
            prop_assert_eq!(via_cursor, active_set(&s, from + len + step));
        }
    }

    #[test]
    fn params_unused_keys_default() {
        let s = Scheduler::from_params(&Params::new(), "protocol.avg").unwrap();
        assert_eq!(s, Scheduler::default());
    }

    #[test]
    fn params_full_set() {
        let p = Params::new()
            .with("observer.stats.from", "2")
            .with("observer.stats.until", "10")
            .with("observer.stats.step", "3")
            .with_flag("observer.stats.FINAL")
            .with_flag("observer.stats.precycle");
        let s = Scheduler::from_params(&p, "observer.stats").unwrap();
        assert_eq!(active_set(&s, 12), vec![2, 5, 8]);
        assert!(s.fin());
        assert!(s.precycle());
    }

    #[test]
    fn params_at_overrides_range() {
        let p = Params::new()
            .with("init.x.at", "4")
            .with("init.x.from", "0")
            .with("init.x.step", "2");
        let s = Scheduler::from_params(&p, "init.x").unwrap();
        assert_eq!(active_set(&s, 10), vec![4]);
    }

    #[test]
    fn params_strict_requires_step() {
        let p = Params::new();
        assert!(matches!(
            Scheduler::from_params_strict(&p, "protocol.avg"),
            Err(PsError::MissingParameter(k)) if k == "protocol.avg.step"
        ));
        let p = p.with("protocol.avg.step", "5");
        assert_eq!(Scheduler::from_params_strict(&p, "protocol.avg").unwrap().step(), 5);
    }

    #[test]
    fn params_illegal_values() {
        let bad_step = Params::new().with("c.step", "0");
        assert!(matches!(Scheduler::from_params(&bad_step, "c"), Err(PsError::IllegalParameter { .. })));

        let negative_from = Params::new().with("c.from", "-3");
        assert!(Scheduler::from_params(&negative_from, "c").is_err());

        let inverted = Params::new().with("c.from", "8").with("c.until", "2");
        assert!(Scheduler::from_params(&inverted, "c").is_err());

        let garbage = Params::new().with("c.until", "soon");
        assert!(matches!(Scheduler::from_params(&garbage, "c"), Err(PsError::IllegalParameter { .. })));
    }
}

// ── EventQueue ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod event_queue {
    use super::*;
    use crate::{EventQueue, ScheduleError};

    #[test]
    fn empty_queue() {
        let mut q: EventQueue<&str> = EventQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.peek_time(), None);
        assert!(q.pop().is_none());
        assert_eq!(q.now(), Time::ZERO);
    }

    #[test]
    fn equal_times_are_fifo() {
        let mut q = EventQueue::new();
        q.push(Time(5), "a@5").unwrap();
        q.push(Time(3), "b@3").unwrap();
        q.push(Time(3), "c@3").unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.time_count(), 2);

        let order: Vec<&str> = std::iter::from_fn(|| q.pop().map(|e| e.body)).collect();
        assert_eq!(order, vec!["b@3", "c@3", "a@5"]);
        assert_eq!(q.now(), Time(5));
        assert!(q.is_empty());
    }

    #[test]
    fn pop_advances_now() {
        let mut q = EventQueue::new();
        q.push(Time(4), 1).unwrap();
        q.push(Time(9), 2).unwrap();
        let e = q.pop().unwrap();
        assert_eq!((e.time, e.body), (Time(4), 1));
        assert_eq!(q.now(), Time(4));
        assert_eq!(q.peek_time(), Some(Time(9)));
    }

    #[test]
    fn push_before_now_is_rejected() {
        let mut q = EventQueue::new();
        q.push(Time(10), ()).unwrap();
        q.pop().unwrap();
        let err = q.push(Time(9), ()).unwrap_err();
        assert!(matches!(err, ScheduleError::OrderingViolation { time: Time(9), now: Time(10) }));
        assert!(q.is_empty());
        // Equal to now is fine.
        q.push(Time(10), ()).unwrap();
    }

    #[test]
    fn push_after_is_relative_to_now() {
        let mut q = EventQueue::new();
        q.push(Time(6), 'x').unwrap();
        q.pop().unwrap();
        q.push_after(4, 'y').unwrap();
        assert_eq!(q.peek_time(), Some(Time(10)));
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut q = EventQueue::new();
        let a = q.push(Time(2), ()).unwrap();
        let b = q.push(Time(1), ()).unwrap();
        assert!(b > a);
        assert_eq!(q.pop().unwrap().seq, b);
        assert_eq!(q.pop().unwrap().seq, a);
    }

    #[test]
    fn clear_keeps_now() {
        let mut q = EventQueue::new();
        q.push(Time(3), 0).unwrap();
        q.push(Time(7), 1).unwrap();
        q.pop().unwrap();
        q.clear();
        assert!(q.is_empty());
        assert!(q.push(Time(2), 2).is_err());
    }
}
