//! Property-based tests for timing conversion and judgement.

use proptest::prelude::*;
use takt_track::{Beatmap, Performance, PerformanceGrade};

proptest! {
    /// beat(time(b)) == b for any finite beat and positive tempo.
    #[test]
    fn beat_time_roundtrip(
        beat in -1.0e4f64..1.0e4,
        offset in -100.0f64..100.0,
        tempo in 1.0f64..1000.0,
    ) {
        let map = Beatmap { offset, tempo, ..Beatmap::default() };
        let there_and_back = map.beat(map.time(beat));
        prop_assert!(
            (there_and_back - beat).abs() <= beat.abs().max(1.0) * 1e-9,
            "roundtrip {} -> {}", beat, there_and_back
        );
    }

    /// time is strictly increasing in beat for positive tempo.
    #[test]
    fn beat_to_time_is_monotone(
        beat in -1.0e4f64..1.0e4,
        delta in 1.0e-6f64..100.0,
        tempo in 1.0f64..1000.0,
    ) {
        let map = Beatmap { tempo, ..Beatmap::default() };
        prop_assert!(map.time(beat + delta) > map.time(beat));
    }

    /// The judged shift magnitude never decreases as the error grows.
    #[test]
    fn judge_shift_is_monotone_in_error(
        err_a in 0.0f64..0.2,
        err_b in 0.0f64..0.2,
        tol in 0.001f64..0.05,
    ) {
        let (small, large) = if err_a <= err_b { (err_a, err_b) } else { (err_b, err_a) };
        let shift_small = Performance::judge(tol, 0.0, Some(small), true).shift().unwrap();
        let shift_large = Performance::judge(tol, 0.0, Some(large), true).shift().unwrap();
        prop_assert!(shift_small.abs() <= shift_large.abs());
    }

    /// Early and late errors of the same magnitude mirror each other.
    #[test]
    fn judge_is_symmetric(err in 1.0e-6f64..0.2, tol in 0.001f64..0.05) {
        let late = Performance::judge(tol, 0.0, Some(err), true);
        let early = Performance::judge(tol, 0.0, Some(-err), true);
        prop_assert_eq!(late.shift().unwrap(), -early.shift().unwrap());
    }

    /// A hit inside one tolerance is always perfect; outside seven always failed.
    #[test]
    fn judge_ladder_extremes(tol in 0.001f64..0.05) {
        let inside = Performance::judge(tol, 0.0, Some(tol * 0.99), true);
        prop_assert_eq!(inside.grade, PerformanceGrade::Perfect);
        let outside = Performance::judge(tol, 0.0, Some(tol * 10.0), true);
        prop_assert_eq!(outside.grade, PerformanceGrade::LateFailed);
    }
}
