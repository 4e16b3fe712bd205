//! The performance grade ladder and timing judgement.

use serde::{Deserialize, Serialize};

/// Grade of a single judged hit.
///
/// Encodes a timing shift (0 = perfect, ±1 good, ±2 bad, ±3 failed, with
/// the sign distinguishing early from late) and whether the wrong kind of
/// knock was used. `Miss` stands apart with no shift at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceGrade {
    /// No hit arrived inside the judgement window.
    Miss,
    /// Within one tolerance of the target time.
    Perfect,
    /// Late by 1–3 tolerances.
    LateGood,
    /// Early by 1–3 tolerances.
    EarlyGood,
    /// Late by 3–5 tolerances.
    LateBad,
    /// Early by 3–5 tolerances.
    EarlyBad,
    /// Late by more than 5 tolerances.
    LateFailed,
    /// Early by more than 5 tolerances.
    EarlyFailed,
    /// Perfect timing, wrong knock.
    PerfectWrong,
    /// Late good, wrong knock.
    LateGoodWrong,
    /// Early good, wrong knock.
    EarlyGoodWrong,
    /// Late bad, wrong knock.
    LateBadWrong,
    /// Early bad, wrong knock.
    EarlyBadWrong,
    /// Late failed, wrong knock.
    LateFailedWrong,
    /// Early failed, wrong knock.
    EarlyFailedWrong,
}

impl PerformanceGrade {
    /// All grades, in ladder order.
    pub const ALL: [PerformanceGrade; 15] = [
        PerformanceGrade::Miss,
        PerformanceGrade::LateFailed,
        PerformanceGrade::LateBad,
        PerformanceGrade::LateGood,
        PerformanceGrade::Perfect,
        PerformanceGrade::EarlyGood,
        PerformanceGrade::EarlyBad,
        PerformanceGrade::EarlyFailed,
        PerformanceGrade::LateFailedWrong,
        PerformanceGrade::LateBadWrong,
        PerformanceGrade::LateGoodWrong,
        PerformanceGrade::PerfectWrong,
        PerformanceGrade::EarlyGoodWrong,
        PerformanceGrade::EarlyBadWrong,
        PerformanceGrade::EarlyFailedWrong,
    ];

    /// Build a grade from a timing shift and a wrong-knock flag.
    /// `shift = None` is a miss regardless of `wrong`.
    pub fn from_parts(shift: Option<i32>, wrong: bool) -> Self {
        use PerformanceGrade::*;
        match (shift, wrong) {
            (None, _) => Miss,
            (Some(0), false) => Perfect,
            (Some(1), false) => LateGood,
            (Some(-1), false) => EarlyGood,
            (Some(2), false) => LateBad,
            (Some(-2), false) => EarlyBad,
            (Some(s), false) if s > 0 => LateFailed,
            (Some(_), false) => EarlyFailed,
            (Some(0), true) => PerfectWrong,
            (Some(1), true) => LateGoodWrong,
            (Some(-1), true) => EarlyGoodWrong,
            (Some(2), true) => LateBadWrong,
            (Some(-2), true) => EarlyBadWrong,
            (Some(s), true) if s > 0 => LateFailedWrong,
            (Some(_), true) => EarlyFailedWrong,
        }
    }

    /// The timing shift, or `None` for a miss.
    pub fn shift(&self) -> Option<i32> {
        use PerformanceGrade::*;
        match self {
            Miss => None,
            Perfect | PerfectWrong => Some(0),
            LateGood | LateGoodWrong => Some(1),
            EarlyGood | EarlyGoodWrong => Some(-1),
            LateBad | LateBadWrong => Some(2),
            EarlyBad | EarlyBadWrong => Some(-2),
            LateFailed | LateFailedWrong => Some(3),
            EarlyFailed | EarlyFailedWrong => Some(-3),
        }
    }

    /// Whether the wrong kind of knock was used.
    pub fn is_wrong(&self) -> bool {
        use PerformanceGrade::*;
        matches!(
            self,
            PerfectWrong
                | LateGoodWrong
                | EarlyGoodWrong
                | LateBadWrong
                | EarlyBadWrong
                | LateFailedWrong
                | EarlyFailedWrong
        )
    }

    /// True for [`PerformanceGrade::Miss`].
    pub fn is_miss(&self) -> bool {
        matches!(self, PerformanceGrade::Miss)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        use PerformanceGrade::*;
        match self {
            Miss => "Miss",
            Perfect => "Perfect",
            LateGood => "Late Good",
            EarlyGood => "Early Good",
            LateBad => "Late Bad",
            EarlyBad => "Early Bad",
            LateFailed => "Late Failed",
            EarlyFailed => "Early Failed",
            PerfectWrong => "Perfect but Wrong Key",
            LateGoodWrong => "Late Good but Wrong Key",
            EarlyGoodWrong => "Early Good but Wrong Key",
            LateBadWrong => "Late Bad but Wrong Key",
            EarlyBadWrong => "Early Bad but Wrong Key",
            LateFailedWrong => "Late Failed but Wrong Key",
            EarlyFailedWrong => "Early Failed but Wrong Key",
        }
    }
}

/// One judged hit: its grade, the target time, and the signed error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Performance {
    /// The grade awarded.
    pub grade: PerformanceGrade,
    /// The target time the hit was judged against.
    pub time: f64,
    /// `hit_time − target_time`, or `None` for a miss.
    pub err: Option<f64>,
}

impl Performance {
    /// Judge a hit against a target time.
    ///
    /// The shift is the smallest `i ∈ {0, 1, 2, 3}` with
    /// `|err| < tol·(2i+1)` (capped at 3), negated when the hit is early.
    /// A missing `hit_time` is a miss.
    pub fn judge(tol: f64, time: f64, hit_time: Option<f64>, is_correct_key: bool) -> Self {
        let Some(hit_time) = hit_time else {
            return Performance {
                grade: PerformanceGrade::Miss,
                time,
                err: None,
            };
        };

        let err = hit_time - time;
        let mut shift = (0..3)
            .find(|i| err.abs() < tol * f64::from(2 * i + 1))
            .unwrap_or(3);
        if err < 0.0 {
            shift = -shift;
        }

        Performance {
            grade: PerformanceGrade::from_parts(Some(shift), !is_correct_key),
            time,
            err: Some(err),
        }
    }

    /// The grade's timing shift.
    pub fn shift(&self) -> Option<i32> {
        self.grade.shift()
    }

    /// True when no hit arrived.
    pub fn is_miss(&self) -> bool {
        self.grade.is_miss()
    }
}
