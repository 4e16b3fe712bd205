//! Post-game performance analysis.

use crate::judge::{Performance, PerformanceGrade};

/// Aggregated statistics over a game's judged hits.
#[derive(Debug, Clone)]
pub struct Analysis {
    tolerance: f64,
    counts: Vec<(PerformanceGrade, usize)>,
    total: usize,
    misses: usize,
    mean_err: Option<f64>,
    stdev_err: Option<f64>,
    histogram: Vec<usize>,
}

/// Number of histogram bins; one per tolerance step over `±7·tol`.
const HIST_BINS: usize = 14;

impl Analysis {
    /// Summarise `perfs` judged at `tolerance`.
    pub fn new(tolerance: f64, perfs: &[Performance]) -> Self {
        let mut counts: Vec<(PerformanceGrade, usize)> = PerformanceGrade::ALL
            .iter()
            .map(|&grade| (grade, 0))
            .collect();
        for perf in perfs {
            if let Some(entry) = counts.iter_mut().find(|(g, _)| *g == perf.grade) {
                entry.1 += 1;
            }
        }

        let errs: Vec<f64> = perfs.iter().filter_map(|p| p.err).collect();
        let mean_err = if errs.is_empty() {
            None
        } else {
            Some(errs.iter().sum::<f64>() / errs.len() as f64)
        };
        let stdev_err = mean_err.map(|mean| {
            let var = errs.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / errs.len() as f64;
            var.sqrt()
        });

        let mut histogram = vec![0usize; HIST_BINS];
        let span = tolerance * 7.0;
        for err in &errs {
            let pos = (err + span) / (2.0 * span) * HIST_BINS as f64;
            let bin = (pos.floor() as isize).clamp(0, HIST_BINS as isize - 1) as usize;
            histogram[bin] += 1;
        }

        Self {
            tolerance,
            counts,
            total: perfs.len(),
            misses: perfs.iter().filter(|p| p.is_miss()).count(),
            mean_err,
            stdev_err,
            histogram,
        }
    }

    /// Number of judged hits.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Count for a specific grade.
    pub fn count_of(&self, grade: PerformanceGrade) -> usize {
        self.counts
            .iter()
            .find(|(g, _)| *g == grade)
            .map_or(0, |(_, n)| *n)
    }

    /// Mean signed error over non-miss hits, in seconds.
    pub fn mean_err(&self) -> Option<f64> {
        self.mean_err
    }

    /// Standard deviation of the error over non-miss hits, in seconds.
    pub fn stdev_err(&self) -> Option<f64> {
        self.stdev_err
    }

    /// Render the analysis as printable lines.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let width = self
            .counts
            .iter()
            .map(|(g, _)| g.description().len())
            .max()
            .unwrap_or(0);
        for &(grade, count) in &self.counts {
            if count == 0 {
                continue;
            }
            out.push_str(&format!(
                "  {:width$}  {:>4}\n",
                grade.description(),
                count,
                width = width
            ));
        }

        out.push_str(&format!("  {:width$}  {:>4}\n", "total", self.total, width = width));

        if let (Some(mean), Some(stdev)) = (self.mean_err, self.stdev_err) {
            out.push_str(&format!(
                "  error: {:+.1} ms ± {:.1} ms\n",
                mean * 1000.0,
                stdev * 1000.0
            ));
        }

        if self.histogram.iter().any(|&n| n > 0) {
            let peak = self.histogram.iter().copied().max().unwrap_or(1).max(1);
            out.push_str(&format!(
                "  error distribution ({:.0} ms per bin, early → late):\n  ",
                self.tolerance * 1000.0
            ));
            const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
            for &n in &self.histogram {
                let level = if n == 0 { 0 } else { 1 + n * 7 / peak };
                out.push(BARS[level.min(8)]);
            }
            out.push('\n');
        }

        out
    }
}
