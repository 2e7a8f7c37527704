//! Frame statistics: sample accumulation, summaries, and derived metrics.
//!
//! Samples are inter-frame deltas in milliseconds. The percentile scheme is
//! nearest-rank over the sorted samples with index `floor(p * (n - 1))`,
//! clamped to the valid range; existing captures depend on these exact
//! values, so the formula is not negotiable.

use serde::{Deserialize, Serialize};

/// Refresh-interval candidates (ms) for 120 / 90 / 72 / 60 Hz displays.
///
/// `target_ms` in [`Extras`] is the candidate nearest to the p50 frame time;
/// ties resolve to the earlier entry.
pub const TARGET_CANDIDATES_MS: [f64; 4] = [
    1000.0 / 120.0,
    1000.0 / 90.0,
    1000.0 / 72.0,
    1000.0 / 60.0,
];

/// Calculate the arithmetic mean of a slice of values
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Nearest-rank percentile over a pre-sorted slice.
///
/// `p` is a fraction in [0, 1]. Returns 0.0 for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p * (sorted.len() - 1) as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Per-trial summary of one cadence series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of collected samples (inter-frame deltas). The first frame in
    /// a window opens the stream and contributes no delta.
    pub frames: u64,
    /// Span between the window-open and window-close marks.
    pub duration_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl Summary {
    pub fn empty() -> Self {
        Self {
            frames: 0,
            duration_ms: 0.0,
            mean_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
        }
    }
}

/// Derived metrics attached next to every trial [`Summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extras {
    /// frames / duration, in frames per second.
    pub fps_effective: f64,
    /// 1000 / mean frame time.
    pub fps_from_mean: f64,
    /// Matched refresh interval from [`TARGET_CANDIDATES_MS`].
    pub target_ms: f64,
    /// Samples strictly above 1.5x the matched target.
    #[serde(rename = "missed_1.5x")]
    pub missed_1_5x: u64,
    /// Samples strictly above 2x the matched target.
    pub missed_2x: u64,
    #[serde(rename = "missed_1.5x_pct")]
    pub missed_1_5x_pct: f64,
    pub max_frame_ms: f64,
    /// p99 / p50; 0 when p50 is 0.
    pub jank_p99_over_p50: f64,
}

/// Accumulates inter-frame deltas for one measurement window.
#[derive(Debug, Default, Clone)]
pub struct SampleSeries {
    samples: Vec<f64>,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delta. Non-finite and negative deltas are discarded;
    /// environment timestamps are not guaranteed monotonic across pauses.
    pub fn push(&mut self, delta_ms: f64) {
        if delta_ms.is_finite() && delta_ms >= 0.0 {
            self.samples.push(delta_ms);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Summarize the window spanning `start_mark_ms..end_mark_ms`.
    pub fn summarize(&self, start_mark_ms: f64, end_mark_ms: f64) -> Summary {
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Summary {
            frames: self.samples.len() as u64,
            duration_ms: (end_mark_ms - start_mark_ms).max(0.0),
            mean_ms: mean(&self.samples),
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        }
    }
}

/// Pick the refresh-interval candidate nearest to `p50_ms`.
pub fn match_target_ms(p50_ms: f64) -> f64 {
    let mut best = TARGET_CANDIDATES_MS[0];
    let mut best_dist = (p50_ms - best).abs();
    for &candidate in &TARGET_CANDIDATES_MS[1..] {
        let dist = (p50_ms - candidate).abs();
        if dist < best_dist {
            best = candidate;
            best_dist = dist;
        }
    }
    best
}

/// Derive the extras block from a summary and its raw samples.
///
/// Every ratio guards its denominator: zero frames, zero duration, or a zero
/// mean all yield 0 rather than NaN or infinity.
pub fn derive_extras(summary: &Summary, samples: &[f64]) -> Extras {
    let fps_effective = if summary.duration_ms > 0.0 {
        summary.frames as f64 / (summary.duration_ms / 1000.0)
    } else {
        0.0
    };
    let fps_from_mean = if summary.mean_ms > 0.0 {
        1000.0 / summary.mean_ms
    } else {
        0.0
    };

    let target_ms = match_target_ms(summary.p50_ms);
    let missed_1_5x = samples.iter().filter(|&&s| s > target_ms * 1.5).count() as u64;
    let missed_2x = samples.iter().filter(|&&s| s > target_ms * 2.0).count() as u64;
    let missed_1_5x_pct = if summary.frames > 0 {
        missed_1_5x as f64 / summary.frames as f64 * 100.0
    } else {
        0.0
    };

    let max_frame_ms = samples.iter().cloned().fold(0.0_f64, f64::max);
    let jank_p99_over_p50 = if summary.p50_ms > 0.0 {
        summary.p99_ms / summary.p50_ms
    } else {
        0.0
    };

    Extras {
        fps_effective,
        fps_from_mean,
        target_ms,
        missed_1_5x,
        missed_2x,
        missed_1_5x_pct,
        max_frame_ms,
        jank_p99_over_p50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(mean(&values), 3.0);

        let empty: Vec<f64> = vec![];
        assert_eq!(mean(&empty), 0.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let sorted = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        // floor(0.5 * 4) = 2
        assert_eq!(percentile(&sorted, 0.50), 30.0);
        // floor(0.95 * 4) = 3
        assert_eq!(percentile(&sorted, 0.95), 40.0);
        // floor(0.99 * 4) = 3
        assert_eq!(percentile(&sorted, 0.99), 40.0);
        assert_eq!(percentile(&sorted, 1.0), 50.0);
        assert_eq!(percentile(&sorted, 0.0), 10.0);
    }

    #[test]
    fn test_percentile_single_sample() {
        let sorted = vec![16.7];
        assert_eq!(percentile(&sorted, 0.50), 16.7);
        assert_eq!(percentile(&sorted, 0.99), 16.7);
    }

    #[test]
    fn test_percentile_empty() {
        let empty: Vec<f64> = vec![];
        assert_eq!(percentile(&empty, 0.50), 0.0);
    }

    #[test]
    fn test_series_discards_bad_deltas() {
        let mut series = SampleSeries::new();
        series.push(16.7);
        series.push(-4.0);
        series.push(f64::NAN);
        series.push(f64::INFINITY);
        series.push(0.0);
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples(), &[16.7, 0.0]);
    }

    #[test]
    fn test_summarize_three_samples() {
        // 60 Hz-ish trial with one dropped frame.
        let mut series = SampleSeries::new();
        for &s in &[16.0, 33.4, 16.7] {
            series.push(s);
        }
        let summary = series.summarize(1000.0, 1066.1);

        assert_eq!(summary.frames, 3);
        assert!((summary.duration_ms - 66.1).abs() < 1e-9);
        // sorted: [16.0, 16.7, 33.4]; p50 idx floor(0.5*2)=1
        assert!((summary.p50_ms - 16.7).abs() < 1e-9);
        // p95 and p99 idx floor(0.95*2)=1, floor(0.99*2)=1
        assert!((summary.p95_ms - 16.7).abs() < 1e-9);
        assert!((summary.p99_ms - 16.7).abs() < 1e-9);
        assert!((summary.mean_ms - 22.033333).abs() < 1e-4);
    }

    #[test]
    fn test_extras_sixty_hz_with_spike() {
        let samples = vec![16.0, 33.4, 16.7];
        let mut series = SampleSeries::new();
        for &s in &samples {
            series.push(s);
        }
        let summary = series.summarize(0.0, 66.1);
        let extras = derive_extras(&summary, &samples);

        // p50 = 16.7 matches the 60 Hz interval.
        assert!((extras.target_ms - 1000.0 / 60.0).abs() < 1e-9);
        // 1.5x target = 25.0: only 33.4 exceeds it.
        assert_eq!(extras.missed_1_5x, 1);
        // 2x target = 33.33...: 33.4 is strictly above.
        assert_eq!(extras.missed_2x, 1);
        assert!((extras.missed_1_5x_pct - 100.0 / 3.0).abs() < 1e-6);
        assert!((extras.max_frame_ms - 33.4).abs() < 1e-9);
        assert!(extras.jank_p99_over_p50 > 0.0);
    }

    #[test]
    fn test_extras_target_tie_prefers_earlier_candidate() {
        // Midpoint between the 120 Hz and 90 Hz intervals.
        let p50 = (1000.0 / 120.0 + 1000.0 / 90.0) / 2.0;
        assert_eq!(match_target_ms(p50), 1000.0 / 120.0);
    }

    #[test]
    fn test_extras_boundary_samples_not_missed() {
        // Samples exactly at 1.5x / 2x the target are not misses.
        let target = 1000.0 / 60.0;
        let samples = vec![target, target * 1.5, target * 2.0];
        let mut series = SampleSeries::new();
        for &s in &samples {
            series.push(s);
        }
        // p50 = 25ms, still nearest the 60 Hz interval.
        let summary = series.summarize(0.0, 100.0);
        let extras = derive_extras(&summary, &samples);
        assert_eq!(extras.target_ms, target);

        // target*1.5 sits exactly on the 1.5x line; only target*2 crosses it.
        assert_eq!(extras.missed_1_5x, 1);
        // target*2 sits exactly on the 2x line.
        assert_eq!(extras.missed_2x, 0);
    }

    #[test]
    fn test_summary_invariants_across_sample_sets() {
        // Every non-empty set, whatever its shape, must satisfy the ordering
        // p50 <= p95 <= p99, keep the mean inside [min, max], and count no
        // more 2x misses than 1.5x misses.
        let mut sets: Vec<Vec<f64>> = vec![
            vec![16.7],
            vec![33.4, 8.3],
            vec![16.0, 33.4, 16.7],
        ];

        let mut state = crate::plan::GOLDEN_SEED;
        for &n in &[8usize, 64, 499, 1000] {
            let mut samples = Vec::with_capacity(n);
            for _ in 0..n {
                state = crate::plan::mix32(state);
                let unit = (state % 10_000) as f64 / 10_000.0;
                // 4..36ms spread, with spikes past 2x every target interval.
                let spike = if state % 7 == 0 { 40.0 } else { 0.0 };
                samples.push(4.0 + unit * 32.0 + spike);
            }
            sets.push(samples);
        }

        for samples in &sets {
            let n = samples.len();
            let mut series = SampleSeries::new();
            for &s in samples {
                series.push(s);
            }
            let summary = series.summarize(0.0, samples.iter().sum());
            let extras = derive_extras(&summary, series.samples());

            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

            assert_eq!(summary.frames, n as u64);
            assert!(summary.p50_ms <= summary.p95_ms, "p50 > p95 at n = {}", n);
            assert!(summary.p95_ms <= summary.p99_ms, "p95 > p99 at n = {}", n);
            assert!(
                summary.mean_ms >= min && summary.mean_ms <= max,
                "mean {} outside [{}, {}] at n = {}",
                summary.mean_ms,
                min,
                max,
                n
            );
            assert!(
                extras.missed_2x <= extras.missed_1_5x,
                "missed_2x {} > missed_1.5x {} at n = {}",
                extras.missed_2x,
                extras.missed_1_5x,
                n
            );
        }
    }

    #[test]
    fn test_extras_zero_samples_all_zero() {
        let summary = Summary::empty();
        let extras = derive_extras(&summary, &[]);
        assert_eq!(extras.fps_effective, 0.0);
        assert_eq!(extras.fps_from_mean, 0.0);
        assert_eq!(extras.missed_1_5x, 0);
        assert_eq!(extras.missed_2x, 0);
        assert_eq!(extras.missed_1_5x_pct, 0.0);
        assert_eq!(extras.max_frame_ms, 0.0);
        assert_eq!(extras.jank_p99_over_p50, 0.0);
    }

    #[test]
    fn test_wire_names_for_missed_fields() {
        let extras = derive_extras(&Summary::empty(), &[]);
        let json = serde_json::to_value(&extras).unwrap();
        assert!(json.get("missed_1.5x").is_some());
        assert!(json.get("missed_1.5x_pct").is_some());
        assert!(json.get("missed_2x").is_some());
        assert!(json.get("missed_1_5x").is_none());
    }
}
