//! Drift metrics for steady timers.
//!
//! Tracks how late each tick fired relative to its anchor, plus the
//! intervals absorbed by catch-up, in a ring buffer that needs no heap
//! allocation while recording.

use std::time::Duration;

/// Per-tick lateness histogram with skip accounting.
///
/// Lateness is the gap between a tick's anchor (the instant it was
/// nominally due) and the instant the firing handler observed. A healthy
/// timer keeps this within scheduler jitter; a stalled host shows up as
/// large lateness and a non-zero skip count.
#[derive(Debug)]
pub struct TickMetrics {
    /// Ring buffer of lateness samples in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples retained (saturates at buffer size).
    sample_count: usize,
    /// Total ticks delivered.
    total_ticks: u64,
    /// Minimum observed lateness in nanoseconds.
    min_ns: u64,
    /// Maximum observed lateness in nanoseconds.
    max_ns: u64,
    /// Sum of all lateness samples for mean calculation.
    sum_ns: u64,
    /// Interval boundaries skipped by catch-up.
    skipped_intervals: u64,
}

impl TickMetrics {
    /// Create a new collector retaining `histogram_size` samples.
    #[must_use]
    pub fn new(histogram_size: usize) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_ticks: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            skipped_intervals: 0,
        }
    }

    /// Record the lateness of one delivered tick.
    pub fn record_lateness(&mut self, lateness: Duration) {
        let ns = u64::try_from(lateness.as_nanos()).unwrap_or(u64::MAX);

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_ticks += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);
    }

    /// Record interval boundaries that catch-up skipped over for one tick.
    pub fn record_skipped(&mut self, intervals: u32) {
        self.skipped_intervals += u64::from(intervals);
    }

    /// Total ticks delivered.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Total interval boundaries absorbed by catch-up.
    #[must_use]
    pub fn skipped_intervals(&self) -> u64 {
        self.skipped_intervals
    }

    /// Minimum observed lateness.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Maximum observed lateness.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Mean lateness over all delivered ticks.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.total_ticks > 0).then(|| Duration::from_nanos(self.sum_ns / self.total_ticks))
    }

    /// Compute a lateness percentile from the retained samples.
    ///
    /// Returns `None` if no samples have been collected or if
    /// `percentile` is outside `0.0..=100.0`.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }
        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let populated = self.total_ticks > 0;
        MetricsSnapshot {
            total_ticks: self.total_ticks,
            min_ns: populated.then_some(self.min_ns),
            max_ns: populated.then_some(self.max_ns),
            mean_ns: populated.then_some(self.sum_ns / self.total_ticks.max(1)),
            skipped_intervals: self.skipped_intervals,
            sample_count: self.sample_count,
        }
    }

    /// Reset all metrics to initial state.
    pub fn reset(&mut self) {
        self.samples.fill(0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.total_ticks = 0;
        self.min_ns = u64::MAX;
        self.max_ns = 0;
        self.sum_ns = 0;
        self.skipped_intervals = 0;
    }
}

/// Immutable snapshot of drift metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total ticks delivered.
    pub total_ticks: u64,
    /// Minimum lateness in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum lateness in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean lateness in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Interval boundaries absorbed by catch-up.
    pub skipped_intervals: u64,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get jitter (max - min lateness) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_recording() {
        let mut metrics = TickMetrics::new(100);

        metrics.record_lateness(Duration::from_micros(500));
        metrics.record_lateness(Duration::from_micros(600));
        metrics.record_lateness(Duration::from_micros(550));

        assert_eq!(metrics.total_ticks(), 3);
        assert_eq!(metrics.min(), Some(Duration::from_micros(500)));
        assert_eq!(metrics.max(), Some(Duration::from_micros(600)));
        assert_eq!(metrics.mean(), Some(Duration::from_micros(550)));
    }

    #[test]
    fn test_skip_accounting() {
        let mut metrics = TickMetrics::new(100);

        metrics.record_lateness(Duration::from_millis(3_500));
        metrics.record_skipped(3);
        metrics.record_lateness(Duration::from_micros(200));

        assert_eq!(metrics.total_ticks(), 2);
        assert_eq!(metrics.skipped_intervals(), 3);
    }

    #[test]
    fn test_ring_buffer_wrapping() {
        let mut metrics = TickMetrics::new(10);

        for i in 0..25 {
            metrics.record_lateness(Duration::from_nanos(i * 1_000));
        }

        assert_eq!(metrics.total_ticks(), 25);
        assert_eq!(metrics.snapshot().sample_count, 10);
    }

    #[test]
    fn test_percentile_calculation() {
        let mut metrics = TickMetrics::new(100);

        for i in 1..=100 {
            metrics.record_lateness(Duration::from_micros(i));
        }

        let p50 = metrics.percentile(50.0).unwrap();
        assert!(p50.as_micros() >= 49 && p50.as_micros() <= 51);

        let p99 = metrics.percentile(99.0).unwrap();
        assert!(p99.as_micros() >= 98 && p99.as_micros() <= 100);
    }

    #[test]
    fn test_percentile_validation() {
        let mut metrics = TickMetrics::new(100);
        assert!(metrics.percentile(50.0).is_none());

        metrics.record_lateness(Duration::from_micros(1));
        assert!(metrics.percentile(0.0).is_some());
        assert!(metrics.percentile(100.0).is_some());
        assert!(metrics.percentile(-1.0).is_none());
        assert!(metrics.percentile(101.0).is_none());
        assert!(metrics.percentile(f64::NAN).is_none());
    }

    #[test]
    fn test_snapshot_jitter() {
        let mut metrics = TickMetrics::new(100);

        metrics.record_lateness(Duration::from_micros(400));
        metrics.record_lateness(Duration::from_micros(600));

        let snap = metrics.snapshot();
        assert_eq!(snap.total_ticks, 2);
        assert_eq!(snap.min_ns, Some(400_000));
        assert_eq!(snap.max_ns, Some(600_000));
        assert_eq!(snap.jitter_ns(), Some(200_000));
    }

    #[test]
    fn test_reset() {
        let mut metrics = TickMetrics::new(100);

        metrics.record_lateness(Duration::from_micros(500));
        metrics.record_skipped(2);

        metrics.reset();

        assert_eq!(metrics.total_ticks(), 0);
        assert_eq!(metrics.skipped_intervals(), 0);
        assert!(metrics.min().is_none());
        assert!(metrics.snapshot().jitter_ns().is_none());
    }
}
