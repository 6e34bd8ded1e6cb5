//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention. All
//! counter updates are lock-free; reporting is the only operation that
//! needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally - these are
//! statistical counters only. Do NOT use them for coordination or logic
//! decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Counters for the analysis hot paths
#[derive(Default)]
pub struct Metrics {
    pings_evaluated: AtomicU64,
    entry_alerts: AtomicU64,
    exit_alerts: AtomicU64,
    behavior_events: AtomicU64,
    windows_scored: AtomicU64,
    evaluate_latency_sum_us: AtomicU64,
    evaluate_latency_max_us: AtomicU64,
}

/// Snapshot captured by `report`, consumed by logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pings_evaluated: u64,
    pub entry_alerts: u64,
    pub exit_alerts: u64,
    pub behavior_events: u64,
    pub windows_scored: u64,
    pub evaluate_latency_avg_us: u64,
    pub evaluate_latency_max_us: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_ping(&self, latency_us: u64) {
        self.pings_evaluated.fetch_add(1, Ordering::Relaxed);
        self.evaluate_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.evaluate_latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_entry_alert(&self) {
        self.entry_alerts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exit_alert(&self) {
        self.exit_alerts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_behavior_events(&self, count: u64) {
        self.behavior_events.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_window_scored(&self) {
        self.windows_scored.fetch_add(1, Ordering::Relaxed);
    }

    /// Swap all counters to zero and log the interval snapshot
    pub fn report(&self) -> MetricsSnapshot {
        let pings = self.pings_evaluated.swap(0, Ordering::Relaxed);
        let latency_sum = self.evaluate_latency_sum_us.swap(0, Ordering::Relaxed);
        let snapshot = MetricsSnapshot {
            pings_evaluated: pings,
            entry_alerts: self.entry_alerts.swap(0, Ordering::Relaxed),
            exit_alerts: self.exit_alerts.swap(0, Ordering::Relaxed),
            behavior_events: self.behavior_events.swap(0, Ordering::Relaxed),
            windows_scored: self.windows_scored.swap(0, Ordering::Relaxed),
            evaluate_latency_avg_us: if pings > 0 { latency_sum / pings } else { 0 },
            evaluate_latency_max_us: self.evaluate_latency_max_us.swap(0, Ordering::Relaxed),
        };

        info!(
            pings = %snapshot.pings_evaluated,
            entries = %snapshot.entry_alerts,
            exits = %snapshot.exit_alerts,
            behavior_events = %snapshot.behavior_events,
            windows = %snapshot.windows_scored,
            eval_avg_us = %snapshot.evaluate_latency_avg_us,
            eval_max_us = %snapshot.evaluate_latency_max_us,
            "metrics_report"
        );

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_and_reset() {
        let metrics = Metrics::new();
        metrics.record_ping(100);
        metrics.record_ping(300);
        metrics.record_entry_alert();
        metrics.record_exit_alert();
        metrics.record_behavior_events(5);
        metrics.record_window_scored();

        let snapshot = metrics.report();
        assert_eq!(snapshot.pings_evaluated, 2);
        assert_eq!(snapshot.entry_alerts, 1);
        assert_eq!(snapshot.exit_alerts, 1);
        assert_eq!(snapshot.behavior_events, 5);
        assert_eq!(snapshot.windows_scored, 1);
        assert_eq!(snapshot.evaluate_latency_avg_us, 200);
        assert_eq!(snapshot.evaluate_latency_max_us, 300);

        // Report swaps everything back to zero
        let empty = metrics.report();
        assert_eq!(empty.pings_evaluated, 0);
        assert_eq!(empty.evaluate_latency_max_us, 0);
    }

    #[test]
    fn test_atomic_max_keeps_largest() {
        let max = AtomicU64::new(0);
        update_atomic_max(&max, 50);
        update_atomic_max(&max, 20);
        update_atomic_max(&max, 80);
        assert_eq!(max.load(Ordering::Relaxed), 80);
    }
}
