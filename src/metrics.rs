//! Poll cycle metrics
//!
//! Tracks cycle latency percentiles and outcome counts for one poller.

use crate::types::ReportStatus;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::RwLock;

/// Maximum number of samples to keep for latency calculation
const MAX_SAMPLES: usize = 100;

/// Snapshot of a poller's metrics
#[derive(Debug, Clone, PartialEq)]
pub struct PollerMetrics {
    /// Name of the polled source
    pub source_name: String,
    /// 50th percentile latency of successful cycles in milliseconds
    pub latency_p50_ms: f64,
    /// 99th percentile latency of successful cycles in milliseconds
    pub latency_p99_ms: f64,
    /// Share of cycles that emitted a price (0.0 to 1.0)
    pub success_rate: f64,
    pub total_cycles: u64,
    pub unavailable_cycles: u64,
    pub stale_cycles: u64,
    pub error_cycles: u64,
}

impl PollerMetrics {
    /// Creates metrics with no data
    pub fn empty(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            latency_p50_ms: 0.0,
            latency_p99_ms: 0.0,
            success_rate: 1.0,
            total_cycles: 0,
            unavailable_cycles: 0,
            stale_cycles: 0,
            error_cycles: 0,
        }
    }

    /// Cycles that did not emit a price
    pub fn failed_cycles(&self) -> u64 {
        self.unavailable_cycles + self.stale_cycles + self.error_cycles
    }
}

#[derive(Debug, Clone)]
struct LatencySample {
    duration_ms: f64,
    success: bool,
}

#[derive(Debug, Default)]
struct Counters {
    samples: VecDeque<LatencySample>,
    total: u64,
    unavailable: u64,
    stale: u64,
    error: u64,
}

/// Collects cycle outcomes for one poller
pub struct MetricsCollector {
    source_name: String,
    counters: RwLock<Counters>,
}

impl MetricsCollector {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            counters: RwLock::new(Counters {
                samples: VecDeque::with_capacity(MAX_SAMPLES),
                ..Counters::default()
            }),
        }
    }

    /// Records one cycle with its duration and outcome
    pub async fn record_cycle(&self, duration: Duration, status: ReportStatus) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        match status {
            ReportStatus::Ok => {}
            ReportStatus::Unavailable => counters.unavailable += 1,
            ReportStatus::Stale => counters.stale += 1,
            ReportStatus::Error => counters.error += 1,
        }

        if counters.samples.len() >= MAX_SAMPLES {
            counters.samples.pop_front();
        }
        counters.samples.push_back(LatencySample {
            duration_ms: duration.as_secs_f64() * 1000.0,
            success: status == ReportStatus::Ok,
        });
    }

    /// Computes current metrics from collected samples
    pub async fn get_metrics(&self) -> PollerMetrics {
        let counters = self.counters.read().await;
        if counters.total == 0 {
            return PollerMetrics::empty(&self.source_name);
        }

        let mut latencies: Vec<f64> = counters
            .samples
            .iter()
            .filter(|s| s.success)
            .map(|s| s.duration_ms)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let failed = counters.unavailable + counters.stale + counters.error;

        PollerMetrics {
            source_name: self.source_name.clone(),
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            success_rate: (counters.total - failed) as f64 / counters.total as f64,
            total_cycles: counters.total,
            unavailable_cycles: counters.unavailable,
            stale_cycles: counters.stale,
            error_cycles: counters.error,
        }
    }
}

/// Calculate percentile from sorted values
fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_collector() {
        let collector = MetricsCollector::new("test");

        collector
            .record_cycle(Duration::from_millis(100), ReportStatus::Ok)
            .await;
        collector
            .record_cycle(Duration::from_millis(200), ReportStatus::Ok)
            .await;
        collector
            .record_cycle(Duration::from_millis(150), ReportStatus::Stale)
            .await;

        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.source_name, "test");
        assert_eq!(metrics.total_cycles, 3);
        assert_eq!(metrics.stale_cycles, 1);
        assert_eq!(metrics.failed_cycles(), 1);
        assert!(metrics.success_rate > 0.6 && metrics.success_rate < 0.7);
        assert_eq!(metrics.latency_p99_ms, 200.0);
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let collector = MetricsCollector::new("test");
        for _ in 0..(MAX_SAMPLES + 20) {
            collector
                .record_cycle(Duration::from_millis(5), ReportStatus::Error)
                .await;
        }
        let counters = collector.counters.read().await;
        assert_eq!(counters.samples.len(), MAX_SAMPLES);
        assert_eq!(counters.total, (MAX_SAMPLES + 20) as u64);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(percentile(&values, 50.0), 5.0);
        assert_eq!(percentile(&values, 99.0), 9.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
