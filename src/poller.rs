//! Fixed-interval price poller
//!
//! Drives one [`PriceSource`] on a timer and routes every cycle's outcome to a
//! [`ReportSink`].
//!
//! ## Cycle policy
//!
//! Every failure (missing data, stale data, transport or decode errors, a
//! fetch exceeding `fetch_timeout`, even a panic inside the source) ends the
//! current cycle with a diagnostic report. Nothing stops the loop except
//! [`PollerHandle::stop`].
//!
//! With `PollerConfig::step` set, every ok report also carries the step
//! movement since the previous ok cycle. Failed cycles leave the tracker
//! untouched.
//!
//! Cycles never overlap: a single task runs them back to back and ticks that
//! fire while a cycle is still in flight are skipped.
//!
//! ```no_run
//! use sol_price_feed::{
//!     config::{HermesSourceConfig, PollerConfig},
//!     sink::{ConsoleSink, ReportFormat},
//!     sources::HermesSource,
//!     Poller,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = HermesSource::new(HermesSourceConfig::default())?;
//! let sink = ConsoleSink::stdout(ReportFormat::Pretty);
//! let handle = Poller::new(Arc::new(source), Arc::new(sink), PollerConfig::default()).start();
//!
//! tokio::signal::ctrl_c().await?;
//! let metrics = handle.stop().await;
//! println!("{} cycles, {:.1}% ok", metrics.total_cycles, metrics.success_rate * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::{PollerConfig, StartPolicy},
    error::SourceError,
    metrics::{MetricsCollector, PollerMetrics},
    movement::{PriceMovement, StepTracker},
    sink::ReportSink,
    source::PriceSource,
    types::PriceReport,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

/// Polls one source at a fixed interval
pub struct Poller {
    source: Arc<dyn PriceSource>,
    sink: Arc<dyn ReportSink>,
    config: PollerConfig,
    metrics: Arc<MetricsCollector>,
    tracker: Mutex<Option<StepTracker>>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn PriceSource>,
        sink: Arc<dyn ReportSink>,
        config: PollerConfig,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new(source.source_name()));
        Self {
            source,
            sink,
            config,
            metrics,
            tracker: Mutex::new(None),
        }
    }

    /// Runs a single fetch → validate → emit cycle
    ///
    /// Never fails: every error becomes a diagnostic report, which is emitted
    /// to the sink and returned.
    pub async fn poll_once(&self) -> PriceReport {
        let start = Instant::now();
        let source_name = self.source.source_name();

        let fetch = AssertUnwindSafe(self.source.fetch()).catch_unwind();
        let result = match timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(SourceError::Panicked(panic_message(&*panic))),
            Err(_) => Err(SourceError::Timeout),
        };

        let latency = start.elapsed();
        let movement = match &result {
            Ok(observation) => self.track_movement(observation.price).await,
            Err(_) => None,
        };
        let report = PriceReport::from_result(source_name, &result).with_movement(movement);

        match &result {
            Ok(observation) => tracing::debug!(
                source = source_name,
                price = observation.price,
                steps = movement.map(|m| m.steps),
                latency_ms = latency.as_millis() as u64,
                "Fetched price"
            ),
            Err(e) => tracing::warn!(
                source = source_name,
                status = report.status.as_str(),
                error = %e,
                latency_ms = latency.as_millis() as u64,
                "Poll cycle produced no price"
            ),
        }

        self.metrics.record_cycle(latency, report.status).await;
        self.sink.emit(&report);
        report
    }

    async fn track_movement(&self, price: f64) -> Option<PriceMovement> {
        let step = self.config.step?;
        let mut tracker = self.tracker.lock().await;
        if let Some(tracker) = tracker.as_mut() {
            return Some(tracker.update(price));
        }
        let started = StepTracker::new(price, step);
        let movement = started.current();
        *tracker = Some(started);
        Some(movement)
    }

    /// Current cycle metrics
    pub async fn metrics(&self) -> PollerMetrics {
        self.metrics.get_metrics().await
    }

    /// Spawns the poll loop on the current tokio runtime
    ///
    /// The loop runs until [`PollerHandle::stop`] is called or the handle is
    /// dropped.
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = self.metrics.clone();
        let task = tokio::spawn(self.run(shutdown_rx));

        PollerHandle {
            shutdown: shutdown_tx,
            task,
            metrics,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let first_tick = match self.config.start {
            StartPolicy::Immediate => Instant::now(),
            StartPolicy::AfterInterval => Instant::now() + self.config.interval,
        };
        let mut ticker = interval_at(first_tick, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            source = self.source.source_name(),
            interval_ms = self.config.interval.as_millis() as u64,
            fetch_timeout_ms = self.config.fetch_timeout.as_millis() as u64,
            "Starting price poller"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            // A stop request cancels the in-flight cycle
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = self.poll_once() => {}
            }
        }

        tracing::info!(source = self.source.source_name(), "Price poller stopped");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to a running poller
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    metrics: Arc<MetricsCollector>,
}

impl PollerHandle {
    /// Stops the loop, waits for it to exit and returns the final metrics
    pub async fn stop(self) -> PollerMetrics {
        // The loop may already be gone; nothing to signal then
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Price poller task failed");
        }
        self.metrics.get_metrics().await
    }

    /// Metrics so far, without stopping the loop
    pub async fn metrics(&self) -> PollerMetrics {
        self.metrics.get_metrics().await
    }

    /// True once the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::StepConfig;
    use crate::sink::MemorySink;
    use crate::source::mock::{MockSource, MockStep};
    use crate::types::ReportStatus;
    use std::time::Duration;

    fn config(interval_ms: u64) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(interval_ms),
            ..PollerConfig::default()
        }
    }

    fn poller(source: Arc<MockSource>, sink: Arc<MemorySink>, config: PollerConfig) -> Poller {
        Poller::new(source, sink, config)
    }

    #[tokio::test]
    async fn test_poll_once_emits_price() {
        let source = Arc::new(MockSource::new(MockStep::Price(142.37)));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(source.clone(), sink.clone(), config(1000));

        let report = poller.poll_once().await;

        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.price, Some(142.37));
        assert_eq!(report.source, "mock");
        assert_eq!(sink.reports(), vec![report]);
    }

    #[tokio::test]
    async fn test_failed_cycle_emits_no_price() {
        let source = Arc::new(MockSource::new(MockStep::Stale { age_secs: 90 }));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(source, sink.clone(), config(1000));

        let report = poller.poll_once().await;

        assert_eq!(report.status, ReportStatus::Stale);
        assert_eq!(report.price, None);
        assert_eq!(sink.reports()[0].price, None);
    }

    #[tokio::test]
    async fn test_panicking_source_is_contained() {
        let source = Arc::new(MockSource::new(MockStep::Panic));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(source, sink, config(1000));

        let report = poller.poll_once().await;

        assert_eq!(report.status, ReportStatus::Error);
        assert_eq!(
            report.detail.as_deref(),
            Some("source panicked: mock source exploded")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let source =
            Arc::new(MockSource::new(MockStep::Price(1.0)).with_delay(Duration::from_secs(5)));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(
            source,
            sink,
            PollerConfig {
                fetch_timeout: Duration::from_secs(1),
                ..config(1000)
            },
        );

        let report = poller.poll_once().await;

        assert_eq!(report.status, ReportStatus::Error);
        assert_eq!(report.detail.as_deref(), Some("Request timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_consecutive_failures() {
        let source = Arc::new(
            MockSource::new(MockStep::Price(142.37)).with_steps([
                MockStep::Http(500),
                MockStep::Http(502),
                MockStep::Http(503),
                MockStep::Panic,
                MockStep::Unavailable("price account not found"),
            ]),
        );
        let sink = Arc::new(MemorySink::new());
        let handle = poller(source.clone(), sink.clone(), config(1000)).start();

        tokio::time::sleep(Duration::from_millis(5500)).await;
        let metrics = handle.stop().await;

        let statuses: Vec<_> = sink.reports().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ReportStatus::Error,
                ReportStatus::Error,
                ReportStatus::Error,
                ReportStatus::Error,
                ReportStatus::Unavailable,
                ReportStatus::Ok,
            ]
        );
        assert_eq!(sink.reports().last().unwrap().price, Some(142.37));
        assert_eq!(metrics.total_cycles, 6);
        assert_eq!(metrics.error_cycles, 4);
        assert_eq!(metrics.unavailable_cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycles_never_overlap() {
        let source = Arc::new(
            MockSource::new(MockStep::Price(1.0)).with_delay(Duration::from_millis(2500)),
        );
        let sink = Arc::new(MemorySink::new());
        let handle = poller(source.clone(), sink.clone(), config(1000)).start();

        tokio::time::sleep(Duration::from_secs(9)).await;
        handle.stop().await;

        assert_eq!(source.max_in_flight(), 1);
        assert!(source.call_count() < 9);
        assert!(sink.reports().iter().all(|r| r.is_ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_the_loop() {
        let source = Arc::new(MockSource::new(MockStep::Price(1.0)));
        let sink = Arc::new(MemorySink::new());
        let handle = poller(source.clone(), sink.clone(), config(1000)).start();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.stop().await;
        let calls = source.call_count();
        assert_eq!(calls, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.call_count(), calls);
        assert_eq!(sink.reports().len(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_live_metrics() {
        let source = Arc::new(MockSource::new(MockStep::Price(1.0)));
        let sink = Arc::new(MemorySink::new());
        let handle = poller(source, sink, config(1000)).start();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let metrics = handle.metrics().await;
        assert_eq!(metrics.total_cycles, 2);
        assert!(!handle.is_finished());

        let final_metrics = handle.stop().await;
        assert!(final_metrics.total_cycles >= metrics.total_cycles);
    }

    #[tokio::test]
    async fn test_dropped_handle_ends_the_loop() {
        let source = Arc::new(MockSource::new(MockStep::Price(1.0)));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(source, sink, config(1000));
        let metrics = poller.metrics.clone();
        let handle = poller.start();

        let PollerHandle { shutdown, task, .. } = handle;
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(metrics.get_metrics().await.total_cycles <= 1);
    }

    #[tokio::test]
    async fn test_ok_cycles_carry_step_movement() {
        let source = Arc::new(MockSource::new(MockStep::Price(100.0)).with_steps([
            MockStep::Price(100.0),
            MockStep::Http(500),
            MockStep::Price(100.12),
        ]));
        let sink = Arc::new(MemorySink::new());
        let poller = poller(
            source,
            sink.clone(),
            PollerConfig {
                step: Some(StepConfig::fixed_usd(0.05)),
                ..config(1000)
            },
        );

        let first = poller.poll_once().await;
        let failed = poller.poll_once().await;
        let moved = poller.poll_once().await;

        assert_eq!(first.movement.map(|m| m.steps), Some(0));
        assert!(failed.movement.is_none());
        let moved = moved.movement.unwrap();
        assert_eq!(moved.steps, 2);
        assert_eq!(moved.index, 2);
        assert_eq!(moved.up_streak, 2);
    }

    #[tokio::test]
    async fn test_no_movement_without_step_config() {
        let source = Arc::new(MockSource::new(MockStep::Price(100.0)));
        let sink = Arc::new(MemorySink::new());
        let report = poller(source, sink, config(1000)).poll_once().await;
        assert!(report.movement.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_interval_start_policy() {
        let source = Arc::new(MockSource::new(MockStep::Price(1.0)));
        let sink = Arc::new(MemorySink::new());
        let handle = poller(
            source.clone(),
            sink,
            PollerConfig {
                start: StartPolicy::AfterInterval,
                ..config(1000)
            },
        )
        .start();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.call_count(), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(source.call_count(), 1);

        handle.stop().await;
    }
}
