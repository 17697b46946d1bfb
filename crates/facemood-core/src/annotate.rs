//! The annotation and classification loop.
//!
//! Every tick samples the capture source, runs the estimator, redraws the
//! overlay with every returned keypoint and classifies the first face. Ticks
//! are scheduled on a fixed interval and never wait for each other unless
//! [`OverlapPolicy::Serialized`] is selected.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::classify::{ClassifierThresholds, EmotionClassifier};
use crate::domain::EmotionLabel;
use crate::label::{LabelState, UnmatchedPolicy};
use crate::ports::{
    CaptureSource, LandmarkEstimator, NullSink, OverlaySurface, SkipReason, TickEvent, TickReport,
    TickSink,
};

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Whether ticks may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Every tick runs, even while earlier ones are still estimating. Overlay
    /// and label writes from overlapping ticks land in completion order.
    #[default]
    Concurrent,
    /// At most one tick estimates at a time; a tick that finds the slot taken
    /// is skipped.
    Serialized,
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    /// Time between tick starts.
    pub interval: Duration,
    /// Tick overlap handling.
    pub overlap: OverlapPolicy,
    /// Label handling when the classifier matches nothing.
    pub unmatched: UnmatchedPolicy,
    /// Classifier thresholds.
    pub thresholds: ClassifierThresholds,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            overlap: OverlapPolicy::default(),
            unmatched: UnmatchedPolicy::default(),
            thresholds: ClassifierThresholds::default(),
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Nothing was done.
    Skipped(SkipReason),
    /// The overlay was redrawn and the label possibly updated.
    Completed(TickReport),
    /// Estimation or classification failed; overlay and label are untouched.
    Failed(String),
}

impl TickOutcome {
    fn to_event(&self, tick: u64) -> TickEvent {
        match self {
            Self::Skipped(reason) => TickEvent::Skipped {
                tick,
                reason: *reason,
            },
            Self::Completed(report) => TickEvent::Completed {
                report: report.clone(),
            },
            Self::Failed(error) => TickEvent::Failed {
                tick,
                error: error.clone(),
            },
        }
    }
}

/// Tick counts for one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks started by the timer.
    pub scheduled: u64,
    /// Ticks that completed.
    pub completed: u64,
    /// Ticks skipped.
    pub skipped: u64,
    /// Ticks that failed or panicked.
    pub failed: u64,
}

impl RunSummary {
    fn record(&mut self, joined: Result<TickOutcome, JoinError>) {
        match joined {
            Ok(TickOutcome::Completed(_)) => self.completed += 1,
            Ok(TickOutcome::Skipped(_)) => self.skipped += 1,
            Ok(TickOutcome::Failed(_)) => self.failed += 1,
            Err(e) => {
                warn!("tick task did not finish: {e}");
                self.failed += 1;
            }
        }
    }
}

/// Holds the serialized-mode estimation slot until dropped.
struct SlotGuard<'a>(&'a AtomicBool);

impl<'a> SlotGuard<'a> {
    fn acquire(slot: &'a AtomicBool) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(slot))
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Samples a capture source on a timer, annotates frames and publishes labels.
pub struct AnnotationLoop {
    source: Arc<dyn CaptureSource>,
    estimator: Arc<dyn LandmarkEstimator>,
    overlay: Arc<Mutex<dyn OverlaySurface>>,
    label: LabelState,
    sink: Arc<dyn TickSink>,
    classifier: EmotionClassifier,
    config: LoopConfig,
    ticks: AtomicU64,
    slot: AtomicBool,
}

impl AnnotationLoop {
    /// Creates a loop with default settings and no tick sink.
    #[must_use]
    pub fn new(
        source: Arc<dyn CaptureSource>,
        estimator: Arc<dyn LandmarkEstimator>,
        overlay: Arc<Mutex<dyn OverlaySurface>>,
        label: LabelState,
    ) -> Self {
        let classifier = EmotionClassifier::default().with_topology(estimator.topology());
        Self {
            source,
            estimator,
            overlay,
            label,
            sink: Arc::new(NullSink),
            classifier,
            config: LoopConfig::default(),
            ticks: AtomicU64::new(0),
            slot: AtomicBool::new(false),
        }
    }

    /// Replaces the loop settings.
    #[must_use]
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.classifier =
            EmotionClassifier::new(config.thresholds).with_topology(self.estimator.topology());
        self.config = config;
        self
    }

    /// Sets the sink that receives one event per tick.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TickSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the loop settings.
    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Returns the label state the loop publishes to.
    #[must_use]
    pub const fn label(&self) -> &LabelState {
        &self.label
    }

    /// Runs one tick synchronously on the calling thread.
    ///
    /// Blocks for the duration of estimation.
    pub fn tick(&self) -> TickOutcome {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let outcome = self.run_tick(tick);
        self.sink.on_event(outcome.to_event(tick));
        outcome
    }

    /// Schedules ticks every `interval` until `shutdown` resolves or
    /// `max_ticks` ticks have been started, then waits for in-flight ticks.
    ///
    /// Each tick runs on the blocking pool and is not awaited before the next
    /// one is scheduled. The first tick starts one interval after the call.
    pub async fn run<F>(self: Arc<Self>, max_ticks: Option<u64>, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let period = self.config.interval;
        let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight = JoinSet::new();
        let mut summary = RunSummary::default();
        tokio::pin!(shutdown);

        info!(
            interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            overlap = ?self.config.overlap,
            "annotation loop started"
        );

        loop {
            if max_ticks.is_some_and(|max| summary.scheduled >= max) {
                debug!("tick limit reached");
                break;
            }

            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                _ = timer.tick() => {
                    let this = Arc::clone(&self);
                    in_flight.spawn_blocking(move || this.tick());
                    summary.scheduled += 1;
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                summary.record(joined);
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            summary.record(joined);
        }

        info!(
            scheduled = summary.scheduled,
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "annotation loop stopped"
        );
        summary
    }

    fn run_tick(&self, tick: u64) -> TickOutcome {
        if !self.source.is_ready() {
            debug!(tick, "capture source not ready");
            return TickOutcome::Skipped(SkipReason::NotReady);
        }
        let Some(frame) = self.source.current_frame() else {
            debug!(tick, "capture source has no frame");
            return TickOutcome::Skipped(SkipReason::NotReady);
        };

        let _slot = match self.config.overlap {
            OverlapPolicy::Concurrent => None,
            OverlapPolicy::Serialized => {
                let Some(guard) = SlotGuard::acquire(&self.slot) else {
                    debug!(tick, "estimation slot busy");
                    return TickOutcome::Skipped(SkipReason::Busy);
                };
                Some(guard)
            }
        };

        let dimensions = frame.dimensions();
        self.source.present(dimensions);
        self.lock_overlay().resize(dimensions);

        let started = Instant::now();
        let faces = match self.estimator.estimate(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!(tick, "landmark estimation failed: {e:#}");
                return TickOutcome::Failed(format!("{e:#}"));
            }
        };
        let estimate_ms = started.elapsed().as_secs_f64() * 1000.0;

        let classification = faces
            .first()
            .map(|primary| self.classifier.classify(primary))
            .transpose();
        let (metrics, classified) = match classification {
            Ok(Some((metrics, label))) => (Some(metrics), label),
            Ok(None) => (None, None),
            Err(e) => {
                warn!(tick, "classification failed: {e:#}");
                return TickOutcome::Failed(format!("{e:#}"));
            }
        };

        let markers = {
            let mut overlay = self.lock_overlay();
            overlay.clear();
            for keypoint in faces.iter().flat_map(|face| face.keypoints()) {
                overlay.draw_marker(keypoint);
            }
            overlay.markers().len()
        };

        if !faces.is_empty() {
            match (classified, self.config.unmatched) {
                (Some(label), _) => self.publish(label),
                (None, UnmatchedPolicy::Reset) => self.publish(EmotionLabel::Unset),
                (None, UnmatchedPolicy::Hold) => {}
            }
        }

        debug!(
            tick,
            faces = faces.len(),
            markers,
            estimate_ms,
            "tick completed"
        );

        TickOutcome::Completed(TickReport {
            tick,
            frame_sequence: frame.sequence(),
            dimensions,
            faces: faces.len(),
            markers,
            classified,
            label: self.label.current(),
            metrics,
            estimate_ms,
            frame,
        })
    }

    fn publish(&self, label: EmotionLabel) {
        let previous = self.label.publish(label);
        if previous == label {
            debug!(%label, "emotion unchanged");
        } else {
            info!(%label, %previous, "emotion changed");
        }
    }

    fn lock_overlay(&self) -> MutexGuard<'_, dyn OverlaySurface + 'static> {
        self.overlay.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_guard_is_exclusive() {
        let slot = AtomicBool::new(false);
        let first = SlotGuard::acquire(&slot);
        assert!(first.is_some());
        assert!(SlotGuard::acquire(&slot).is_none());
        drop(first);
        assert!(SlotGuard::acquire(&slot).is_some());
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.record(Ok(TickOutcome::Skipped(SkipReason::NotReady)));
        summary.record(Ok(TickOutcome::Failed("boom".into())));
        summary.record(Ok(TickOutcome::Skipped(SkipReason::Busy)));
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 0);
    }

    #[test]
    fn test_default_config() {
        let config = LoopConfig::default();
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.overlap, OverlapPolicy::Concurrent);
        assert_eq!(config.unmatched, UnmatchedPolicy::Hold);
    }
}
