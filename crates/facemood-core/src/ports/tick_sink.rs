//! Tick reporting port for UI integration.

use serde::Serialize;

use crate::classify::FaceMetrics;
use crate::domain::{EmotionLabel, Frame, FrameDimensions};

/// Why a tick did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SkipReason {
    /// The capture source had no ready frame.
    NotReady,
    /// Another tick held the estimation slot (serialized mode only).
    Busy,
}

/// What a completed tick did.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Sequence number of the sampled frame.
    pub frame_sequence: u64,
    /// Frame size the overlay was fitted to.
    pub dimensions: FrameDimensions,
    /// Number of faces the estimator returned.
    pub faces: usize,
    /// Number of markers drawn.
    pub markers: usize,
    /// Label derived from the primary face this tick, if any.
    pub classified: Option<EmotionLabel>,
    /// Label state after the tick.
    pub label: EmotionLabel,
    /// Distances measured on the primary face.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<FaceMetrics>,
    /// Wall time spent in the estimator.
    pub estimate_ms: f64,
    /// The sampled frame.
    #[serde(skip)]
    pub frame: Frame,
}

/// Events emitted by the annotation loop.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum TickEvent {
    /// A tick returned early without side effects.
    Skipped {
        /// Tick number.
        tick: u64,
        /// Reason for skipping.
        reason: SkipReason,
    },
    /// A tick ran to completion.
    Completed {
        /// What the tick did.
        report: TickReport,
    },
    /// Estimation or classification failed for one tick.
    Failed {
        /// Tick number.
        tick: u64,
        /// Error chain, formatted.
        error: String,
    },
}

/// Port for receiving tick events.
pub trait TickSink: Send + Sync {
    /// Called once per tick, from the thread that ran it.
    fn on_event(&self, event: TickEvent);
}

impl<T: TickSink + ?Sized> TickSink for std::sync::Arc<T> {
    fn on_event(&self, event: TickEvent) {
        (**self).on_event(event);
    }
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TickSink for NullSink {
    fn on_event(&self, _event: TickEvent) {}
}

/// Forwards each event to several sinks in order.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TickSink>>,
}

impl FanOut {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with(mut self, sink: impl TickSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if no sink is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TickSink for FanOut {
    fn on_event(&self, event: TickEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.on_event(event.clone());
            }
            last.on_event(event);
        }
    }
}
