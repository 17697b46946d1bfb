//! Mock implementations of core port traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use facemood_core::domain::{Face, Frame, FrameDimensions, Keypoint, MeshTopology, FACE_MESH_468};
use facemood_core::ports::{
    CaptureSource, LandmarkEstimator, OverlaySurface, SkipReason, TickEvent, TickReport, TickSink,
};

/// Mock implementation of `CaptureSource` for testing.
///
/// Serves whatever frame was last set and records every `present` call.
pub struct MockCaptureSource {
    frame: Mutex<Option<Frame>>,
    ready: AtomicBool,
    presented: Mutex<Vec<FrameDimensions>>,
    reads: AtomicUsize,
}

impl MockCaptureSource {
    /// Creates a ready source serving `frame`.
    #[must_use]
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Mutex::new(Some(frame)),
            ready: AtomicBool::new(true),
            presented: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Creates a source that has no frame and is not ready.
    #[must_use]
    pub fn not_ready() -> Self {
        Self {
            frame: Mutex::new(None),
            ready: AtomicBool::new(false),
            presented: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Replaces the current frame.
    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Sets the readiness flag.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Dimensions passed to `present`, in call order.
    #[must_use]
    pub fn presented(&self) -> Vec<FrameDimensions> {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `current_frame` calls.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CaptureSource for MockCaptureSource {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<Frame> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn present(&self, dimensions: FrameDimensions) {
        self.presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dimensions);
    }
}

/// Scripted response for `MockEstimator`.
pub type MockResponse = Result<Vec<Face>, String>;

/// Mock implementation of `LandmarkEstimator` for testing.
///
/// Replays scripted responses in order, then repeats the fallback. Tracks
/// how many calls overlapped.
pub struct MockEstimator {
    script: Mutex<VecDeque<MockResponse>>,
    fallback: MockResponse,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockEstimator {
    /// Always returns `faces`.
    #[must_use]
    pub fn returning(faces: Vec<Face>) -> Self {
        Self::scripted(Vec::new(), Ok(faces))
    }

    /// Always fails with `message`.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self::scripted(Vec::new(), Err(message.to_string()))
    }

    /// Returns each scripted response once, then `fallback` forever.
    #[must_use]
    pub fn scripted(script: Vec<MockResponse>, fallback: MockResponse) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleeps for `delay` inside every call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `estimate` calls.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `estimate` calls observed.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl LandmarkEstimator for MockEstimator {
    fn estimate(&self, _frame: &Frame) -> anyhow::Result<Vec<Face>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let response = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.active.fetch_sub(1, Ordering::SeqCst);
        response.map_err(|message| anyhow::anyhow!(message))
    }

    fn topology(&self) -> MeshTopology {
        FACE_MESH_468
    }
}

/// In-memory `OverlaySurface` that records what was done to it.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    dimensions: FrameDimensions,
    markers: Vec<Keypoint>,
    clears: usize,
    resizes: Vec<FrameDimensions>,
}

impl RecordingOverlay {
    /// Creates an empty 0x0 overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an overlay wrapped for sharing with an `AnnotationLoop`.
    #[must_use]
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Number of `clear` calls.
    #[must_use]
    pub const fn clears(&self) -> usize {
        self.clears
    }

    /// Every size passed to `resize`.
    #[must_use]
    pub fn resizes(&self) -> &[FrameDimensions] {
        &self.resizes
    }
}

impl OverlaySurface for RecordingOverlay {
    fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    fn resize(&mut self, dimensions: FrameDimensions) {
        self.dimensions = dimensions;
        self.resizes.push(dimensions);
    }

    fn clear(&mut self) {
        self.markers.clear();
        self.clears += 1;
    }

    fn draw_marker(&mut self, at: &Keypoint) {
        self.markers.push(*at);
    }

    fn markers(&self) -> &[Keypoint] {
        &self.markers
    }
}

/// Mock implementation of `TickSink` for testing.
///
/// Captures events for later assertions.
#[derive(Default)]
pub struct MockTickSink {
    events: Mutex<Vec<TickEvent>>,
}

impl MockTickSink {
    /// Creates a new mock sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<TickEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reports of completed ticks, in arrival order.
    #[must_use]
    pub fn reports(&self) -> Vec<TickReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TickEvent::Completed { report } => Some(report),
                _ => None,
            })
            .collect()
    }

    /// Number of `Completed` events.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.reports().len()
    }

    /// Number of `Skipped` events with the given reason.
    #[must_use]
    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TickEvent::Skipped { reason: r, .. } if *r == reason))
            .count()
    }

    /// Number of `Failed` events.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TickEvent::Failed { .. }))
            .count()
    }
}

impl TickSink for MockTickSink {
    fn on_event(&self, event: TickEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
