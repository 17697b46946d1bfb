//! Integration tests for frame-directory playback driving the annotation loop.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use facemood_adapters::{FsFrameSource, StillImage};
use facemood_core::{
    AnnotationLoop, CaptureSource, EmotionLabel, FrameDimensions, LabelState, TickOutcome,
};
use facemood_test_support::{FaceBuilder, MockEstimator, MockTickSink, RecordingOverlay};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

fn write_frame(dir: &Path, name: &str, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([40, 40, 40]))
        .save(dir.join(name))
        .expect("should write frame");
}

#[test]
fn test_directory_frames_reach_the_overlay() {
    let dir = TempDir::new().unwrap();
    write_frame(dir.path(), "frame-001.png", 64, 48);
    write_frame(dir.path(), "frame-002.png", 64, 48);

    let source = Arc::new(FsFrameSource::open(dir.path(), Duration::from_secs(60), false).unwrap());
    let overlay = RecordingOverlay::shared();
    let label = LabelState::new();
    let sink = Arc::new(MockTickSink::new());
    let annotation = AnnotationLoop::new(
        source,
        Arc::new(MockEstimator::returning(vec![FaceBuilder::neutral()])),
        overlay.clone(),
        label.clone(),
    )
    .with_sink(sink.clone());

    let TickOutcome::Completed(report) = annotation.tick() else {
        panic!("tick should complete");
    };
    assert_eq!(report.dimensions, FrameDimensions::new(64, 48));
    assert_eq!(label.current(), EmotionLabel::Neutral);
    assert_eq!(sink.completed_count(), 1);
}

#[test]
fn test_finished_sequence_is_not_ready() {
    let dir = TempDir::new().unwrap();
    write_frame(dir.path(), "only.png", 16, 16);

    let source = FsFrameSource::open(dir.path(), Duration::from_millis(5), false).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(!source.is_ready());
    assert!(source.current_frame().is_none());
}

#[test]
fn test_looping_sequence_stays_ready() {
    let dir = TempDir::new().unwrap();
    write_frame(dir.path(), "a.png", 16, 16);
    write_frame(dir.path(), "b.jpg", 16, 16);

    let source = FsFrameSource::open(dir.path(), Duration::from_millis(5), true).unwrap();
    assert_eq!(source.len(), 2);
    std::thread::sleep(Duration::from_millis(30));
    assert!(source.is_ready());
    assert!(source.current_frame().is_some());
}

#[test]
fn test_still_image_classifies_in_one_tick() {
    let dir = TempDir::new().unwrap();
    write_frame(dir.path(), "face.png", 320, 240);

    let still = Arc::new(StillImage::open(&dir.path().join("face.png")).unwrap());
    let label = LabelState::new();
    let annotation = AnnotationLoop::new(
        still,
        Arc::new(MockEstimator::returning(vec![FaceBuilder::angry()])),
        RecordingOverlay::shared(),
        label.clone(),
    );

    assert!(matches!(annotation.tick(), TickOutcome::Completed(_)));
    assert_eq!(label.current(), EmotionLabel::Angry);
}
