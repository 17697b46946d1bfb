//! CLI argument validation tests.
//!
//! Tests command-line argument parsing, validation, and error handling.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the user's config and model cache.
fn facemood(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("facemood").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .current_dir(home);
    cmd
}

fn write_frame(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).unwrap();
    RgbImage::from_pixel(32, 24, Rgb([90, 90, 90]))
        .save(dir.join(name))
        .unwrap();
}

// === Help and Version ===

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run")
                .and(predicate::str::contains("classify"))
                .and(predicate::str::contains("models")),
        );
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("facemood"));
}

// === Value Validation ===

#[test]
fn test_invalid_size_rejected() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .args(["run", "--size", "640"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("WIDTHxHEIGHT"));
}

#[test]
fn test_zero_interval_rejected() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .args(["run", "--interval-ms", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least 1 ms"));
}

#[test]
fn test_confidence_out_of_range_rejected() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .args(["run", "--min-confidence", "1.5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("1.5 is not in 0.0..=1.0"));
}

#[test]
fn test_zero_max_faces_rejected() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .args(["run", "--max-faces", "0"])
        .assert()
        .code(2);
}

#[test]
fn test_input_and_frames_conflict() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .args(["run", "--input", "/dev/video0", "--frames", "frames"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_classify_requires_images() {
    let home = TempDir::new().unwrap();
    facemood(home.path())
        .arg("classify")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("required"));
}

// === Missing Models ===

#[test]
fn test_run_without_models_points_to_fetch() {
    let home = TempDir::new().unwrap();
    let frames = home.path().join("frames");
    write_frame(&frames, "0001.png");

    facemood(home.path())
        .arg("run")
        .arg("--frames")
        .arg(&frames)
        .arg("--models-dir")
        .arg(home.path().join("empty-models"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("facemood models fetch"));
}

#[test]
fn test_default_command_is_run() {
    let home = TempDir::new().unwrap();
    let frames = home.path().join("frames");
    write_frame(&frames, "0001.png");

    // No subcommand: flags go to `run`, which fails on the missing weights
    facemood(home.path())
        .arg("--frames")
        .arg(&frames)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Model weights not found"));
}

#[test]
fn test_classify_without_models_fails() {
    let home = TempDir::new().unwrap();
    write_frame(home.path(), "face.png");

    facemood(home.path())
        .arg("classify")
        .arg(home.path().join("face.png"))
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::starts_with("error:"));
}
