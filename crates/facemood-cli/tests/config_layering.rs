//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args.
//! `models path` echoes the resolved models directory, which makes the chain observable
//! without model weights.

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn facemood(home: &Path, cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("facemood").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .current_dir(cwd);
    cmd
}

fn write_xdg_config(home: &Path, content: &str) {
    let dir = home.join("config").join("facemood");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), content).unwrap();
}

#[test]
fn test_default_models_dir() {
    let home = TempDir::new().unwrap();
    facemood(home.path(), home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("facemood").and(predicate::str::contains("models")));
}

#[test]
fn test_xdg_config_applies() {
    let home = TempDir::new().unwrap();
    write_xdg_config(home.path(), "[models]\ndir = '/from/xdg'\n");

    facemood(home.path(), home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/xdg"));
}

#[test]
fn test_project_config_overrides_xdg() {
    let home = TempDir::new().unwrap();
    write_xdg_config(home.path(), "[models]\ndir = '/from/xdg'\n");
    let project = home.path().join("project");
    let nested = project.join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();
    fs::write(project.join(".facemood.toml"), "[models]\ndir = '/from/project'\n").unwrap();

    // Found by searching up from a nested directory
    facemood(home.path(), &nested)
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/project"));
}

#[test]
fn test_cli_overrides_project_config() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join(".facemood.toml"),
        "[models]\ndir = '/from/project'\n",
    )
    .unwrap();

    facemood(home.path(), home.path())
        .args(["models", "--models-dir", "/from/cli", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/cli"));
}

#[test]
fn test_out_of_range_value_warns() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join(".facemood.toml"), "[loop]\ninterval_ms = 0\n").unwrap();

    facemood(home.path(), home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: loop.interval_ms"));
}

#[test]
fn test_malformed_config_is_ignored_with_warning() {
    let home = TempDir::new().unwrap();
    write_xdg_config(home.path(), "[models]\ndir = '/from/xdg'\n");
    fs::write(home.path().join(".facemood.toml"), "[models\ndir = 3\n").unwrap();

    facemood(home.path(), home.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/xdg"))
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_config_models_dir_reaches_run() {
    let home = TempDir::new().unwrap();
    let frames = home.path().join("frames");
    fs::create_dir_all(&frames).unwrap();
    image::RgbImage::new(8, 8).save(frames.join("0001.png")).unwrap();
    fs::write(
        home.path().join(".facemood.toml"),
        "[models]\ndir = 'configured-models'\n\n[capture]\nframes_dir = 'frames'\n",
    )
    .unwrap();

    facemood(home.path(), home.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configured-models"));
}
