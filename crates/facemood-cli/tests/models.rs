//! Tests for the `models` subcommand against a local models directory.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn models_cmd(models_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("facemood").unwrap();
    cmd.env("XDG_CONFIG_HOME", models_dir.join("no-config"))
        .arg("models")
        .arg("--models-dir")
        .arg(models_dir);
    cmd
}

#[test]
fn test_list_empty_directory() {
    let dir = TempDir::new().unwrap();
    models_cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("✗ blazeface")
                .and(predicate::str::contains("✗ face_mesh"))
                .and(predicate::str::contains("face_mesh.safetensors"))
                .and(predicate::str::contains("0/2 models installed")),
        );
}

#[test]
fn test_list_installed_models() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("blazeface.safetensors"), b"stub").unwrap();
    fs::write(dir.path().join("face_mesh.safetensors"), b"stub").unwrap();

    models_cmd(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("✓ blazeface")
                .and(predicate::str::contains("(4 B)"))
                .and(predicate::str::contains("2/2 models installed")),
        );
}

#[test]
fn test_path_prints_directory() {
    let dir = TempDir::new().unwrap();
    models_cmd(dir.path())
        .arg("path")
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.path().to_string_lossy().into_owned()));
}

#[test]
fn test_fetch_skips_installed_models() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("blazeface.safetensors"), b"stub").unwrap();
    fs::write(dir.path().join("face_mesh.safetensors"), b"stub").unwrap();

    // Nothing to download, so no network is touched
    models_cmd(dir.path())
        .arg("fetch")
        .assert()
        .success()
        .stdout(predicate::str::contains("already installed"));
}
