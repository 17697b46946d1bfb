//! Model downloading and caching adapter.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Download progress callback: `(model name, bytes so far, total bytes)`.
pub type ProgressCallback = Box<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Download URL (GitHub releases).
    pub url: &'static str,
    /// Expected SHA256 hash, if published.
    pub sha256: Option<&'static str>,
    /// Filename in models directory.
    pub filename: &'static str,
}

/// Short-range face detector.
pub const DETECTOR: &str = "blazeface";
/// 468-point face mesh.
pub const FACE_MESH: &str = "face_mesh";

/// Known models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: DETECTOR,
        url: "https://github.com/facemood/facemood/releases/download/models-v1/blazeface.safetensors",
        sha256: None,
        filename: "blazeface.safetensors",
    },
    ModelInfo {
        name: FACE_MESH,
        url: "https://github.com/facemood/facemood/releases/download/models-v1/face_mesh.safetensors",
        sha256: None,
        filename: "face_mesh.safetensors",
    },
];

static MODELS_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Overrides the models directory for the rest of the process.
pub fn set_models_dir(dir: Option<PathBuf>) {
    *MODELS_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = dir;
}

/// Returns the models directory path.
///
/// Uses the override set with [`set_models_dir`], otherwise
/// `XDG_DATA_HOME/facemood/models` or `~/.local/share/facemood/models`.
#[must_use]
pub fn models_dir() -> PathBuf {
    if let Some(dir) = MODELS_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
    {
        return dir;
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facemood")
        .join("models")
}

/// Ensures all required models are downloaded.
///
/// # Errors
///
/// Returns an error if:
/// - The models directory cannot be created
/// - A model download fails
/// - A model's checksum doesn't match
pub fn ensure_models() -> Result<()> {
    ensure_models_with_progress(None)
}

/// Like [`ensure_models`], reporting download progress.
///
/// # Errors
///
/// See [`ensure_models`].
pub fn ensure_models_with_progress(progress: Option<&ProgressCallback>) -> Result<()> {
    let dir = models_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

    for model in MODELS {
        let path = dir.join(model.filename);
        if path.exists() {
            debug!("Model {} already exists", model.name);
        } else {
            download_model(model, &path, progress)?;
        }
    }

    Ok(())
}

/// Downloads a model from its URL.
fn download_model(
    model: &ModelInfo,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    info!("Downloading model: {}", model.name);

    let response = reqwest::blocking::get(model.url)
        .with_context(|| format!("Failed to download {}", model.name))?;

    if !response.status().is_success() {
        anyhow::bail!("Download of {} failed with status: {}", model.name, response.status());
    }

    let total = response.content_length();
    let written = save_stream(response, total, model, path, progress)?;

    info!("Downloaded {} ({written} bytes)", model.name);
    Ok(())
}

/// Streams `reader` into `path`, verifying the checksum before the file
/// appears under its final name. The partial file is removed on any failure.
fn save_stream(
    reader: impl Read,
    total: Option<u64>,
    model: &ModelInfo,
    path: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64> {
    let partial = path.with_extension("part");
    let result = write_partial(reader, total, model, &partial, progress).and_then(|written| {
        fs::rename(&partial, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(written)
    });

    if result.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            warn!("Failed to remove {}: {e}", partial.display());
        }
    }
    result
}

fn write_partial(
    mut reader: impl Read,
    total: Option<u64>,
    model: &ModelInfo,
    partial: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64> {
    let mut file = fs::File::create(partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written = 0u64;

    loop {
        let n = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read response for {}", model.name))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        file.write_all(&buffer[..n])
            .with_context(|| format!("Failed to write {}", model.name))?;
        written += n as u64;
        if let Some(cb) = progress {
            cb(model.name, written, total);
        }
    }
    file.flush()?;

    if let Some(expected) = model.sha256 {
        let hash = format!("{:x}", hasher.finalize());
        if hash != expected {
            anyhow::bail!(
                "Checksum mismatch for {}: expected {expected}, got {hash}. \
                 Re-run `facemood models fetch` to download a fresh copy.",
                model.name,
            );
        }
    } else {
        debug!("No published checksum for {}, skipping verification", model.name);
    }
    Ok(written)
}
