//! Configuration file support for facemood.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/facemood/config.toml` (lowest priority)
//! - Project-local: `.facemood.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use facemood_core::inference::DevicePreference;
use facemood_core::overlay::parse_hex_color;
use facemood_core::UnmatchedPolicy;
use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture settings.
    pub capture: CaptureConfig,
    /// Annotation loop settings.
    #[serde(rename = "loop")]
    pub annotate: LoopConfig,
    /// Classification thresholds.
    pub classifier: ClassifierConfig,
    /// Marker drawing settings.
    pub overlay: OverlayConfig,
    /// Landmark estimator settings.
    pub estimator: EstimatorConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output settings.
    pub output: OutputConfig,
}

/// Capture configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// ffmpeg input (device, file or URL).
    pub input: Option<String>,
    /// ffmpeg input format, e.g. `v4l2`.
    pub input_format: Option<String>,
    /// Capture width in pixels.
    pub width: Option<u32>,
    /// Capture height in pixels.
    pub height: Option<u32>,
    /// Directory of frames to play back instead of a live input.
    pub frames_dir: Option<PathBuf>,
    /// Time each played-back frame stays current.
    pub frame_interval_ms: Option<u64>,
    /// Restart playback after the last frame.
    pub loop_frames: Option<bool>,
}

/// Annotation loop configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Milliseconds between ticks.
    pub interval_ms: Option<u64>,
    /// Skip ticks while another is still estimating.
    pub serialized: Option<bool>,
    /// What to do when no rule matches: "hold" or "reset".
    pub unmatched: Option<UnmatchedPolicy>,
}

/// Classifier thresholds, in keypoint pixels.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lip gap above which the face is happy.
    pub happy_lip_gap: Option<f32>,
    /// Lip gap above which the face is neutral.
    pub neutral_lip_gap: Option<f32>,
    /// Brow span above which a closed-mouth face is angry.
    pub angry_brow_span: Option<f32>,
}

/// Marker drawing configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Marker radius in pixels.
    pub marker_radius: Option<f32>,
    /// Marker colour, `#RRGGBB` or `#RRGGBBAA`.
    pub marker_color: Option<String>,
    /// Marker stroke width in pixels.
    pub marker_width: Option<f32>,
}

/// Landmark estimator configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Inference device: "auto" or "cpu".
    pub device: Option<DevicePreference>,
    /// Maximum faces per frame.
    pub max_faces: Option<usize>,
    /// Minimum face presence probability.
    pub min_face_confidence: Option<f32>,
    /// Minimum face detector score.
    pub min_detection_confidence: Option<f32>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write one JSON line per tick to stdout.
    pub jsonl: Option<bool>,
    /// Show the live status line.
    pub status: Option<bool>,
    /// Save annotated frames to this directory.
    pub save_frames: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/facemood/config.toml`
    /// 2. Project-local: `.facemood.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        if self.capture.width == Some(0) || self.capture.height == Some(0) {
            return Err("capture.width and capture.height must be positive".to_string());
        }
        if self.capture.width.is_some() != self.capture.height.is_some() {
            return Err("capture.width and capture.height must be set together".to_string());
        }
        if self.capture.frame_interval_ms == Some(0) {
            return Err("capture.frame_interval_ms must be positive".to_string());
        }
        if self.annotate.interval_ms == Some(0) {
            return Err("loop.interval_ms must be positive".to_string());
        }

        for (name, value) in [
            ("classifier.happy_lip_gap", self.classifier.happy_lip_gap),
            ("classifier.neutral_lip_gap", self.classifier.neutral_lip_gap),
            ("classifier.angry_brow_span", self.classifier.angry_brow_span),
            ("overlay.marker_width", self.overlay.marker_width),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{name} must be a non-negative number, got {v}"));
                }
            }
        }
        if let Some(r) = self.overlay.marker_radius {
            if !r.is_finite() || r <= 0.0 {
                return Err(format!("overlay.marker_radius must be positive, got {r}"));
            }
        }
        if let Some(ref c) = self.overlay.marker_color {
            parse_hex_color(c).map_err(|e| format!("overlay.marker_color: {e}"))?;
        }

        if self.estimator.max_faces == Some(0) {
            return Err("estimator.max_faces must be at least 1".to_string());
        }
        for (name, value) in [
            ("estimator.min_face_confidence", self.estimator.min_face_confidence),
            (
                "estimator.min_detection_confidence",
                self.estimator.min_detection_confidence,
            ),
        ] {
            if let Some(t) = value {
                if !(0.0..=1.0).contains(&t) {
                    return Err(format!("{name} must be 0.0-1.0, got {t}"));
                }
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // Capture
        let capture = &mut self.capture;
        capture.input = other.capture.input.or_else(|| capture.input.take());
        capture.input_format = other
            .capture
            .input_format
            .or_else(|| capture.input_format.take());
        capture.width = other.capture.width.or(capture.width);
        capture.height = other.capture.height.or(capture.height);
        capture.frames_dir = other.capture.frames_dir.or_else(|| capture.frames_dir.take());
        capture.frame_interval_ms = other.capture.frame_interval_ms.or(capture.frame_interval_ms);
        capture.loop_frames = other.capture.loop_frames.or(capture.loop_frames);

        // Loop
        self.annotate.interval_ms = other.annotate.interval_ms.or(self.annotate.interval_ms);
        self.annotate.serialized = other.annotate.serialized.or(self.annotate.serialized);
        self.annotate.unmatched = other.annotate.unmatched.or(self.annotate.unmatched);

        // Classifier
        let classifier = &mut self.classifier;
        classifier.happy_lip_gap = other.classifier.happy_lip_gap.or(classifier.happy_lip_gap);
        classifier.neutral_lip_gap = other
            .classifier
            .neutral_lip_gap
            .or(classifier.neutral_lip_gap);
        classifier.angry_brow_span = other
            .classifier
            .angry_brow_span
            .or(classifier.angry_brow_span);

        // Overlay
        self.overlay.marker_radius = other.overlay.marker_radius.or(self.overlay.marker_radius);
        self.overlay.marker_color = other
            .overlay
            .marker_color
            .or_else(|| self.overlay.marker_color.take());
        self.overlay.marker_width = other.overlay.marker_width.or(self.overlay.marker_width);

        // Estimator
        let estimator = &mut self.estimator;
        estimator.device = other.estimator.device.or(estimator.device);
        estimator.max_faces = other.estimator.max_faces.or(estimator.max_faces);
        estimator.min_face_confidence = other
            .estimator
            .min_face_confidence
            .or(estimator.min_face_confidence);
        estimator.min_detection_confidence = other
            .estimator
            .min_detection_confidence
            .or(estimator.min_detection_confidence);

        // Models
        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        // Output
        self.output.jsonl = other.output.jsonl.or(self.output.jsonl);
        self.output.status = other.output.status.or(self.output.status);
        self.output.save_frames = other
            .output
            .save_frames
            .or_else(|| self.output.save_frames.take());
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("facemood").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.facemood.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".facemood.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
