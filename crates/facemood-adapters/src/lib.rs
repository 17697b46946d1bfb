//! Facemood Adapters - External adapters for facemood.
//!
//! This crate provides adapters for:
//! - Live capture through `ffmpeg`
//! - Image-directory playback and still images
//! - Model downloading and caching

pub mod ffmpeg;
pub mod fs;
pub mod models;

pub use ffmpeg::{FfmpegCapture, FfmpegConfig};
pub use fs::{load_frame, FsFrameSource, StillImage};
pub use models::{model_path, models_dir, set_models_dir};
