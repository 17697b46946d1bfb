//! ML inference engine using Candle.
//!
//! Provides the face landmark estimator used by the annotation loop:
//! - `BlazeFace` short-range face detection
//! - 468-point face mesh regression on detector crops

pub mod blazeface;
mod device;
mod estimator;
pub mod facemesh;
mod layers;
mod loader;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub use device::{select_device, DevicePreference};
pub use estimator::{
    FaceMeshEstimator, ModelVariant, RegionOfInterest, RuntimeConfig, DEFAULT_MAX_FACES,
    DEFAULT_MIN_FACE_CONFIDENCE,
};
pub use loader::{load_model, load_safetensors};

use crate::ports::LandmarkEstimator;

/// Builds the landmark estimator for `variant` on a blocking thread.
///
/// Must complete before the annotation loop starts; there is no retry.
///
/// # Errors
///
/// Returns an error if the weights cannot be loaded or the loading task dies.
pub async fn initialize(
    variant: ModelVariant,
    runtime: RuntimeConfig,
) -> Result<Arc<dyn LandmarkEstimator>> {
    info!(?variant, device = ?runtime.device, "Initializing landmark estimator");
    let estimator = tokio::task::spawn_blocking(move || FaceMeshEstimator::load(variant, &runtime))
        .await
        .context("Estimator initialization task failed")??;
    info!("Landmark estimator ready");
    Ok(Arc::new(estimator))
}
