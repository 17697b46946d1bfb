//! Estimator arguments shared by `run` and `classify`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use facemood_adapters::models::{self, DETECTOR, FACE_MESH};
use facemood_adapters::set_models_dir;
use facemood_core::inference::{self, DevicePreference, ModelVariant, RuntimeConfig};
use facemood_core::LandmarkEstimator;
use tracing::debug;

use crate::config::AppConfig;

/// Parse and validate a probability (0.0-1.0).
fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}

/// Landmark estimator options.
#[derive(Args, Clone, Debug, Default)]
pub struct EstimatorArgs {
    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Run inference on the CPU even if an accelerator is available
    #[arg(long)]
    pub cpu: bool,

    /// Maximum number of faces per frame
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_faces: Option<u16>,

    /// Minimum face presence probability (0.0-1.0)
    #[arg(long, value_parser = parse_confidence)]
    pub min_confidence: Option<f32>,
}

impl EstimatorArgs {
    /// Apply configuration file values, respecting CLI precedence.
    #[must_use]
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        if !self.cpu {
            self.cpu = config.estimator.device == Some(DevicePreference::Cpu);
        }
        if self.models_dir.is_none() {
            self.models_dir.clone_from(&config.models.dir);
        }
        self.min_confidence = self.min_confidence.or(config.estimator.min_face_confidence);
        self
    }

    /// Points model lookups at the chosen models directory.
    pub fn apply_models_dir(&self) {
        if let Some(ref models_dir) = self.models_dir {
            debug!("Using custom models directory: {}", models_dir.display());
            set_models_dir(Some(models_dir.clone()));
        }
    }

    /// Builds the runtime settings, checking the weights are installed.
    ///
    /// # Errors
    ///
    /// Returns an error naming `facemood models fetch` if weights are missing.
    pub fn runtime(&self, config: &AppConfig) -> Result<RuntimeConfig> {
        self.apply_models_dir();
        let detector = models::model_path(DETECTOR).context("Unknown detector model")?;
        let mesh = models::model_path(FACE_MESH).context("Unknown face mesh model")?;
        for path in [&detector, &mesh] {
            if !path.exists() {
                anyhow::bail!(
                    "Model weights not found: {}. Run `facemood models fetch` first.",
                    path.display()
                );
            }
        }

        let mut runtime = RuntimeConfig::new(detector, mesh);
        if self.cpu {
            runtime.device = DevicePreference::Cpu;
        }
        if let Some(max_faces) = self.max_faces.map(usize::from).or(config.estimator.max_faces) {
            runtime.max_faces = max_faces;
        }
        if let Some(confidence) = self.min_confidence {
            runtime.min_face_confidence = confidence;
        }
        if let Some(confidence) = config.estimator.min_detection_confidence {
            runtime.min_detection_confidence = confidence;
        }
        Ok(runtime)
    }

    /// Loads the landmark estimator.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or fail to load.
    pub async fn initialize(&self, config: &AppConfig) -> Result<Arc<dyn LandmarkEstimator>> {
        let runtime = self.runtime(config)?;
        inference::initialize(ModelVariant::FaceMesh468, runtime)
            .await
            .context("Failed to initialize face landmark estimator")
    }
}
