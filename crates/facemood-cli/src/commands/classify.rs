//! Classify command - one annotation tick per still image.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Args;
use facemood_adapters::StillImage;
use facemood_core::{
    AnnotationLoop, EmotionLabel, FaceMetrics, LabelState, LandmarkEstimator, LoopConfig,
    RasterOverlay, TickOutcome,
};
use serde::Serialize;
use tracing::{info, warn};

use super::estimator::EstimatorArgs;
use super::{marker_style, thresholds, ExitCode};
use crate::config::AppConfig;
use crate::output::{iso_timestamp, FrameWriter, JsonlOutput};

/// Arguments for the classify command.
#[derive(Args, Clone, Debug)]
pub struct ClassifyArgs {
    /// Images to classify
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Save each image with its landmark overlay to this directory
    #[arg(long, value_name = "DIR")]
    pub save_overlay: Option<PathBuf>,

    /// Estimator options.
    #[command(flatten)]
    pub estimator: EstimatorArgs,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl ClassifyArgs {
    /// Apply configuration file values, respecting CLI precedence.
    #[must_use]
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.estimator = self.estimator.with_config(config);
        self.config = Some(config.clone());
        self
    }
}

/// One result line.
#[derive(Serialize)]
struct ImageResult {
    path: String,
    time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    faces: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<EmotionLabel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<FaceMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ImageResult {
    fn new(path: String) -> Self {
        Self {
            path,
            time: iso_timestamp(),
            faces: None,
            label: None,
            metrics: None,
            error: None,
        }
    }
}

/// Run the classify command.
///
/// Exits with [`ExitCode::NoLabel`] when no image produced a label.
pub fn run(args: &ClassifyArgs) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let config = args.config.clone().unwrap_or_default();
    let estimator = runtime.block_on(args.estimator.initialize(&config))?;

    let output = JsonlOutput::stdout();
    let mut labelled = 0usize;
    for path in &args.images {
        let result = classify_image(args, &config, &estimator, path)?;
        if result.label.is_some() {
            labelled += 1;
        }
        output.write(&result)?;
    }

    info!("{labelled}/{} images labelled", args.images.len());
    Ok(if labelled > 0 {
        ExitCode::Success
    } else {
        ExitCode::NoLabel
    })
}

fn classify_image(
    args: &ClassifyArgs,
    config: &AppConfig,
    estimator: &Arc<dyn LandmarkEstimator>,
    path: &std::path::Path,
) -> Result<ImageResult> {
    let mut result = ImageResult::new(path.display().to_string());
    let still = match StillImage::open(path) {
        Ok(still) => Arc::new(still),
        Err(e) => {
            warn!("{e:#}");
            result.error = Some(format!("{e:#}"));
            return Ok(result);
        }
    };

    let overlay = Arc::new(Mutex::new(RasterOverlay::new(marker_style(config)?)));
    let annotation = AnnotationLoop::new(
        Arc::clone(&still) as _,
        Arc::clone(estimator),
        Arc::clone(&overlay) as _,
        LabelState::new(),
    )
    .with_config(LoopConfig {
        thresholds: thresholds(config),
        ..LoopConfig::default()
    });

    match annotation.tick() {
        TickOutcome::Completed(report) => {
            result.faces = Some(report.faces);
            result.label = report.classified;
            result.metrics = report.metrics;
        }
        TickOutcome::Failed(error) => result.error = Some(error),
        TickOutcome::Skipped(reason) => result.error = Some(format!("skipped: {reason:?}")),
    }

    if let Some(dir) = &args.save_overlay {
        let stem = path
            .file_stem()
            .map_or_else(|| "image".into(), |s| s.to_string_lossy());
        let saved = FrameWriter::new(dir, overlay)
            .and_then(|writer| writer.save(&format!("{stem}.overlay"), still.frame()));
        if let Err(e) = saved {
            warn!("{e:#}");
            result.error.get_or_insert_with(|| format!("{e:#}"));
        }
    }

    Ok(result)
}
