//! CLI command definitions and handlers.

pub mod classify;
pub mod estimator;
pub mod models;
pub mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use facemood_core::overlay::{
    parse_hex_color, MarkerStyle, DEFAULT_MARKER_COLOR, DEFAULT_MARKER_RADIUS, DEFAULT_MARKER_WIDTH,
};
use facemood_core::ClassifierThresholds;

use crate::config::AppConfig;

/// facemood - live face-mesh overlay and emotion labelling
#[derive(Parser)]
#[command(name = "facemood")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arguments for the default `run` command.
    #[command(flatten)]
    pub run: run::RunArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Annotate a live feed and track the detected emotion (default)
    Run(run::RunArgs),
    /// Classify still images
    Classify(classify::ClassifyArgs),
    /// Manage ML models
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// No image produced a label.
    NoLabel = 1,
    /// Something failed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// Classifier thresholds from config, falling back to defaults.
fn thresholds(config: &AppConfig) -> ClassifierThresholds {
    let defaults = ClassifierThresholds::default();
    ClassifierThresholds {
        happy_lip_gap: config
            .classifier
            .happy_lip_gap
            .unwrap_or(defaults.happy_lip_gap),
        neutral_lip_gap: config
            .classifier
            .neutral_lip_gap
            .unwrap_or(defaults.neutral_lip_gap),
        angry_brow_span: config
            .classifier
            .angry_brow_span
            .unwrap_or(defaults.angry_brow_span),
    }
}

/// Marker style from config, falling back to defaults.
fn marker_style(config: &AppConfig) -> Result<MarkerStyle> {
    let color = match config.overlay.marker_color.as_deref() {
        Some(c) => parse_hex_color(c)?,
        None => DEFAULT_MARKER_COLOR,
    };
    Ok(MarkerStyle {
        radius: config.overlay.marker_radius.unwrap_or(DEFAULT_MARKER_RADIUS),
        color,
        line_width: config.overlay.marker_width.unwrap_or(DEFAULT_MARKER_WIDTH),
    })
}
