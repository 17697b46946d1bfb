//! Run command - annotate a live feed and track the detected emotion.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use facemood_adapters::fs::DEFAULT_FRAME_INTERVAL;
use facemood_adapters::{FfmpegCapture, FfmpegConfig, FsFrameSource};
use facemood_core::annotate::DEFAULT_INTERVAL;
use facemood_core::{
    AnnotationLoop, CaptureSource, FanOut, FrameDimensions, LabelState, LoopConfig, OverlapPolicy,
    RasterOverlay, UnmatchedPolicy,
};
use tracing::{debug, info, warn};

use super::estimator::EstimatorArgs;
use super::{marker_style, thresholds, ExitCode};
use crate::config::AppConfig;
use crate::output::{FrameWriter, JsonlOutput, StatusLine};

/// How often the run checks whether the capture source has ended.
const EXHAUSTION_POLL: Duration = Duration::from_millis(100);

/// Parse a `WIDTHxHEIGHT` size.
fn parse_size(s: &str) -> Result<FrameDimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{s}' is not in WIDTHxHEIGHT form"))?;
    let width: u32 = w.parse().map_err(|_| format!("'{w}' is not a valid width"))?;
    let height: u32 = h.parse().map_err(|_| format!("'{h}' is not a valid height"))?;
    if width == 0 || height == 0 {
        return Err(format!("{s} has a zero dimension"));
    }
    Ok(FrameDimensions::new(width, height))
}

/// Parse a positive millisecond count.
fn parse_millis(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("must be at least 1 ms".to_string()),
        Ok(ms) => Ok(ms),
        Err(_) => Err(format!("'{s}' is not a valid number of milliseconds")),
    }
}

/// Arguments for the run command.
#[derive(Args, Clone, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Video input for ffmpeg: a device, file or URL
    #[arg(long, value_name = "INPUT", conflicts_with = "frames")]
    pub input: Option<String>,

    /// ffmpeg input format, e.g. v4l2, avfoundation or dshow
    #[arg(long, value_name = "FMT")]
    pub input_format: Option<String>,

    /// Capture size; frames are scaled to it
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub size: Option<FrameDimensions>,

    /// Play back a directory of frames instead of a live input
    #[arg(long, value_name = "DIR")]
    pub frames: Option<PathBuf>,

    /// Restart frame playback after the last frame
    #[arg(long)]
    pub loop_frames: bool,

    /// Time each played-back frame stays current
    #[arg(long, value_name = "MS", value_parser = parse_millis)]
    pub frame_interval_ms: Option<u64>,

    /// Time between ticks
    #[arg(long, value_name = "MS", value_parser = parse_millis)]
    pub interval_ms: Option<u64>,

    /// Skip a tick while the previous one is still estimating
    #[arg(long)]
    pub serialized: bool,

    /// Clear the label when a face matches no rule
    #[arg(long)]
    pub reset_on_unmatched: bool,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    pub max_ticks: Option<u64>,

    /// Save every annotated frame to this directory
    #[arg(long, value_name = "DIR")]
    pub save_frames: Option<PathBuf>,

    /// Write one JSON line per tick to stdout
    #[arg(long)]
    pub jsonl: bool,

    /// Hide the status line
    #[arg(short, long)]
    pub quiet: bool,

    /// Estimator options.
    #[command(flatten)]
    pub estimator: EstimatorArgs,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl RunArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    #[must_use]
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        let capture = &config.capture;

        // A CLI source of either kind replaces any configured source.
        if self.input.is_none() && self.frames.is_none() {
            self.input.clone_from(&capture.input);
            if self.input.is_none() {
                self.frames.clone_from(&capture.frames_dir);
            }
        }
        if self.input_format.is_none() {
            self.input_format.clone_from(&capture.input_format);
        }
        if self.size.is_none() {
            if let (Some(w), Some(h)) = (capture.width, capture.height) {
                self.size = Some(FrameDimensions::new(w, h));
            }
        }
        if !self.loop_frames {
            self.loop_frames = capture.loop_frames.unwrap_or(false);
        }
        self.frame_interval_ms = self.frame_interval_ms.or(capture.frame_interval_ms);

        self.interval_ms = self.interval_ms.or(config.annotate.interval_ms);
        if !self.serialized {
            self.serialized = config.annotate.serialized.unwrap_or(false);
        }
        if !self.reset_on_unmatched {
            self.reset_on_unmatched = config.annotate.unmatched == Some(UnmatchedPolicy::Reset);
        }

        if !self.jsonl {
            self.jsonl = config.output.jsonl.unwrap_or(false);
        }
        if !self.quiet {
            self.quiet = config.output.status == Some(false);
        }
        if self.save_frames.is_none() {
            self.save_frames.clone_from(&config.output.save_frames);
        }

        self.estimator = self.estimator.with_config(config);
        self.config = Some(config.clone());
        self
    }

    fn config(&self) -> AppConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Loop settings with fallback to hardcoded defaults.
    fn loop_config(&self, config: &AppConfig) -> LoopConfig {
        LoopConfig {
            interval: self
                .interval_ms
                .map_or(DEFAULT_INTERVAL, Duration::from_millis),
            overlap: if self.serialized {
                OverlapPolicy::Serialized
            } else {
                OverlapPolicy::Concurrent
            },
            unmatched: if self.reset_on_unmatched {
                UnmatchedPolicy::Reset
            } else {
                UnmatchedPolicy::Hold
            },
            thresholds: thresholds(config),
        }
    }

    /// ffmpeg settings, using the platform camera when no input is given.
    fn ffmpeg_config(&self) -> Result<FfmpegConfig> {
        let (input, format) = match (&self.input, &self.input_format) {
            (Some(input), format) => (input.clone(), format.clone()),
            (None, format) => {
                let (input, default_format) = default_camera()?;
                (input.to_string(), format.clone().or_else(|| Some(default_format.to_string())))
            }
        };
        Ok(FfmpegConfig {
            input,
            format,
            size: self.size,
        })
    }
}

/// The platform's default camera for ffmpeg.
fn default_camera() -> Result<(&'static str, &'static str)> {
    if cfg!(target_os = "linux") {
        Ok(("/dev/video0", "v4l2"))
    } else if cfg!(target_os = "macos") {
        Ok(("0", "avfoundation"))
    } else {
        anyhow::bail!("No default camera on this platform; pass --input and --input-format")
    }
}

/// The capture source chosen for a run.
enum Capture {
    Live(Arc<FfmpegCapture>),
    Frames(Arc<FsFrameSource>),
}

impl Capture {
    fn open(args: &RunArgs) -> Result<Self> {
        if let Some(dir) = &args.frames {
            let interval = args
                .frame_interval_ms
                .map_or(DEFAULT_FRAME_INTERVAL, Duration::from_millis);
            let source = FsFrameSource::open(dir, interval, args.loop_frames)?;
            info!("Playing back {} frames from {}", source.len(), dir.display());
            return Ok(Self::Frames(Arc::new(source)));
        }
        let capture = FfmpegCapture::start(&args.ffmpeg_config()?)?;
        Ok(Self::Live(Arc::new(capture)))
    }

    fn source(&self) -> Arc<dyn CaptureSource> {
        match self {
            Self::Live(c) => Arc::clone(c) as Arc<dyn CaptureSource>,
            Self::Frames(f) => Arc::clone(f) as Arc<dyn CaptureSource>,
        }
    }

    /// True once no further frames will arrive.
    fn exhausted(&self, looping: bool) -> bool {
        match self {
            Self::Live(c) => c.has_ended(),
            Self::Frames(f) => !looping && !f.is_ready(),
        }
    }
}

/// Run the run command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &RunArgs) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_async(args))
}

async fn run_async(args: &RunArgs) -> Result<ExitCode> {
    let config = args.config();
    let loop_config = args.loop_config(&config);
    let style = marker_style(&config)?;

    // Estimator first: a missing model must fail before the camera opens.
    let estimator = args.estimator.initialize(&config).await?;
    let capture = Capture::open(args)?;

    let overlay = Arc::new(Mutex::new(RasterOverlay::new(style)));
    let label = LabelState::new();
    let status = StatusLine::new(label.clone(), args.quiet);

    let mut sinks = FanOut::new().with(status.clone());
    if args.jsonl {
        sinks = sinks.with(JsonlOutput::stdout());
    }
    if let Some(dir) = &args.save_frames {
        sinks = sinks.with(FrameWriter::new(dir, Arc::clone(&overlay))?);
    }
    debug!("Attached {} tick sinks", sinks.len());

    let annotation = Arc::new(
        AnnotationLoop::new(capture.source(), estimator, overlay, label.clone())
            .with_config(loop_config)
            .with_sink(Arc::new(sinks)),
    );

    let looping = args.loop_frames;
    let shutdown = async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Cannot listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            }
            () = async {
                while !capture.exhausted(looping) {
                    tokio::time::sleep(EXHAUSTION_POLL).await;
                }
            } => info!("Capture source exhausted"),
        }
    };

    let summary = annotation.run(args.max_ticks, shutdown).await;
    status.finish(&summary);
    info!(label = %label.current(), updates = label.updates(), "Run finished");

    Ok(ExitCode::Success)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("640x480").unwrap(), FrameDimensions::new(640, 480));
        assert_eq!(parse_size("1280X720").unwrap(), FrameDimensions::new(1280, 720));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x480").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis("100").unwrap(), 100);
        assert!(parse_millis("0").is_err());
        assert!(parse_millis("-5").is_err());
    }

    #[test]
    fn test_defaults_without_config() {
        let args = RunArgs::default().with_config(&AppConfig::default());
        let config = args.loop_config(&AppConfig::default());
        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.overlap, OverlapPolicy::Concurrent);
        assert_eq!(config.unmatched, UnmatchedPolicy::Hold);
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let config: AppConfig = toml::from_str(
            r"
[capture]
frames_dir = 'frames'
width = 320
height = 240

[loop]
interval_ms = 250
serialized = true
unmatched = 'reset'

[output]
jsonl = true
status = false
",
        )
        .unwrap();
        let args = RunArgs::default().with_config(&config);

        assert_eq!(args.frames, Some(PathBuf::from("frames")));
        assert_eq!(args.size, Some(FrameDimensions::new(320, 240)));
        assert!(args.jsonl);
        assert!(args.quiet);
        let loop_config = args.loop_config(&config);
        assert_eq!(loop_config.interval, Duration::from_millis(250));
        assert_eq!(loop_config.overlap, OverlapPolicy::Serialized);
        assert_eq!(loop_config.unmatched, UnmatchedPolicy::Reset);
    }

    #[test]
    fn test_cli_input_replaces_configured_frames() {
        let config: AppConfig = toml::from_str("[capture]\nframes_dir = 'frames'\n").unwrap();
        let args = RunArgs {
            input: Some("clip.mp4".to_string()),
            ..RunArgs::default()
        }
        .with_config(&config);

        assert_eq!(args.input.as_deref(), Some("clip.mp4"));
        assert!(args.frames.is_none());
    }

    #[test]
    fn test_cli_interval_wins() {
        let config: AppConfig = toml::from_str("[loop]\ninterval_ms = 250\n").unwrap();
        let args = RunArgs {
            interval_ms: Some(40),
            ..RunArgs::default()
        }
        .with_config(&config);
        assert_eq!(args.loop_config(&config).interval, Duration::from_millis(40));
    }

    #[test]
    fn test_ffmpeg_config_uses_explicit_input() {
        let args = RunArgs {
            input: Some("rtsp://camera/stream".to_string()),
            size: Some(FrameDimensions::new(640, 480)),
            ..RunArgs::default()
        };
        let ffmpeg = args.ffmpeg_config().unwrap();
        assert_eq!(ffmpeg.input, "rtsp://camera/stream");
        assert!(ffmpeg.format.is_none());
        assert_eq!(ffmpeg.size, Some(FrameDimensions::new(640, 480)));
    }
}
