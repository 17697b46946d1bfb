//! Live capture through an external `ffmpeg` process.
//!
//! `ffmpeg` decodes the input (a webcam device, a stream URL or a video file)
//! and writes raw `rgb24` frames to a pipe. A reader thread keeps only the most
//! recent frame, so the annotation loop always samples the live picture.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use facemood_core::{CaptureSource, Frame, FrameDimensions};
use image::{DynamicImage, RgbImage};
use tracing::{debug, info, warn};

/// What to capture and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegConfig {
    /// Input passed to `ffmpeg -i`, e.g. `/dev/video0` or a file path.
    pub input: String,
    /// Input format passed as `-f`, e.g. `v4l2` or `avfoundation`.
    pub format: Option<String>,
    /// Output size. Frames are scaled to it and probing is skipped.
    pub size: Option<FrameDimensions>,
}

impl FfmpegConfig {
    /// Capture `input` at its native size.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            format: None,
            size: None,
        }
    }

    fn input_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(format) = &self.format {
            args.extend(["-f".to_string(), format.clone()]);
        }
        args.extend(["-i".to_string(), self.input.clone()]);
        args
    }

    /// Arguments for `ffprobe`.
    #[must_use]
    pub fn probe_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-v", "error", "-select_streams", "v:0", "-show_streams"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(["-print_format".to_string(), "json".to_string()]);
        if let Some(format) = &self.format {
            args.extend(["-f".to_string(), format.clone()]);
        }
        args.push(self.input.clone());
        args
    }

    /// Arguments for `ffmpeg`.
    #[must_use]
    pub fn capture_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
            .into_iter()
            .map(String::from)
            .collect();
        args.extend(self.input_args());
        if let Some(size) = self.size {
            args.extend(["-s".to_string(), size.to_string()]);
        }
        args.extend(
            ["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
                .into_iter()
                .map(String::from),
        );
        args
    }
}

/// Frames shared between the reader thread and the loop.
#[derive(Default)]
struct Latest {
    frame: Mutex<Option<Frame>>,
    ended: AtomicBool,
}

/// Capture source backed by an `ffmpeg` child process.
pub struct FfmpegCapture {
    latest: Arc<Latest>,
    dimensions: FrameDimensions,
    child: Mutex<Child>,
    reader: Option<JoinHandle<()>>,
}

impl FfmpegCapture {
    /// Probes the input (unless a size is set) and starts `ffmpeg`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ffprobe` or `ffmpeg` cannot be run, or the input
    /// has no video stream.
    pub fn start(config: &FfmpegConfig) -> Result<Self> {
        let dimensions = match config.size {
            Some(size) => size,
            None => probe(config)?,
        };
        if dimensions.is_empty() {
            anyhow::bail!("Capture size {dimensions} is empty");
        }

        let args = config.capture_args();
        debug!("Starting ffmpeg {}", args.join(" "));
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .context("Failed to start ffmpeg; is it installed and on PATH?")?;
        let stdout = child
            .stdout
            .take()
            .context("ffmpeg stdout was not captured")?;

        let latest = Arc::new(Latest::default());
        let reader = {
            let latest = Arc::clone(&latest);
            std::thread::Builder::new()
                .name("ffmpeg-reader".into())
                .spawn(move || read_frames(stdout, dimensions, &latest))
                .context("Failed to spawn frame reader thread")?
        };

        info!("Capturing {} at {dimensions}", config.input);
        Ok(Self {
            latest,
            dimensions,
            child: Mutex::new(child),
            reader: Some(reader),
        })
    }

    /// Size of the frames produced.
    #[must_use]
    pub const fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Returns true once the stream has ended or failed.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.latest.ended.load(Ordering::Acquire)
    }
}

impl CaptureSource for FfmpegCapture {
    fn is_ready(&self) -> bool {
        !self.has_ended()
            && self
                .latest
                .frame
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    fn current_frame(&self) -> Option<Frame> {
        if self.has_ended() {
            return None;
        }
        self.latest
            .frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for FfmpegCapture {
    fn drop(&mut self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = child.kill() {
            debug!("ffmpeg already exited: {e}");
        }
        let _ = child.wait();
        drop(child);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Reads fixed-size `rgb24` frames until the pipe closes.
fn read_frames(mut stdout: impl Read, dimensions: FrameDimensions, latest: &Latest) {
    let frame_len = dimensions.width as usize * dimensions.height as usize * 3;
    let mut buffer = vec![0u8; frame_len];
    let mut sequence = 0u64;

    loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                info!("Capture stream ended after {sequence} frames");
                break;
            }
            Err(e) => {
                warn!("Capture stream failed: {e}");
                break;
            }
        }
        let Some(image) = RgbImage::from_raw(dimensions.width, dimensions.height, buffer.clone())
        else {
            warn!("Frame buffer does not match {dimensions}");
            break;
        };
        *latest.frame.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Frame::new(DynamicImage::ImageRgb8(image), sequence));
        sequence += 1;
    }

    latest.ended.store(true, Ordering::Release);
}

/// Reads the first video stream's size with `ffprobe`.
fn probe(config: &FfmpegConfig) -> Result<FrameDimensions> {
    let output = Command::new("ffprobe")
        .args(config.probe_args())
        .stdin(Stdio::null())
        .output()
        .context("Failed to run ffprobe; is it installed and on PATH?")?;
    if !output.status.success() {
        anyhow::bail!(
            "ffprobe could not open {}: {}",
            config.input,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Unexpected ffprobe output for {}", config.input))
}

/// Extracts the first stream's width and height from `ffprobe` JSON.
fn parse_probe(json: &str) -> Result<FrameDimensions> {
    let value: serde_json::Value = serde_json::from_str(json).context("Invalid JSON")?;
    let stream = &value["streams"][0];
    let dim = |key: &str| {
        stream[key]
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .with_context(|| format!("No video stream {key}"))
    };
    Ok(FrameDimensions::new(dim("width")?, dim("height")?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_capture_args_for_webcam() {
        let config = FfmpegConfig {
            input: "/dev/video0".into(),
            format: Some("v4l2".into()),
            size: Some(FrameDimensions::new(640, 480)),
        };
        let args = config.capture_args();
        let joined = args.join(" ");
        assert!(joined.contains("-f v4l2 -i /dev/video0"));
        assert!(joined.contains("-s 640x480"));
        assert!(joined.ends_with("-f rawvideo -pix_fmt rgb24 -"));
    }

    #[test]
    fn test_capture_args_native_size() {
        let args = FfmpegConfig::new("clip.mp4").capture_args();
        assert!(!args.contains(&"-s".to_string()));
        assert!(args.windows(2).any(|w| w == ["-i", "clip.mp4"]));
    }

    #[test]
    fn test_probe_args_put_input_last() {
        let args = FfmpegConfig::new("clip.mp4").probe_args();
        assert_eq!(args.last().unwrap(), "clip.mp4");
        assert!(args.windows(2).any(|w| w == ["-print_format", "json"]));
    }

    #[test]
    fn test_parse_probe() {
        let json = r#"{"streams":[{"index":0,"codec_type":"video","width":1280,"height":720}]}"#;
        assert_eq!(parse_probe(json).unwrap(), FrameDimensions::new(1280, 720));
        assert!(parse_probe(r#"{"streams":[]}"#).is_err());
        assert!(parse_probe("not json").is_err());
    }

    #[test]
    fn test_reader_keeps_latest_frame_and_marks_end() {
        let dims = FrameDimensions::new(2, 1);
        // Two frames: first all 1s, second all 2s, then a truncated third.
        let mut bytes = vec![1u8; 6];
        bytes.extend([2u8; 6]);
        bytes.extend([3u8; 2]);

        let latest = Latest::default();
        read_frames(Cursor::new(bytes), dims, &latest);

        let frame = latest.frame.lock().unwrap().clone().unwrap();
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.image().to_rgb8().get_pixel(0, 0).0, [2, 2, 2]);
        assert!(latest.ended.load(Ordering::Acquire));
    }
}
