//! Filesystem capture sources: a directory of frames played back on a clock,
//! and single still images.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use facemood_core::{CaptureSource, Frame};
use tracing::{debug, warn};

/// Supported frame extensions.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Default time each frame stays current.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Plays a directory of image files back as a live feed.
///
/// Frames are ordered by file name. The current frame is picked from the time
/// elapsed since construction, so a slow consumer skips frames rather than
/// falling behind.
pub struct FsFrameSource {
    files: Vec<PathBuf>,
    interval: Duration,
    looping: bool,
    started: Instant,
    cache: Mutex<Option<(usize, Frame)>>,
}

impl FsFrameSource {
    /// Creates a source over every supported image in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or holds no frames.
    pub fn open(dir: &Path, interval: Duration, looping: bool) -> Result<Self> {
        let files = collect_frames(dir)?;
        if files.is_empty() {
            anyhow::bail!("No frames found in {}", dir.display());
        }
        debug!("Found {} frames in {}", files.len(), dir.display());
        Ok(Self::from_files(files, interval, looping))
    }

    /// Creates a source over an explicit, already ordered list of files.
    #[must_use]
    pub fn from_files(files: Vec<PathBuf>, interval: Duration, looping: bool) -> Self {
        Self {
            files,
            interval: interval.max(Duration::from_millis(1)),
            looping,
            started: Instant::now(),
            cache: Mutex::new(None),
        }
    }

    /// Number of frames in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the sequence is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File index shown `elapsed` after start, or `None` once a non-looping
    /// sequence has run out.
    #[must_use]
    pub fn index_at(&self, elapsed: Duration) -> Option<usize> {
        if self.files.is_empty() {
            return None;
        }
        let step = usize::try_from(elapsed.as_nanos() / self.interval.as_nanos()).ok()?;
        if self.looping {
            Some(step % self.files.len())
        } else {
            (step < self.files.len()).then_some(step)
        }
    }

    fn frame_at(&self, elapsed: Duration) -> Option<Frame> {
        let index = self.index_at(elapsed)?;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, frame)) = cache.as_ref() {
            if *cached == index {
                return Some(frame.clone());
            }
        }

        let sequence =
            u64::try_from(elapsed.as_nanos() / self.interval.as_nanos()).unwrap_or(u64::MAX);
        match load_frame(&self.files[index], sequence) {
            Ok(frame) => {
                *cache = Some((index, frame.clone()));
                Some(frame)
            }
            Err(e) => {
                warn!("{e:#}");
                None
            }
        }
    }
}

impl CaptureSource for FsFrameSource {
    fn is_ready(&self) -> bool {
        self.index_at(self.started.elapsed()).is_some()
    }

    fn current_frame(&self) -> Option<Frame> {
        self.frame_at(self.started.elapsed())
    }
}

/// A capture source that always serves the same image.
pub struct StillImage {
    frame: Frame,
    path: PathBuf,
}

impl StillImage {
    /// Loads an image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoded.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            frame: load_frame(path, 0)?,
            path: path.to_path_buf(),
        })
    }

    /// Path the image was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded frame.
    #[must_use]
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl CaptureSource for StillImage {
    fn is_ready(&self) -> bool {
        true
    }

    fn current_frame(&self) -> Option<Frame> {
        Some(self.frame.clone())
    }
}

/// Lists supported images in a directory, sorted by file name.
fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Checks if a path has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.as_str()))
}

/// Loads an image file as a frame.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or decoded.
pub fn load_frame(path: &Path, sequence: u64) -> Result<Frame> {
    let image =
        image::open(path).with_context(|| format!("Failed to open image: {}", path.display()))?;
    Ok(Frame::new(image, sequence))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use facemood_core::FrameDimensions;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_frames(dir: &Path, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            let shade = u8::try_from(i * 40).unwrap();
            RgbImage::from_pixel(8, 6, Rgb([shade, 0, 0]))
                .save(dir.join(name))
                .unwrap();
        }
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("frame.png")));
        assert!(is_supported_image(Path::new("frame.JPG")));
        assert!(is_supported_image(Path::new("frame.webp")));
        assert!(!is_supported_image(Path::new("frame.txt")));
        assert!(!is_supported_image(Path::new("frame")));
    }

    #[test]
    fn test_frames_are_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        write_frames(dir.path(), &["b.png", "a.png", "c.png"]);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let files = collect_frames(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = FsFrameSource::open(dir.path(), DEFAULT_FRAME_INTERVAL, false)
            .err()
            .unwrap();
        assert!(err.to_string().contains("No frames found"));
    }

    #[test]
    fn test_index_follows_clock() {
        let files = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];
        let once = FsFrameSource::from_files(files.clone(), Duration::from_millis(10), false);
        assert_eq!(once.index_at(Duration::ZERO), Some(0));
        assert_eq!(once.index_at(Duration::from_millis(25)), Some(2));
        assert_eq!(once.index_at(Duration::from_millis(30)), None);

        let looped = FsFrameSource::from_files(files, Duration::from_millis(10), true);
        assert_eq!(looped.index_at(Duration::from_millis(30)), Some(0));
        assert_eq!(looped.index_at(Duration::from_millis(51)), Some(2));
    }

    #[test]
    fn test_frame_is_decoded_and_cached() {
        let dir = TempDir::new().unwrap();
        write_frames(dir.path(), &["0001.png", "0002.png"]);
        let source = FsFrameSource::open(dir.path(), Duration::from_secs(3600), false).unwrap();

        assert!(source.is_ready());
        let first = source.current_frame().unwrap();
        assert_eq!(first.dimensions(), FrameDimensions::new(8, 6));

        // Deleting the file proves the second read is served from cache.
        std::fs::remove_file(dir.path().join("0001.png")).unwrap();
        assert!(source.current_frame().is_some());
    }

    #[test]
    fn test_unreadable_frame_yields_none() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let source = FsFrameSource::open(dir.path(), Duration::from_secs(3600), false).unwrap();
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn test_still_image_is_always_ready() {
        let dir = TempDir::new().unwrap();
        write_frames(dir.path(), &["face.png"]);
        let still = StillImage::open(&dir.path().join("face.png")).unwrap();
        assert!(still.is_ready());
        assert_eq!(still.current_frame().unwrap().dimensions(), FrameDimensions::new(8, 6));
        assert!(StillImage::open(&dir.path().join("missing.png")).is_err());
    }
}
