//! Saves annotated frames as PNG files.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use facemood_core::{Frame, RasterOverlay, TickEvent, TickSink};
use tracing::{debug, warn};

/// Writes each completed tick's frame with the overlay laid on top.
pub struct FrameWriter {
    dir: PathBuf,
    overlay: Arc<Mutex<RasterOverlay>>,
}

impl FrameWriter {
    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: &Path, overlay: Arc<Mutex<RasterOverlay>>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            overlay,
        })
    }

    /// Saves `frame` with the current overlay as `<name>.png`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, name: &str, frame: &Frame) -> Result<PathBuf> {
        let composite = self
            .overlay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .composite(frame);
        let path = self.dir.join(format!("{name}.png"));
        composite
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved {}", path.display());
        Ok(path)
    }
}

impl TickSink for FrameWriter {
    fn on_event(&self, event: TickEvent) {
        if let TickEvent::Completed { report } = event {
            if let Err(e) = self.save(&format!("frame-{:06}", report.tick), &report.frame) {
                warn!("{e:#}");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use facemood_core::{FrameDimensions, Keypoint, OverlaySurface};
    use facemood_test_support::FrameBuilder;

    #[test]
    fn test_save_composites_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let overlay = Arc::new(Mutex::new(RasterOverlay::default()));
        {
            let mut surface = overlay.lock().unwrap();
            surface.resize(FrameDimensions::new(16, 16));
            surface.draw_marker(&Keypoint::new(8.0, 8.0));
        }

        let writer = FrameWriter::new(&dir.path().join("out"), overlay).unwrap();
        let path = writer.save("frame-000001", &FrameBuilder::blank(16, 16)).unwrap();

        let saved = image::open(&path).unwrap().to_rgba8();
        assert_eq!(saved.get_pixel(8, 8).0, [0, 255, 0, 255]);
        assert_eq!(saved.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}
