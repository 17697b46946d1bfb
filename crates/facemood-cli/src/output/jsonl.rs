//! JSON Lines output adapter.

use anyhow::Result;
use facemood_core::{TickEvent, TickReport, TickSink};
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::warn;

use super::iso_timestamp;

/// One output line per tick.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Line<'a> {
    Tick {
        time: String,
        #[serde(flatten)]
        report: &'a TickReport,
    },
    Failed {
        time: String,
        tick: u64,
        error: &'a str,
    },
}

/// JSON Lines output adapter.
pub struct JsonlOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Writes one value as a single line and flushes.
    #[allow(clippy::significant_drop_tightening)]
    pub fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        writer.flush()?;
        Ok(())
    }
}

impl TickSink for JsonlOutput {
    fn on_event(&self, event: TickEvent) {
        let result = match &event {
            TickEvent::Completed { report } => self.write(&Line::Tick {
                time: iso_timestamp(),
                report,
            }),
            TickEvent::Failed { tick, error } => self.write(&Line::Failed {
                time: iso_timestamp(),
                tick: *tick,
                error,
            }),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("Failed to write tick output: {e:#}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use facemood_core::{EmotionLabel, FrameDimensions, SkipReason};
    use facemood_test_support::FrameBuilder;
    use std::sync::Arc;

    /// Writer that appends to a shared buffer.
    #[derive(Clone, Default)]
    struct Shared(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn lines(&self) -> Vec<serde_json::Value> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    fn report() -> TickReport {
        TickReport {
            tick: 3,
            frame_sequence: 7,
            dimensions: FrameDimensions::new(640, 480),
            faces: 1,
            markers: 468,
            classified: Some(EmotionLabel::Happy),
            label: EmotionLabel::Happy,
            metrics: None,
            estimate_ms: 12.5,
            frame: FrameBuilder::blank(1, 1),
        }
    }

    #[test]
    fn test_completed_tick_line() {
        let buffer = Shared::default();
        let output = JsonlOutput::new(Box::new(buffer.clone()));
        output.on_event(TickEvent::Completed { report: report() });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["event"], "tick");
        assert_eq!(line["tick"], 3);
        assert_eq!(line["label"], "happy");
        assert_eq!(line["dimensions"]["width"], 640);
        assert!(line["time"].as_str().unwrap().contains('T'));
        assert!(line.get("frame").is_none());
    }

    #[test]
    fn test_failed_tick_line() {
        let buffer = Shared::default();
        let output = JsonlOutput::new(Box::new(buffer.clone()));
        output.on_event(TickEvent::Failed {
            tick: 4,
            error: "estimator crashed".into(),
        });

        let lines = buffer.lines();
        assert_eq!(lines[0]["event"], "failed");
        assert_eq!(lines[0]["error"], "estimator crashed");
    }

    #[test]
    fn test_skipped_tick_writes_nothing() {
        let buffer = Shared::default();
        let output = JsonlOutput::new(Box::new(buffer.clone()));
        output.on_event(TickEvent::Skipped {
            tick: 1,
            reason: SkipReason::NotReady,
        });
        assert!(buffer.lines().is_empty());
    }
}
