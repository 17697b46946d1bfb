//! Live status line using indicatif.

use facemood_core::{LabelState, RunSummary, TickEvent, TickSink};
use indicatif::{ProgressBar, ProgressStyle};

/// Shows the current label on a spinner line.
#[derive(Clone)]
pub struct StatusLine {
    bar: ProgressBar,
    label: LabelState,
}

impl StatusLine {
    /// Creates a status line reading from `label`. A hidden line draws nothing.
    #[must_use]
    pub fn new(label: LabelState, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            let template = "{spinner:.green} [{elapsed_precise}] {msg}";
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                bar.set_style(style);
            }
            bar
        };
        let status = Self { bar, label };
        status.bar.set_message(status.message());
        status
    }

    /// Text currently shown.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Detected Emotion: {}", self.label.current())
    }

    /// Stops the spinner, leaving a final summary.
    pub fn finish(&self, summary: &RunSummary) {
        self.bar.finish_with_message(format!(
            "{} ({} ticks: {} completed, {} skipped, {} failed)",
            self.message(),
            summary.scheduled,
            summary.completed,
            summary.skipped,
            summary.failed
        ));
    }
}

impl TickSink for StatusLine {
    fn on_event(&self, event: TickEvent) {
        if let TickEvent::Failed { tick, .. } = event {
            self.bar.set_message(format!("{} (tick {tick} failed)", self.message()));
        } else {
            self.bar.set_message(self.message());
        }
        self.bar.tick();
    }
}
