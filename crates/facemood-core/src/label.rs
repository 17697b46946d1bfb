//! Shared emotion label state.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::domain::EmotionLabel;

/// What a tick does when the classifier matches no branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPolicy {
    /// Keep the previously published label.
    #[default]
    Hold,
    /// Publish `Unset`.
    Reset,
}

#[derive(Debug, Default)]
struct Slot {
    label: EmotionLabel,
    updates: u64,
}

/// The current emotion label, shared between the loop and whatever renders it.
///
/// Writers never coordinate: the last `publish` wins and no history is kept.
/// Clones refer to the same slot.
#[derive(Debug, Clone, Default)]
pub struct LabelState {
    slot: Arc<RwLock<Slot>>,
}

impl LabelState {
    /// Creates a state holding `Unset`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the label. Returns the label it replaced.
    pub fn publish(&self, label: EmotionLabel) -> EmotionLabel {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.updates += 1;
        std::mem::replace(&mut slot.label, label)
    }

    /// Returns the current label.
    #[must_use]
    pub fn current(&self) -> EmotionLabel {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).label
    }

    /// Number of `publish` calls so far.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).updates
    }
}
