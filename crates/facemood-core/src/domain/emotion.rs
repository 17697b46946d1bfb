//! Emotion labels.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse emotion label derived from a face's landmark distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EmotionLabel {
    /// No label has been produced yet.
    #[default]
    Unset,
    /// Wide lip gap.
    Happy,
    /// Moderate lip gap.
    Neutral,
    /// Closed lips with widely spaced brow landmarks.
    Angry,
}

impl EmotionLabel {
    /// Returns the display text for this label. `Unset` is the empty string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Happy => "Happy",
            Self::Neutral => "Neutral",
            Self::Angry => "Angry",
        }
    }

    /// Returns true unless the label is `Unset`.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
