//! Autosave error and attempt-origin types.

use serde::{Deserialize, Serialize};

/// Failure reported by a [`crate::saver::VerseSaver`].
///
/// The controller treats every variant the same way; the split only exists so
/// callers can render a useful message.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Save rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for SaveError {
    fn from(e: reqwest::Error) -> Self {
        SaveError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Serialization(e.to_string())
    }
}

/// What started a save attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveOrigin {
    Debounce,
    Immediate,
    Retry,
}

impl SaveOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveOrigin::Debounce => "debounce",
            SaveOrigin::Immediate => "immediate",
            SaveOrigin::Retry => "retry",
        }
    }

    /// Only first-time failures earn a retry; a failed retry is terminal.
    pub(crate) fn schedules_retry(self) -> bool {
        !matches!(self, SaveOrigin::Retry)
    }
}
