//! Shared types between the drafting engine and the browser UI
//!
//! These types are used by both:
//! - the autosave controller and drafting session (native Rust)
//! - the drafting page (TypeScript, via ts-rs bindings)
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// ============================================================================
// Verses
// ============================================================================

/// Verse number within a chapter (1-based, contiguous)
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, TS,
)]
#[serde(transparent)]
#[ts(export, export_to = "drafting.ts")]
pub struct VerseId(pub u32);

impl VerseId {
    pub const FIRST: VerseId = VerseId(1);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u32> for VerseId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for VerseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A verse of the source text being translated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "drafting.ts")]
pub struct SourceVerse {
    pub verse_number: VerseId,
    pub text: String,
}

/// A drafted (target language) verse. `content` may be empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "drafting.ts")]
pub struct TargetVerse {
    pub verse_number: VerseId,
    pub content: String,
}

impl TargetVerse {
    pub fn new(verse_number: impl Into<VerseId>, content: impl Into<String>) -> Self {
        Self {
            verse_number: verse_number.into(),
            content: content.into(),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

// ============================================================================
// Autosave status
// ============================================================================

/// Point-in-time autosave status for one verse.
///
/// The UI polls this to render the saving spinner and failure indicator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "drafting.ts")]
pub struct SaveStatus {
    pub has_pending_debounce: bool,
    pub is_actively_saving: bool,
    pub has_retry_scheduled: bool,
    pub has_unsaved_changes: bool,
    /// True iff a save is in flight
    pub show_loader: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Message of the most recent failed save, cleared by the next success
    pub last_error: Option<String>,
}

// ============================================================================
// Drafting session
// ============================================================================

/// Serializable view of a drafting session's navigation state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "drafting.ts")]
pub struct DraftingSnapshot {
    pub session_id: String,
    pub read_only: bool,
    pub active_verse_id: VerseId,
    pub previous_active_verse_id: Option<VerseId>,
    /// Ascending
    pub revealed_verses: Vec<VerseId>,
    pub verses: Vec<TargetVerse>,
    pub last_revealed_verse_has_content: bool,
    /// Every source verse has non-empty target content
    pub complete: bool,
}

// ============================================================================
// Tests
// ============================================================================
