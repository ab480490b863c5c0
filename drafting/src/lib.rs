//! Verse drafting engine
//!
//! Per-verse autosave (debounce, forced save, retry-once, sequence-number
//! staleness control) and the verse navigation / progressive reveal session
//! built on top of it.

pub mod actors;
pub mod autosave;
pub mod config;
pub mod replay;
pub mod saver;
pub mod session;

pub use autosave::{SaveController, SaveError};
pub use session::DraftingSession;
