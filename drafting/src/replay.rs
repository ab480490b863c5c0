//! Scripted drafting sessions.
//!
//! A replay script describes a chapter and a sequence of user actions. The
//! `drafting` binary uses it to drive a `DraftingActor` end to end against
//! either the REST backend or the in-memory saver.

use ractor::Actor;
use serde::{Deserialize, Serialize};
use shared_types::{DraftingSnapshot, SourceVerse, TargetVerse, VerseId};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::{DraftingActor, DraftingArguments, DraftingError, DraftingMsg};
use crate::config::AutosaveConfig;
use crate::saver::VerseSaver;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayScript {
    pub chapter_id: String,
    #[serde(default)]
    pub read_only: bool,
    pub source_verses: Vec<SourceVerse>,
    #[serde(default)]
    pub target_verses: Vec<TargetVerse>,
    #[serde(default)]
    pub steps: Vec<ReplayStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReplayStep {
    Type { verse_id: VerseId, text: String },
    Wait { ms: u64 },
    Select { verse_id: VerseId },
    Advance {
        verse_id: VerseId,
        #[serde(default)]
        flush: Option<VerseId>,
    },
    Next,
    Reveal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedStep {
    /// Step index; `None` for the final close
    pub step: Option<usize>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub snapshot: DraftingSnapshot,
    pub failed_steps: Vec<FailedStep>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid replay script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to start drafting actor: {0}")]
    Spawn(String),
    #[error(transparent)]
    Drafting(#[from] DraftingError),
}

impl ReplayScript {
    pub fn from_json_str(content: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

/// Run `script` to completion and close the chapter.
///
/// Failed navigation steps are recorded and the replay continues, the way a
/// user would stay on the current verse and keep typing.
pub async fn run_script(
    script: ReplayScript,
    autosave: AutosaveConfig,
    saver: Arc<dyn VerseSaver>,
) -> Result<ReplayOutcome, ReplayError> {
    let (actor, handle) = Actor::spawn(
        None,
        DraftingActor,
        DraftingArguments {
            chapter_id: script.chapter_id.clone(),
            autosave,
            saver,
            source_verses: script.source_verses,
            target_verses: script.target_verses,
            read_only: script.read_only,
        },
    )
    .await
    .map_err(|e| ReplayError::Spawn(e.to_string()))?;

    let mut failed_steps = Vec::new();
    for (index, step) in script.steps.into_iter().enumerate() {
        tracing::debug!(step = index, ?step, "Replaying step");
        let result = match step {
            ReplayStep::Type { verse_id, text } => actor
                .cast(DraftingMsg::TextChanged { verse_id, text })
                .map_err(|e| DraftingError::ActorUnavailable(e.to_string())),
            ReplayStep::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            ReplayStep::Select { verse_id } => {
                flatten(ractor::call!(actor, |reply| DraftingMsg::SetActiveVerse {
                    verse_id,
                    reply
                }))
            }
            ReplayStep::Advance { verse_id, flush } => {
                flatten(ractor::call!(actor, |reply| DraftingMsg::AdvanceToVerse {
                    verse_id,
                    verse_to_flush: flush,
                    reply
                }))
            }
            ReplayStep::Next => flatten(ractor::call!(actor, |reply| {
                DraftingMsg::MoveToNextVerse { reply }
            })),
            ReplayStep::Reveal => flatten(ractor::call!(actor, |reply| {
                DraftingMsg::RevealNextVerse { reply }
            })),
        };
        if let Err(err) = result {
            tracing::warn!(step = index, error = %err, "Replay step failed");
            failed_steps.push(FailedStep {
                step: Some(index),
                error: err.to_string(),
            });
        }
    }

    let before_close = ractor::call!(actor, |reply| DraftingMsg::GetSnapshot { reply })
        .map_err(|e| DraftingError::ActorUnavailable(e.to_string()))?;
    let snapshot = match ractor::call!(actor, |reply| DraftingMsg::Close { reply }) {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(err)) => {
            failed_steps.push(FailedStep {
                step: None,
                error: err.to_string(),
            });
            before_close
        }
        Err(err) => return Err(DraftingError::ActorUnavailable(err.to_string()).into()),
    };
    let _ = handle.await;

    Ok(ReplayOutcome {
        snapshot,
        failed_steps,
    })
}

fn flatten<T, E: std::fmt::Display>(
    result: Result<Result<T, DraftingError>, E>,
) -> Result<(), DraftingError> {
    match result {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(err),
        Err(err) => Err(DraftingError::ActorUnavailable(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_parses_tagged_steps() {
        let script = ReplayScript::from_json_str(
            r#"{
                "chapter_id": "gen-1",
                "source_verses": [
                    {"verse_number": 1, "text": "In principio"},
                    {"verse_number": 2, "text": "Terra autem"}
                ],
                "steps": [
                    {"action": "type", "verse_id": 1, "text": "In the beginning"},
                    {"action": "wait", "ms": 2500},
                    {"action": "next"},
                    {"action": "advance", "verse_id": 2},
                    {"action": "reveal"}
                ]
            }"#,
        )
        .expect("script parses");

        assert!(!script.read_only);
        assert!(script.target_verses.is_empty());
        assert_eq!(script.steps.len(), 5);
        assert_eq!(
            script.steps[3],
            ReplayStep::Advance {
                verse_id: VerseId(2),
                flush: None
            }
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let err = ReplayScript::from_json_str(
            r#"{"chapter_id": "x", "source_verses": [], "steps": [{"action": "teleport"}]}"#,
        )
        .expect_err("unknown action");
        assert!(matches!(err, ReplayError::Parse(_)));
    }
}
