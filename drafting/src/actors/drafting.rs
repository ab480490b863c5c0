//! DraftingActor - serializes edits and navigation for one open chapter.
//!
//! The actor owns a `DraftingSession` (and through it the chapter's
//! `SaveController`). Text changes are fire-and-forget casts; navigation
//! messages reply once the verse being left has been flushed. Messages that
//! arrive during a flush wait in the mailbox and are applied in order.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{DraftingSnapshot, SaveStatus, SourceVerse, TargetVerse, VerseId};
use std::sync::Arc;

use crate::autosave::{SaveController, SaveError};
use crate::config::AutosaveConfig;
use crate::saver::VerseSaver;
use crate::session::DraftingSession;

#[derive(Debug, Default)]
pub struct DraftingActor;

#[derive(Clone)]
pub struct DraftingArguments {
    pub chapter_id: String,
    pub autosave: AutosaveConfig,
    pub saver: Arc<dyn VerseSaver>,
    pub source_verses: Vec<SourceVerse>,
    pub target_verses: Vec<TargetVerse>,
    pub read_only: bool,
}

pub struct DraftingState {
    chapter_id: String,
    session: DraftingSession,
}

type NavigationReply = RpcReplyPort<Result<DraftingSnapshot, DraftingError>>;

#[derive(Debug)]
pub enum DraftingMsg {
    /// User typed into a verse.
    TextChanged { verse_id: VerseId, text: String },
    /// User focused a different verse.
    SetActiveVerse {
        verse_id: VerseId,
        reply: NavigationReply,
    },
    AdvanceToVerse {
        verse_id: VerseId,
        verse_to_flush: Option<VerseId>,
        reply: NavigationReply,
    },
    MoveToNextVerse { reply: NavigationReply },
    RevealNextVerse { reply: NavigationReply },
    GetSnapshot { reply: RpcReplyPort<DraftingSnapshot> },
    GetSaveStatus {
        verse_id: VerseId,
        reply: RpcReplyPort<SaveStatus>,
    },
    /// Flush all unsaved verses, reply, then stop the actor.
    Close { reply: NavigationReply },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DraftingError {
    #[error("save failed: {0}")]
    Save(#[from] SaveError),
    #[error("actor unavailable: {0}")]
    ActorUnavailable(String),
}

#[async_trait]
impl Actor for DraftingActor {
    type Msg = DraftingMsg;
    type State = DraftingState;
    type Arguments = DraftingArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let controller = SaveController::new(args.autosave, args.saver);
        let session = DraftingSession::initialize(
            controller,
            &args.source_verses,
            &args.target_verses,
            args.read_only,
        );
        tracing::info!(
            actor_id = %myself.get_id(),
            chapter_id = %args.chapter_id,
            session_id = %session.session_id(),
            "DraftingActor starting"
        );
        Ok(DraftingState {
            chapter_id: args.chapter_id,
            session,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DraftingMsg::TextChanged { verse_id, text } => {
                state.session.handle_text_change(verse_id, text);
            }
            DraftingMsg::SetActiveVerse { verse_id, reply } => {
                let result = state.session.handle_active_verse_change(verse_id).await;
                Self::reply_navigation(state, result, reply);
            }
            DraftingMsg::AdvanceToVerse {
                verse_id,
                verse_to_flush,
                reply,
            } => {
                let result = state
                    .session
                    .advance_to_verse(verse_id, verse_to_flush)
                    .await;
                Self::reply_navigation(state, result, reply);
            }
            DraftingMsg::MoveToNextVerse { reply } => {
                let result = state.session.move_to_next_verse().await;
                Self::reply_navigation(state, result, reply);
            }
            DraftingMsg::RevealNextVerse { reply } => {
                let result = state.session.reveal_next_verse().await;
                Self::reply_navigation(state, result, reply);
            }
            DraftingMsg::GetSnapshot { reply } => {
                let _ = reply.send(state.session.snapshot());
            }
            DraftingMsg::GetSaveStatus { verse_id, reply } => {
                let _ = reply.send(state.session.save_status(verse_id));
            }
            DraftingMsg::Close { reply } => {
                let result = state.session.close().await;
                Self::reply_navigation(state, result, reply);
                myself.stop(Some("chapter closed".to_string()));
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.session.controller().shutdown();
        tracing::info!(
            actor_id = %myself.get_id(),
            chapter_id = %state.chapter_id,
            unsaved = state.session.controller().unsaved_verses().len(),
            "DraftingActor stopped"
        );
        Ok(())
    }
}

impl DraftingActor {
    fn reply_navigation(
        state: &DraftingState,
        result: Result<(), SaveError>,
        reply: NavigationReply,
    ) {
        if let Err(err) = &result {
            tracing::warn!(
                chapter_id = %state.chapter_id,
                active_verse_id = %state.session.active_verse_id(),
                error = %err,
                "Navigation aborted by failed save"
            );
        }
        let _ = reply.send(
            result
                .map(|()| state.session.snapshot())
                .map_err(DraftingError::from),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saver::MemoryVerseSaver;

    fn source(count: u32) -> Vec<SourceVerse> {
        (1..=count)
            .map(|n| SourceVerse {
                verse_number: VerseId(n),
                text: format!("source {n}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_drafting_actor_reports_initial_snapshot() {
        let (actor, handle) = Actor::spawn(
            None,
            DraftingActor,
            DraftingArguments {
                chapter_id: "gen-1".to_string(),
                autosave: AutosaveConfig::default(),
                saver: Arc::new(MemoryVerseSaver::new()),
                source_verses: source(3),
                target_verses: vec![TargetVerse::new(1, "In the beginning")],
                read_only: false,
            },
        )
        .await
        .expect("spawn drafting actor");

        let snapshot = ractor::call!(actor, |reply| DraftingMsg::GetSnapshot { reply })
            .expect("snapshot call");
        assert_eq!(snapshot.active_verse_id, VerseId(1));
        assert_eq!(snapshot.revealed_verses, vec![VerseId(1)]);
        assert!(snapshot.last_revealed_verse_has_content);

        actor.stop(None);
        handle.await.expect("actor joins");
    }
}
