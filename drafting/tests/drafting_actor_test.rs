//! DraftingActor integration tests
//!
//! Drives a spawned actor through casts and calls the way a UI host would.

use drafting::actors::{DraftingActor, DraftingArguments, DraftingError, DraftingMsg};
use drafting::config::AutosaveConfig;
use drafting::saver::{FnVerseSaver, MemoryVerseSaver, VerseSaver};
use drafting::SaveError;
use ractor::{Actor, ActorRef};
use shared_types::{SourceVerse, TargetVerse, VerseId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

fn source(count: u32) -> Vec<SourceVerse> {
    (1..=count)
        .map(|n| SourceVerse {
            verse_number: VerseId(n),
            text: format!("source {n}"),
        })
        .collect()
}

fn fast_autosave() -> AutosaveConfig {
    AutosaveConfig::default()
        .with_debounce_ms(20)
        .with_retry_delay_ms(50)
}

async fn spawn_drafting(
    saver: Arc<dyn VerseSaver>,
    targets: Vec<TargetVerse>,
    read_only: bool,
) -> (ActorRef<DraftingMsg>, JoinHandle<()>) {
    Actor::spawn(
        None,
        DraftingActor,
        DraftingArguments {
            chapter_id: "gen-1".to_string(),
            autosave: fast_autosave(),
            saver,
            source_verses: source(3),
            target_verses: targets,
            read_only,
        },
    )
    .await
    .expect("spawn drafting actor")
}

#[tokio::test]
async fn test_typing_then_next_saves_and_advances() {
    let memory = Arc::new(MemoryVerseSaver::new());
    let (actor, handle) = spawn_drafting(memory.clone(), vec![], false).await;

    actor
        .cast(DraftingMsg::TextChanged {
            verse_id: VerseId(1),
            text: "In the beginning".to_string(),
        })
        .expect("cast text");
    let snapshot = ractor::call!(actor, |reply| DraftingMsg::MoveToNextVerse { reply })
        .expect("call")
        .expect("navigation succeeds");

    assert_eq!(snapshot.active_verse_id, VerseId(2));
    assert_eq!(snapshot.previous_active_verse_id, Some(VerseId(1)));
    assert_eq!(snapshot.revealed_verses, vec![VerseId(1), VerseId(2)]);
    assert_eq!(
        memory.saved().get(&VerseId(1)).map(String::as_str),
        Some("In the beginning")
    );

    let closed = ractor::call!(actor, |reply| DraftingMsg::Close { reply })
        .expect("call")
        .expect("close succeeds");
    assert_eq!(closed.active_verse_id, VerseId(2));
    handle.await.expect("actor stops after close");
}

#[tokio::test]
async fn test_debounced_edit_lands_without_navigation() {
    let memory = Arc::new(MemoryVerseSaver::new());
    let (actor, handle) = spawn_drafting(memory.clone(), vec![], false).await;

    for text in ["In", "In the", "In the beginning"] {
        actor
            .cast(DraftingMsg::TextChanged {
                verse_id: VerseId(1),
                text: text.to_string(),
            })
            .expect("cast text");
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = ractor::call!(actor, |reply| DraftingMsg::GetSaveStatus {
        verse_id: VerseId(1),
        reply
    })
    .expect("status call");
    assert!(!status.has_unsaved_changes);
    assert!(status.last_saved_at.is_some());
    assert_eq!(memory.write_count(), 1);
    assert_eq!(
        memory.saved().get(&VerseId(1)).map(String::as_str),
        Some("In the beginning")
    );

    actor.stop(None);
    handle.await.expect("actor joins");
}

#[tokio::test]
async fn test_failed_flush_keeps_verse_active_until_retry_lands() {
    let failures_left = Arc::new(AtomicUsize::new(1));
    let saver = {
        let failures_left = failures_left.clone();
        FnVerseSaver::new(move |_verse_id: VerseId, _text: String| {
            let failed = failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            async move {
                if failed {
                    Err(SaveError::Transport("connection reset".to_string()))
                } else {
                    Ok(())
                }
            }
        })
    };
    let (actor, handle) = spawn_drafting(Arc::new(saver), vec![], false).await;

    actor
        .cast(DraftingMsg::TextChanged {
            verse_id: VerseId(1),
            text: "Hello".to_string(),
        })
        .expect("cast text");
    let result = ractor::call!(actor, |reply| DraftingMsg::MoveToNextVerse { reply })
        .expect("call");
    assert_eq!(
        result,
        Err(DraftingError::Save(SaveError::Transport(
            "connection reset".to_string()
        )))
    );

    let snapshot = ractor::call!(actor, |reply| DraftingMsg::GetSnapshot { reply })
        .expect("snapshot call");
    assert_eq!(snapshot.active_verse_id, VerseId(1));
    assert_eq!(snapshot.revealed_verses, vec![VerseId(1)]);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let status = ractor::call!(actor, |reply| DraftingMsg::GetSaveStatus {
        verse_id: VerseId(1),
        reply
    })
    .expect("status call");
    assert!(!status.has_unsaved_changes);
    assert!(status.last_error.is_none());

    let snapshot = ractor::call!(actor, |reply| DraftingMsg::MoveToNextVerse { reply })
        .expect("call")
        .expect("navigation succeeds after retry");
    assert_eq!(snapshot.active_verse_id, VerseId(2));

    actor.stop(None);
    handle.await.expect("actor joins");
}

#[tokio::test]
async fn test_close_flushes_every_pending_verse() {
    let memory = Arc::new(MemoryVerseSaver::new());
    let (actor, handle) = spawn_drafting(
        memory.clone(),
        vec![TargetVerse::new(1, "a"), TargetVerse::new(2, "b")],
        false,
    )
    .await;

    actor
        .cast(DraftingMsg::TextChanged {
            verse_id: VerseId(2),
            text: "b revised".to_string(),
        })
        .expect("cast text");
    let snapshot = ractor::call!(actor, |reply| DraftingMsg::Close { reply })
        .expect("call")
        .expect("close succeeds");

    assert_eq!(snapshot.active_verse_id, VerseId(2));
    assert_eq!(
        memory.saved().get(&VerseId(2)).map(String::as_str),
        Some("b revised")
    );
    assert_eq!(memory.write_count(), 1);
    handle.await.expect("actor stops after close");
}

#[tokio::test]
async fn test_read_only_actor_never_saves() {
    let memory = Arc::new(MemoryVerseSaver::new());
    let (actor, handle) = spawn_drafting(memory.clone(), vec![TargetVerse::new(1, "a")], true).await;

    actor
        .cast(DraftingMsg::TextChanged {
            verse_id: VerseId(1),
            text: "edited".to_string(),
        })
        .expect("cast text");
    let snapshot = ractor::call!(actor, |reply| DraftingMsg::Close { reply })
        .expect("call")
        .expect("close succeeds");

    assert!(snapshot.read_only);
    assert_eq!(
        snapshot.revealed_verses,
        vec![VerseId(1), VerseId(2), VerseId(3)]
    );
    assert_eq!(memory.write_count(), 0);
    handle.await.expect("actor stops after close");
}
