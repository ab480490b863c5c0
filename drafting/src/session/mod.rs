//! Verse navigation and progressive reveal for one drafting chapter.
//!
//! The session decides which verse is active and which verses are visible,
//! and flushes the verse being left through the [`SaveController`] before
//! focus moves on. All persistence is delegated to the controller.

use shared_types::{DraftingSnapshot, SaveStatus, SourceVerse, TargetVerse, VerseId};
use std::collections::BTreeSet;
use ulid::Ulid;

use crate::autosave::{SaveController, SaveError};

pub struct DraftingSession {
    session_id: Ulid,
    controller: SaveController,
    source_verse_count: usize,
    /// Ordered by verse number
    verses: Vec<TargetVerse>,
    active_verse_id: VerseId,
    previous_active_verse_id: Option<VerseId>,
    revealed_verses: BTreeSet<VerseId>,
    read_only: bool,
}

impl DraftingSession {
    pub fn initialize(
        controller: SaveController,
        source_verses: &[SourceVerse],
        target_verses: &[TargetVerse],
        read_only: bool,
    ) -> Self {
        let session_id = Ulid::new();
        let mut verses: Vec<TargetVerse> = target_verses.to_vec();
        verses.sort_by_key(|verse| verse.verse_number);
        verses.dedup_by_key(|verse| verse.verse_number);

        if !read_only {
            for verse in &verses {
                controller.set_initial_content(verse.verse_number, verse.content.clone());
            }
        }

        let all_drafted = !source_verses.is_empty()
            && source_verses.iter().all(|source| {
                verses
                    .iter()
                    .any(|target| target.verse_number == source.verse_number && target.has_content())
            });
        let resume_point = verses
            .iter()
            .rev()
            .find(|verse| verse.has_content())
            .map(|verse| verse.verse_number);
        let active_verse_id = match resume_point {
            Some(verse_id) if !all_drafted => verse_id,
            _ => VerseId::FIRST,
        };

        let revealed_verses: BTreeSet<VerseId> = if read_only {
            source_verses.iter().map(|verse| verse.verse_number).collect()
        } else {
            let through = resume_point.map_or(0, VerseId::get);
            (1..=through)
                .map(VerseId)
                .chain(std::iter::once(active_verse_id))
                .collect()
        };

        let mut session = Self {
            session_id,
            controller,
            source_verse_count: source_verses.len(),
            verses,
            active_verse_id,
            previous_active_verse_id: None,
            revealed_verses,
            read_only,
        };
        if !read_only {
            session.ensure_verse(active_verse_id);
        }

        tracing::info!(
            session_id = %session.session_id,
            source_verses = session.source_verse_count,
            active_verse_id = %session.active_verse_id,
            revealed = session.revealed_verses.len(),
            read_only,
            "Drafting session initialized"
        );
        session
    }

    pub fn session_id(&self) -> Ulid {
        self.session_id
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn verses(&self) -> &[TargetVerse] {
        &self.verses
    }

    pub fn active_verse_id(&self) -> VerseId {
        self.active_verse_id
    }

    pub fn previous_active_verse_id(&self) -> Option<VerseId> {
        self.previous_active_verse_id
    }

    pub fn revealed_verses(&self) -> &BTreeSet<VerseId> {
        &self.revealed_verses
    }

    pub fn controller(&self) -> &SaveController {
        &self.controller
    }

    pub fn verse_content(&self, verse_id: VerseId) -> Option<&str> {
        self.verse(verse_id).map(|verse| verse.content.as_str())
    }

    pub fn last_revealed_verse_id(&self) -> Option<VerseId> {
        self.revealed_verses.last().copied()
    }

    pub fn last_revealed_verse_has_content(&self) -> bool {
        self.last_revealed_verse_id()
            .and_then(|verse_id| self.verse(verse_id))
            .is_some_and(TargetVerse::has_content)
    }

    /// Every source verse has non-empty target content.
    pub fn is_complete(&self) -> bool {
        self.source_verse_count > 0
            && (1..=self.source_verse_count as u32)
                .all(|n| self.verse(VerseId(n)).is_some_and(TargetVerse::has_content))
    }

    pub fn save_status(&self, verse_id: VerseId) -> SaveStatus {
        self.controller.save_status(verse_id)
    }

    pub fn snapshot(&self) -> DraftingSnapshot {
        DraftingSnapshot {
            session_id: self.session_id.to_string(),
            read_only: self.read_only,
            active_verse_id: self.active_verse_id,
            previous_active_verse_id: self.previous_active_verse_id,
            revealed_verses: self.revealed_verses.iter().copied().collect(),
            verses: self.verses.clone(),
            last_revealed_verse_has_content: self.last_revealed_verse_has_content(),
            complete: self.is_complete(),
        }
    }

    pub fn handle_text_change(&mut self, verse_id: VerseId, text: impl Into<String>) {
        if self.read_only {
            return;
        }
        let text = text.into();
        self.ensure_verse(verse_id).content = text.clone();
        self.controller.debounced_save(verse_id, text);
    }

    /// Move focus to `new_verse_id`, flushing the verse being left first.
    pub async fn handle_active_verse_change(
        &mut self,
        new_verse_id: VerseId,
    ) -> Result<(), SaveError> {
        if self.read_only {
            return Ok(());
        }
        if self.active_verse_id != new_verse_id {
            self.flush_if_unsaved(self.active_verse_id).await?;
        }
        self.switch_active(new_verse_id);
        Ok(())
    }

    /// Create `next_verse_id` if needed, flush `verse_to_flush`, and make
    /// `next_verse_id` active and revealed.
    pub async fn advance_to_verse(
        &mut self,
        next_verse_id: VerseId,
        verse_to_flush: Option<VerseId>,
    ) -> Result<(), SaveError> {
        if self.read_only || next_verse_id.get() as usize > self.source_verse_count {
            return Ok(());
        }
        self.ensure_verse(next_verse_id);
        if let Some(verse_id) = verse_to_flush {
            self.flush_if_unsaved(verse_id).await?;
        }
        self.switch_active(next_verse_id);
        self.revealed_verses.insert(next_verse_id);
        Ok(())
    }

    pub async fn move_to_next_verse(&mut self) -> Result<(), SaveError> {
        if self.read_only {
            return Ok(());
        }
        let active = self.active_verse_id;
        if !self.verse(active).is_some_and(TargetVerse::has_content) {
            return Ok(());
        }
        self.advance_to_verse(active.next(), Some(active)).await
    }

    /// Reveal the verse after the last revealed one. Unlike
    /// `move_to_next_verse` this keys off the last revealed verse, which may
    /// differ from the active one.
    pub async fn reveal_next_verse(&mut self) -> Result<(), SaveError> {
        if self.read_only || !self.last_revealed_verse_has_content() {
            return Ok(());
        }
        let Some(last_revealed) = self.last_revealed_verse_id() else {
            return Ok(());
        };
        self.advance_to_verse(last_revealed.next(), Some(last_revealed))
            .await
    }

    /// Flush every unsaved verse and stop the controller's timers.
    pub async fn close(&mut self) -> Result<(), SaveError> {
        if self.read_only {
            return Ok(());
        }
        let result = self.controller.flush_all().await;
        self.controller.shutdown();
        tracing::info!(
            session_id = %self.session_id,
            flushed = result.is_ok(),
            "Drafting session closed"
        );
        result
    }

    fn verse(&self, verse_id: VerseId) -> Option<&TargetVerse> {
        self.verses
            .binary_search_by_key(&verse_id, |verse| verse.verse_number)
            .ok()
            .map(|index| &self.verses[index])
    }

    /// Find or create (empty, seeded into the controller) the entry for `verse_id`.
    fn ensure_verse(&mut self, verse_id: VerseId) -> &mut TargetVerse {
        let index = match self
            .verses
            .binary_search_by_key(&verse_id, |verse| verse.verse_number)
        {
            Ok(index) => index,
            Err(index) => {
                self.controller.set_initial_content(verse_id, "");
                self.verses.insert(index, TargetVerse::new(verse_id, ""));
                index
            }
        };
        &mut self.verses[index]
    }

    async fn flush_if_unsaved(&self, verse_id: VerseId) -> Result<(), SaveError> {
        if !self.controller.has_unsaved_changes(verse_id) {
            return Ok(());
        }
        let content = self
            .verse_content(verse_id)
            .unwrap_or_default()
            .to_string();
        tracing::debug!(session_id = %self.session_id, verse_id = %verse_id, "Flushing verse");
        self.controller.save_immediately(verse_id, content).await
    }

    fn switch_active(&mut self, new_verse_id: VerseId) {
        let previous = self.active_verse_id;
        self.previous_active_verse_id = Some(previous);
        self.active_verse_id = new_verse_id;
        tracing::info!(
            session_id = %self.session_id,
            active_verse_id = %new_verse_id,
            previous_active_verse_id = %previous,
            "Active verse changed"
        );
    }
}
