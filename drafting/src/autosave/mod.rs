//! Per-verse autosave controller.
//!
//! Coalesces keystrokes behind a debounce, forces saves on navigation, and
//! retries once after a failed save. Every attempt carries the verse's
//! sequence number at schedule time and may only commit its result while
//! that number is still the latest one, so an older save finishing late can
//! never overwrite a newer one.

mod messages;
mod state;
mod timer;

use futures::FutureExt;
use shared_types::{SaveStatus, VerseId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub use messages::{SaveError, SaveOrigin};
pub use timer::ScopedTimer;

use crate::config::AutosaveConfig;
use crate::saver::VerseSaver;
use state::{AttemptFuture, InFlightSave, SaveState};

/// Cheap to clone; clones share the same per-verse registry.
#[derive(Clone)]
pub struct SaveController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: AutosaveConfig,
    saver: Arc<dyn VerseSaver>,
    registry: Mutex<HashMap<VerseId, SaveState>>,
    next_timer_id: AtomicU64,
}

impl SaveController {
    pub fn new(config: AutosaveConfig, saver: Arc<dyn VerseSaver>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                config,
                saver,
                registry: Mutex::new(HashMap::new()),
                next_timer_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &AutosaveConfig {
        &self.inner.config
    }

    /// Seed already-persisted content so the first edit is compared against it.
    pub fn set_initial_content(&self, verse_id: VerseId, content: impl Into<String>) {
        let content = content.into();
        let mut registry = self.inner.registry();
        let state = registry.entry(verse_id).or_default();
        state.last_saved_content = content.clone();
        state.current_content = content;
    }

    /// Record `content` and (re)start the debounce for `verse_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn debounced_save(&self, verse_id: VerseId, content: impl Into<String>) {
        let content = content.into();
        let mut registry = self.inner.registry();
        let state = registry.entry(verse_id).or_default();
        state.current_content = content.clone();
        state.cancel_debounce();

        if content == state.last_saved_content {
            tracing::trace!(verse_id = %verse_id, "Content matches last save; debounce dropped");
            return;
        }

        let timer_id = self.inner.next_timer_id();
        let weak = Arc::downgrade(&self.inner);
        state.debounce = Some(ScopedTimer::schedule(
            timer_id,
            self.inner.config.debounce(),
            move || ControllerInner::fire_debounce(weak, verse_id, timer_id, content),
        ));
        tracing::debug!(
            verse_id = %verse_id,
            debounce_ms = self.inner.config.debounce_ms,
            "Debounced save scheduled"
        );
    }

    /// Save `content` now, after any save already in flight for this verse.
    ///
    /// Errors from the save propagate to the caller. Resolves without a
    /// network call when `content` is already the last saved content.
    pub async fn save_immediately(
        &self,
        verse_id: VerseId,
        content: impl Into<String>,
    ) -> Result<(), SaveError> {
        let content = content.into();
        let (sequence, previous) = {
            let mut registry = self.inner.registry();
            let state = registry.entry(verse_id).or_default();
            state.current_content = content.clone();
            state.cancel_debounce();

            if content == state.last_saved_content {
                return Ok(());
            }

            // Claim the sequence before waiting so any attempt already
            // running is recognized as stale when it completes.
            let sequence = state.next_sequence();
            let previous = state.in_flight.as_ref().map(|in_flight| in_flight.done.clone());
            (sequence, previous)
        };

        if let Some(previous) = previous {
            let _ = previous.await;
        }

        let attempt = {
            let mut registry = self.inner.registry();
            let state = registry.entry(verse_id).or_default();
            self.inner
                .begin_attempt(state, verse_id, content, sequence, SaveOrigin::Immediate)
        };
        attempt.await
    }

    pub fn save_status(&self, verse_id: VerseId) -> SaveStatus {
        self.inner
            .registry()
            .get(&verse_id)
            .map(SaveState::status)
            .unwrap_or_default()
    }

    pub fn has_unsaved_changes(&self, verse_id: VerseId) -> bool {
        self.inner
            .registry()
            .get(&verse_id)
            .is_some_and(SaveState::has_unsaved_changes)
    }

    /// Verses whose latest content differs from the last saved content.
    pub fn unsaved_verses(&self) -> Vec<VerseId> {
        let mut verses: Vec<VerseId> = self
            .inner
            .registry()
            .iter()
            .filter(|(_, state)| state.has_unsaved_changes())
            .map(|(verse_id, _)| *verse_id)
            .collect();
        verses.sort();
        verses
    }

    /// Immediately save every verse with unsaved changes.
    ///
    /// Every verse is attempted; the first error is returned.
    pub async fn flush_all(&self) -> Result<(), SaveError> {
        let pending: Vec<(VerseId, String)> = {
            let registry = self.inner.registry();
            let mut pending: Vec<(VerseId, String)> = registry
                .iter()
                .filter(|(_, state)| state.has_unsaved_changes())
                .map(|(verse_id, state)| (*verse_id, state.current_content.clone()))
                .collect();
            pending.sort_by_key(|(verse_id, _)| *verse_id);
            pending
        };

        let mut first_error = None;
        for (verse_id, content) in pending {
            if let Err(err) = self.save_immediately(verse_id, content).await {
                tracing::warn!(verse_id = %verse_id, error = %err, "Flush save failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Cancel every pending debounce and retry. In-flight saves still finish.
    pub fn shutdown(&self) {
        let mut registry = self.inner.registry();
        for state in registry.values_mut() {
            state.cancel_debounce();
            state.cancel_retry();
        }
    }
}

impl ControllerInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<VerseId, SaveState>> {
        self.registry.lock().expect("autosave registry lock poisoned")
    }

    fn next_timer_id(&self) -> u64 {
        self.next_timer_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Start a save attempt under `sequence`. Caller holds the registry lock.
    ///
    /// Returns a ready `Ok` when the attempt is stale or has nothing to save.
    fn begin_attempt(
        self: &Arc<Self>,
        state: &mut SaveState,
        verse_id: VerseId,
        content: String,
        sequence: u64,
        origin: SaveOrigin,
    ) -> AttemptFuture {
        if state.is_stale(sequence) {
            tracing::debug!(
                verse_id = %verse_id,
                sequence,
                latest = state.sequence,
                origin = origin.as_str(),
                "Superseded save attempt abandoned"
            );
            return futures::future::ready(Ok(())).boxed().shared();
        }
        if content == state.last_saved_content {
            state.release_in_flight(sequence);
            return futures::future::ready(Ok(())).boxed().shared();
        }

        tracing::debug!(
            verse_id = %verse_id,
            sequence,
            origin = origin.as_str(),
            "Save attempt started"
        );
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = inner.saver.save(verse_id, &content).await;
            inner.complete_attempt(verse_id, content, sequence, origin, result)
        });
        let done: AttemptFuture = async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(SaveError::Backend(format!(
                    "save task failed: {join_err}"
                ))),
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlightSave {
            sequence,
            done: done.clone(),
        });
        done
    }

    fn complete_attempt(
        self: &Arc<Self>,
        verse_id: VerseId,
        content: String,
        sequence: u64,
        origin: SaveOrigin,
        result: Result<(), SaveError>,
    ) -> Result<(), SaveError> {
        let mut registry = self.registry();
        let state = registry.entry(verse_id).or_default();
        let is_latest = !state.is_stale(sequence);
        state.release_in_flight(sequence);

        match result {
            Ok(()) => {
                if is_latest {
                    state.last_saved_content = content;
                    state.last_saved_at = Some(chrono::Utc::now());
                    state.last_error = None;
                    state.cancel_retry();
                    tracing::debug!(verse_id = %verse_id, sequence, "Verse saved");
                } else {
                    tracing::debug!(
                        verse_id = %verse_id,
                        sequence,
                        latest = state.sequence,
                        "Superseded save finished; result discarded"
                    );
                }
                Ok(())
            }
            Err(err) => {
                if is_latest {
                    state.last_error = Some(err.clone());
                    if origin.schedules_retry() {
                        self.schedule_retry(state, verse_id);
                        tracing::warn!(
                            verse_id = %verse_id,
                            sequence,
                            origin = origin.as_str(),
                            retry_delay_ms = self.config.retry_delay_ms,
                            error = %err,
                            "Verse save failed; retry scheduled"
                        );
                    } else {
                        tracing::error!(
                            verse_id = %verse_id,
                            sequence,
                            error = %err,
                            "Verse save retry failed; giving up until the next edit"
                        );
                    }
                } else {
                    tracing::debug!(
                        verse_id = %verse_id,
                        sequence,
                        error = %err,
                        "Superseded save failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut SaveState, verse_id: VerseId) {
        state.cancel_retry();
        let timer_id = self.next_timer_id();
        let weak = Arc::downgrade(self);
        state.retry = Some(ScopedTimer::schedule(
            timer_id,
            self.config.retry_delay(),
            move || ControllerInner::fire_retry(weak, verse_id, timer_id),
        ));
    }

    async fn fire_debounce(
        weak: Weak<ControllerInner>,
        verse_id: VerseId,
        timer_id: u64,
        content: String,
    ) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let attempt = {
            let mut registry = inner.registry();
            let Some(state) = registry.get_mut(&verse_id) else {
                return;
            };
            if !state.claim_debounce(timer_id) {
                return;
            }
            let sequence = state.next_sequence();
            inner.begin_attempt(state, verse_id, content, sequence, SaveOrigin::Debounce)
        };
        // Failures were already recorded and a retry scheduled; there is no
        // caller to report to.
        let _ = attempt.await;
    }

    async fn fire_retry(weak: Weak<ControllerInner>, verse_id: VerseId, timer_id: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let attempt = {
            let mut registry = inner.registry();
            let Some(state) = registry.get_mut(&verse_id) else {
                return;
            };
            if !state.claim_retry(timer_id) {
                return;
            }
            if !state.has_unsaved_changes() {
                return;
            }
            let content = state.current_content.clone();
            let sequence = state.next_sequence();
            tracing::info!(verse_id = %verse_id, sequence, "Retrying failed verse save");
            inner.begin_attempt(state, verse_id, content, sequence, SaveOrigin::Retry)
        };
        let _ = attempt.await;
    }
}
