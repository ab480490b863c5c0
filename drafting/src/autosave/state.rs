//! Per-verse autosave bookkeeping owned by `SaveController`.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use shared_types::SaveStatus;

use super::messages::SaveError;
use super::timer::ScopedTimer;

/// Completion of a spawned save attempt. Cloneable so a later immediate save
/// can wait for it.
pub(crate) type AttemptFuture = Shared<BoxFuture<'static, Result<(), SaveError>>>;

pub(crate) struct InFlightSave {
    pub sequence: u64,
    pub done: AttemptFuture,
}

#[derive(Default)]
pub(crate) struct SaveState {
    pub last_saved_content: String,
    pub current_content: String,
    pub debounce: Option<ScopedTimer>,
    pub retry: Option<ScopedTimer>,
    pub in_flight: Option<InFlightSave>,
    pub sequence: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<SaveError>,
}

impl SaveState {
    pub fn has_unsaved_changes(&self) -> bool {
        self.current_content != self.last_saved_content
    }

    pub fn is_stale(&self, sequence: u64) -> bool {
        sequence < self.sequence
    }

    pub fn cancel_debounce(&mut self) {
        if let Some(timer) = self.debounce.take() {
            timer.cancel();
        }
    }

    pub fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry.take() {
            timer.cancel();
        }
    }

    /// Bump and return the sequence number for a new attempt.
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Clear the in-flight marker only if it belongs to `sequence`.
    pub fn release_in_flight(&mut self, sequence: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.sequence == sequence)
        {
            self.in_flight = None;
        }
    }

    /// Take the debounce timer if it is still the one identified by `timer_id`.
    pub fn claim_debounce(&mut self, timer_id: u64) -> bool {
        match self.debounce.take() {
            Some(timer) if timer.id() == timer_id => {
                timer.fired();
                true
            }
            other => {
                self.debounce = other;
                false
            }
        }
    }

    /// Take the retry timer if it is still the one identified by `timer_id`.
    pub fn claim_retry(&mut self, timer_id: u64) -> bool {
        match self.retry.take() {
            Some(timer) if timer.id() == timer_id => {
                timer.fired();
                true
            }
            other => {
                self.retry = other;
                false
            }
        }
    }

    pub fn status(&self) -> SaveStatus {
        let is_actively_saving = self.in_flight.is_some();
        SaveStatus {
            has_pending_debounce: self.debounce.is_some(),
            is_actively_saving,
            has_retry_scheduled: self.retry.is_some(),
            has_unsaved_changes: self.has_unsaved_changes(),
            show_loader: is_actively_saving,
            last_saved_at: self.last_saved_at,
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn ready_attempt() -> AttemptFuture {
        futures::future::ready(Ok(())).boxed().shared()
    }

    #[test]
    fn test_release_in_flight_ignores_other_sequences() {
        let mut state = SaveState::default();
        state.in_flight = Some(InFlightSave {
            sequence: 3,
            done: ready_attempt(),
        });

        state.release_in_flight(2);
        assert!(state.in_flight.is_some());

        state.release_in_flight(3);
        assert!(state.in_flight.is_none());
    }

    #[test]
    fn test_sequence_staleness() {
        let mut state = SaveState::default();
        let first = state.next_sequence();
        let second = state.next_sequence();
        assert!(state.is_stale(first));
        assert!(!state.is_stale(second));
    }

    #[test]
    fn test_status_reflects_unsaved_and_error() {
        let mut state = SaveState {
            last_saved_content: "a".to_string(),
            current_content: "ab".to_string(),
            ..Default::default()
        };
        state.last_error = Some(SaveError::Transport("connection reset".to_string()));

        let status = state.status();
        assert!(status.has_unsaved_changes);
        assert!(!status.show_loader);
        assert_eq!(
            status.last_error.as_deref(),
            Some("Transport error: connection reset")
        );
    }
}
