//! Persistence seam for verse drafts.
//!
//! The autosave controller never talks to a backend itself. It calls a
//! [`VerseSaver`] supplied by the host.

mod http;

use async_trait::async_trait;
use shared_types::VerseId;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

pub use http::HttpVerseSaver;

use crate::autosave::SaveError;

/// Persist one verse's text. Resolve `Ok` once the text is durable.
#[async_trait]
pub trait VerseSaver: Send + Sync + 'static {
    async fn save(&self, verse_id: VerseId, text: &str) -> Result<(), SaveError>;
}

/// Adapts an async closure into a [`VerseSaver`].
pub struct FnVerseSaver<F> {
    save_fn: F,
}

impl<F> FnVerseSaver<F> {
    pub fn new(save_fn: F) -> Self {
        Self { save_fn }
    }
}

#[async_trait]
impl<F, Fut> VerseSaver for FnVerseSaver<F>
where
    F: Fn(VerseId, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SaveError>> + Send + 'static,
{
    async fn save(&self, verse_id: VerseId, text: &str) -> Result<(), SaveError> {
        (self.save_fn)(verse_id, text.to_string()).await
    }
}

/// In-process store, used when no backend is configured.
#[derive(Debug, Default)]
pub struct MemoryVerseSaver {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    verses: BTreeMap<VerseId, String>,
    writes: usize,
}

impl MemoryVerseSaver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> BTreeMap<VerseId, String> {
        self.inner
            .lock()
            .expect("MemoryInner lock poisoned")
            .verses
            .clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().expect("MemoryInner lock poisoned").writes
    }
}

#[async_trait]
impl VerseSaver for MemoryVerseSaver {
    async fn save(&self, verse_id: VerseId, text: &str) -> Result<(), SaveError> {
        let mut guard = self.inner.lock().expect("MemoryInner lock poisoned");
        guard.verses.insert(verse_id, text.to_string());
        guard.writes += 1;
        tracing::debug!(verse_id = %verse_id, bytes = text.len(), "Stored verse in memory");
        Ok(())
    }
}
