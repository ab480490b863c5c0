//! Cancellable one-shot timers backed by tokio tasks.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A scheduled callback that runs once after `delay` unless cancelled first.
///
/// Dropping an armed timer cancels it. Aborting the task is not enough on a
/// multi-threaded runtime (the task may already be past its sleep), so every
/// callback must also confirm under the registry lock that its `id` is still
/// the one stored for its slot before doing anything.
#[derive(Debug)]
pub struct ScopedTimer {
    id: u64,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTimer {
    pub fn schedule<F, Fut>(id: u64, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback().await;
        });
        Self {
            id,
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Release the timer from inside its own callback without aborting the
    /// task that is currently running it.
    pub(crate) fn fired(mut self) {
        self.handle.take();
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
