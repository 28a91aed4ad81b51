//! Single-slot execution guard.
//!
//! The slot owns every piece of mutable tick state (the stream session and a
//! result awaiting publication). Holding the guard is the only way to run a
//! tick, so two runs can never overlap.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::SimulationResult;

/// State carried from one tick to the next.
pub struct TickState<S> {
    /// Stream session used to consume and publish.
    pub stream: S,
    /// A result whose publication failed and must be retried first.
    pub pending_publication: Option<SimulationResult>,
}

impl<S> TickState<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending_publication: None,
        }
    }
}

/// Guard granting exclusive use of the tick state.
pub type SlotGuard<S> = OwnedMutexGuard<TickState<S>>;

/// A mutex with exactly one permit around [`TickState`].
pub struct ExecutionSlot<S> {
    inner: Arc<Mutex<TickState<S>>>,
}

impl<S> ExecutionSlot<S> {
    pub fn new(state: TickState<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Take the slot if no run is in flight.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SlotGuard<S>> {
        Arc::clone(&self.inner).try_lock_owned().ok()
    }

    /// Wait for the in-flight run (if any) to release the slot.
    pub async fn acquire(&self) -> SlotGuard<S> {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Whether a run currently holds the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl<S> Clone for ExecutionSlot<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_fails_while_guard_is_held() {
        let slot = ExecutionSlot::new(TickState::new(()));

        let guard = slot.try_acquire().expect("slot starts free");
        assert!(slot.is_busy());
        assert!(slot.try_acquire().is_none());

        drop(guard);
        assert!(!slot.is_busy());
        assert!(slot.try_acquire().is_some());
    }

    #[tokio::test]
    async fn clones_share_the_same_permit() {
        let slot = ExecutionSlot::new(TickState::new(0u32));
        let other = slot.clone();

        let mut guard = slot.acquire().await;
        guard.stream += 1;
        assert!(other.try_acquire().is_none());
        drop(guard);

        assert_eq!(other.acquire().await.stream, 1);
    }
}
