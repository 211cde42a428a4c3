//! Guarded lazy initialization for a single resource handle.
//!
//! The lock protects the create-or-wait decision, never the (potentially
//! slow) construction itself: the first caller marks the slot
//! `Initializing`, releases the lock, and builds the handle; racing
//! callers wait on a condvar and all observe the same handle once ready.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::debug;

use lore_core::errors::{LoreResult, ProviderError};
use lore_core::models::{ResourceKind, ResourceStatus};

enum SlotState<T: ?Sized> {
    Uninitialized,
    Initializing,
    Ready(Arc<T>),
    Failed(String),
    Closed,
}

/// One lazily initialized, process-lifetime resource handle.
pub struct LazySlot<T: ?Sized> {
    kind: ResourceKind,
    state: Mutex<SlotState<T>>,
    cond: Condvar,
    /// Set by health probes; a degraded handle keeps serving.
    degraded: AtomicBool,
}

impl<T: ?Sized> LazySlot<T> {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: Mutex::new(SlotState::Uninitialized),
            cond: Condvar::new(),
            degraded: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> LoreResult<MutexGuard<'_, SlotState<T>>> {
        self.state.lock().map_err(|_| {
            ProviderError::Unavailable {
                kind: format!("{} (slot lock poisoned)", self.kind),
            }
            .into()
        })
    }

    /// Get the handle, running `init` exactly once across all callers.
    ///
    /// `init` already failed terminally → `Unavailable`. Slot closed by
    /// shutdown → `ShutDown`. `init` should perform its own bounded
    /// retries; a returned error is final for the process lifetime.
    pub fn get_or_init(
        &self,
        init: impl FnOnce() -> LoreResult<Arc<T>>,
    ) -> LoreResult<Arc<T>> {
        let mut guard = self.lock()?;
        loop {
            match &*guard {
                SlotState::Ready(handle) => return Ok(Arc::clone(handle)),
                SlotState::Failed(reason) => {
                    return Err(ProviderError::Unavailable {
                        kind: format!("{} ({reason})", self.kind),
                    }
                    .into())
                }
                SlotState::Closed => return Err(ProviderError::ShutDown.into()),
                SlotState::Initializing => {
                    guard = self.cond.wait(guard).map_err(|_| ProviderError::Unavailable {
                        kind: format!("{} (slot lock poisoned)", self.kind),
                    })?;
                }
                SlotState::Uninitialized => break,
            }
        }

        // This caller won the race; construct outside the lock.
        *guard = SlotState::Initializing;
        drop(guard);

        debug!(kind = %self.kind, "initializing resource handle");
        let result = init();

        let mut guard = self.lock()?;
        let out = match result {
            Ok(handle) => {
                // Shutdown may have closed the slot while we were building.
                if matches!(*guard, SlotState::Closed) {
                    Err(ProviderError::ShutDown.into())
                } else {
                    *guard = SlotState::Ready(Arc::clone(&handle));
                    Ok(handle)
                }
            }
            Err(e) => {
                if !matches!(*guard, SlotState::Closed) {
                    *guard = SlotState::Failed(e.to_string());
                }
                Err(e)
            }
        };
        self.cond.notify_all();
        out
    }

    /// Handle if already initialized; never triggers initialization.
    pub fn peek(&self) -> Option<Arc<T>> {
        match &*self.state.lock().ok()? {
            SlotState::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    pub fn status(&self) -> ResourceStatus {
        let guard = match self.state.lock() {
            Ok(g) => g,
            Err(_) => return ResourceStatus::Failed,
        };
        match &*guard {
            SlotState::Uninitialized | SlotState::Initializing => ResourceStatus::Uninitialized,
            SlotState::Ready(_) => {
                if self.degraded.load(Ordering::SeqCst) {
                    ResourceStatus::Degraded
                } else {
                    ResourceStatus::Ready
                }
            }
            SlotState::Failed(_) | SlotState::Closed => ResourceStatus::Failed,
        }
    }

    /// Record a probe result. Only flips Ready ↔ Degraded; a `Failed`
    /// slot never comes back.
    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }

    /// Drop the handle and refuse all future acquisitions. Idempotent.
    pub fn close(&self) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = SlotState::Closed;
        }
        self.cond.notify_all();
    }
}
