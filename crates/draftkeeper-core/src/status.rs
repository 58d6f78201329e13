//! Save status reporting
//!
//! State machine: `idle → saving → {saved, error} → idle`.
//!
//! `saved` and `error` fall back to `idle` after their reset delays. At most
//! one reset timer is alive: entering `saving` or settling again cancels the
//! previous one, so a stale timer can never clear a later cycle.
//!
//! Each `begin` hands out a [`SaveCycle`]. Only the latest cycle may settle;
//! a request that finishes after a newer one started leaves `saving` alone.

use crate::types::PostStatus;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// User-facing save status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    /// Nothing happening
    #[default]
    Idle,
    /// A request is in flight
    Saving,
    /// Last request succeeded
    Saved,
    /// Last request failed
    Error,
}

impl SaveStatus {
    /// Status-bar text
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "Saving...",
            Self::Saved => "Saved",
            Self::Error => "Save failed",
        }
    }
}

/// Label of the save button
#[must_use]
pub fn save_label(status: SaveStatus, post_status: PostStatus) -> &'static str {
    if status == SaveStatus::Saving {
        "Saving..."
    } else if post_status.is_published() {
        "Save"
    } else {
        "Save Draft"
    }
}

/// Label of the publish button
#[must_use]
pub fn publish_label(post_status: PostStatus) -> &'static str {
    if post_status.is_published() {
        "Update"
    } else {
        "Publish"
    }
}

/// Whether save/publish actions should accept clicks
#[inline]
#[must_use]
pub fn actions_enabled(status: SaveStatus) -> bool {
    status != SaveStatus::Saving
}

/// Token for one `saving` period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SaveCycle(u64);

/// Derives the visible status from coordinator events
#[derive(Debug, Clone)]
pub struct StatusReporter {
    inner: Arc<ReporterInner>,
}

#[derive(Debug)]
struct ReporterInner {
    tx: watch::Sender<SaveStatus>,
    saved_reset: Duration,
    error_reset: Duration,
    timer: Mutex<ResetTimer>,
    last_error: Mutex<Option<String>>,
}

#[derive(Debug, Default)]
struct ResetTimer {
    /// Bumped on every transition; a timer only fires for its own generation
    generation: u64,
    /// Latest cycle handed out by `begin`
    cycle: u64,
    handle: Option<JoinHandle<()>>,
}

impl ResetTimer {
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ResetTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl StatusReporter {
    /// Create reporter in `idle`
    #[must_use]
    pub fn new(saved_reset: Duration, error_reset: Duration) -> Self {
        let (tx, _rx) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(ReporterInner {
                tx,
                saved_reset,
                error_reset,
                timer: Mutex::new(ResetTimer::default()),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Current status
    #[inline]
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        *self.inner.tx.borrow()
    }

    /// Receiver notified on every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.tx.subscribe()
    }

    /// Message of the most recent failure
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    /// Enter `saving`, cancelling any pending reset
    pub fn begin(&self) -> SaveCycle {
        let mut timer = self.inner.timer.lock();
        timer.cancel();
        timer.cycle += 1;
        self.inner.tx.send_replace(SaveStatus::Saving);
        SaveCycle(timer.cycle)
    }

    /// Enter `saved`, resetting after the short delay
    ///
    /// Returns `false` if a newer cycle has started.
    pub fn succeeded(&self, cycle: SaveCycle) -> bool {
        self.settle(cycle, SaveStatus::Saved, self.inner.saved_reset, None)
    }

    /// Enter `error`, resetting after the long delay
    ///
    /// Returns `false` if a newer cycle has started.
    pub fn failed(&self, cycle: SaveCycle, message: impl Into<String>) -> bool {
        let message = message.into();
        self.settle(cycle, SaveStatus::Error, self.inner.error_reset, Some(message))
    }

    fn settle(
        &self,
        cycle: SaveCycle,
        status: SaveStatus,
        delay: Duration,
        error: Option<String>,
    ) -> bool {
        let mut timer = self.inner.timer.lock();
        if timer.cycle != cycle.0 {
            tracing::debug!(?status, cycle = cycle.0, current = timer.cycle, "stale settle ignored");
            return false;
        }

        timer.cancel();
        if let Some(message) = error {
            *self.inner.last_error.lock() = Some(message);
        }
        self.inner.tx.send_replace(status);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(?status, "no runtime, status will not auto-reset");
            return true;
        };

        let generation = timer.generation;
        let inner: Weak<ReporterInner> = Arc::downgrade(&self.inner);
        timer.handle = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                let timer = inner.timer.lock();
                if timer.generation == generation {
                    inner.tx.send_replace(SaveStatus::Idle);
                }
            }
        }));
        true
    }
}
