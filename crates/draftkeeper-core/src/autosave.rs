//! Autosave scheduling and unload guarding
//!
//! The scheduler ticks on a fixed period for the lifetime of a session and
//! asks its target to save whenever the document is dirty. It holds the
//! target itself rather than a copy of its state, so every tick and every
//! unload check sees the live dirty flag without the timer being restarted
//! on edits.

use crate::config::EditorConfig;
use crate::coordinator::SaveCoordinator;
use crate::error::SaveError;
use crate::types::{FieldOverrides, SaveOutcome};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Something the scheduler can autosave
#[async_trait]
pub trait AutoSaveTarget: Send + Sync {
    /// Check for unsaved edits
    fn is_dirty(&self) -> bool;

    /// Save with no overrides
    async fn autosave(&self) -> Result<SaveOutcome, SaveError>;
}

#[async_trait]
impl AutoSaveTarget for SaveCoordinator {
    fn is_dirty(&self) -> bool {
        SaveCoordinator::is_dirty(self)
    }

    async fn autosave(&self) -> Result<SaveOutcome, SaveError> {
        self.save(FieldOverrides::new()).await
    }
}

/// Verdict of an unload check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    /// Nothing to lose, let navigation proceed
    Proceed,
    /// Unsaved edits, ask the user first
    Block,
}

/// Blocks unload while its target is dirty
#[derive(Clone)]
pub struct UnloadGuard {
    target: Arc<dyn AutoSaveTarget>,
}

impl UnloadGuard {
    /// Guard `target`
    #[inline]
    #[must_use]
    pub fn new(target: Arc<dyn AutoSaveTarget>) -> Self {
        Self { target }
    }

    /// Evaluate against the current dirty flag
    #[must_use]
    pub fn check(&self) -> UnloadDecision {
        if self.target.is_dirty() {
            UnloadDecision::Block
        } else {
            UnloadDecision::Proceed
        }
    }
}

impl std::fmt::Debug for UnloadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnloadGuard").finish_non_exhaustive()
    }
}

/// Registration handle for an installed guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardId(pub u64);

/// Host-side registry of unload guards
pub trait UnloadGuardHost: Send + Sync {
    /// Install a guard
    fn install(&self, guard: UnloadGuard) -> GuardId;

    /// Remove a previously installed guard; unknown ids are ignored
    fn remove(&self, id: GuardId);
}

/// In-process guard host
#[derive(Debug, Default)]
pub struct GuardRegistry {
    next_id: AtomicU64,
    guards: DashMap<GuardId, UnloadGuard>,
}

impl GuardRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every guard; any block wins
    #[must_use]
    pub fn before_unload(&self) -> UnloadDecision {
        let blocked = self
            .guards
            .iter()
            .any(|entry| entry.value().check() == UnloadDecision::Block);
        if blocked {
            UnloadDecision::Block
        } else {
            UnloadDecision::Proceed
        }
    }

    /// Installed guard count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Check if no guard is installed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl UnloadGuardHost for GuardRegistry {
    fn install(&self, guard: UnloadGuard) -> GuardId {
        let id = GuardId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.guards.insert(id, guard);
        id
    }

    fn remove(&self, id: GuardId) {
        self.guards.remove(&id);
    }
}

/// Fixed-period autosave trigger
#[derive(Debug, Clone, Copy)]
pub struct AutoSaveScheduler {
    period: Duration,
    enabled: bool,
}

impl AutoSaveScheduler {
    /// Create scheduler ticking every `period`
    #[inline]
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            enabled: true,
        }
    }

    /// Create from session configuration
    #[must_use]
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            period: config.autosave_interval(),
            enabled: config.autosave_enabled,
        }
    }

    /// Tick period
    #[inline]
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start ticking; the first tick fires one full period from now
    ///
    /// A disabled scheduler returns a handle with no timer.
    #[must_use]
    pub fn spawn(self, target: Arc<dyn AutoSaveTarget>) -> AutoSaveHandle {
        let ticks = Arc::new(AtomicU64::new(0));
        let task = self
            .enabled
            .then(|| tokio::spawn(run_ticks(self.period, target, Arc::clone(&ticks))));

        AutoSaveHandle {
            task,
            ticks,
            guard: None,
        }
    }

    /// Start ticking and install an unload guard for `target` on `host`
    #[must_use]
    pub fn spawn_guarded(
        self,
        target: Arc<dyn AutoSaveTarget>,
        host: Arc<dyn UnloadGuardHost>,
    ) -> AutoSaveHandle {
        let guard_id = host.install(UnloadGuard::new(Arc::clone(&target)));
        let mut handle = self.spawn(target);
        handle.guard = Some((host, guard_id));
        handle
    }
}

async fn run_ticks(period: Duration, target: Arc<dyn AutoSaveTarget>, ticks: Arc<AtomicU64>) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;

        if !target.is_dirty() {
            tracing::trace!(tick, "autosave tick, document clean");
            continue;
        }

        tracing::debug!(tick, "autosave tick, saving");
        // Detached so a slow save never shifts the cadence; the
        // coordinator coalesces overlapping requests.
        let target = Arc::clone(&target);
        tokio::spawn(async move {
            if let Err(e) = target.autosave().await {
                tracing::warn!(tick, error = %e, "autosave failed");
            }
        });
    }
}

/// Running scheduler; stops the timer and removes the guard on drop
pub struct AutoSaveHandle {
    task: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
    guard: Option<(Arc<dyn UnloadGuardHost>, GuardId)>,
}

impl AutoSaveHandle {
    /// Ticks fired so far
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Check if the timer is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Installed guard, if any
    #[inline]
    #[must_use]
    pub fn guard_id(&self) -> Option<GuardId> {
        self.guard.as_ref().map(|(_, id)| *id)
    }

    /// Stop the timer and remove the guard
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some((host, id)) = self.guard.take() {
            host.remove(id);
        }
    }
}

impl Drop for AutoSaveHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for AutoSaveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSaveHandle")
            .field("ticks", &self.ticks())
            .field("running", &self.is_running())
            .field("guard", &self.guard_id())
            .finish()
    }
}
