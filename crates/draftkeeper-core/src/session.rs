//! # Editor Session
//!
//! One editing session for one document: the save coordinator, its
//! autosave timer and its unload guard, started together and torn down
//! together.

use crate::autosave::{AutoSaveHandle, AutoSaveScheduler, UnloadGuardHost};
use crate::client::PersistenceClient;
use crate::config::EditorConfig;
use crate::coordinator::SaveCoordinator;
use crate::types::PostFields;
use std::sync::Arc;

/// Running editing session
#[derive(Debug)]
pub struct EditorSession {
    coordinator: SaveCoordinator,
    autosave: AutoSaveHandle,
}

impl EditorSession {
    /// Start a session for `snapshot`
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(
        client: Arc<dyn PersistenceClient>,
        snapshot: PostFields,
        config: &EditorConfig,
        guards: Arc<dyn UnloadGuardHost>,
    ) -> Self {
        let coordinator = SaveCoordinator::new(client, snapshot, config);
        let autosave = AutoSaveScheduler::from_config(config)
            .spawn_guarded(Arc::new(coordinator.clone()), guards);

        tracing::info!(
            session = %coordinator.session_id(),
            autosave_ms = config.autosave_interval_ms,
            enabled = config.autosave_enabled,
            "editor session started"
        );

        Self {
            coordinator,
            autosave,
        }
    }

    /// Save pipeline for this session
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &SaveCoordinator {
        &self.coordinator
    }

    /// Autosave ticks fired so far
    #[inline]
    #[must_use]
    pub fn autosave_ticks(&self) -> u64 {
        self.autosave.ticks()
    }

    /// Stop autosave and remove the unload guard
    ///
    /// Returns the coordinator so a host can still flush explicitly.
    pub fn close(self) -> SaveCoordinator {
        tracing::info!(session = %self.coordinator.session_id(), dirty = self.coordinator.is_dirty(), "editor session closed");
        self.autosave.shutdown();
        self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::{GuardRegistry, UnloadDecision};
    use crate::memory::MemoryStore;
    use crate::types::{DocumentId, FieldOverrides};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn session_autosaves_and_tears_down() {
        let store = Arc::new(MemoryStore::new());
        let guards = Arc::new(GuardRegistry::new());
        let config = EditorConfig::new().with_autosave_interval(Duration::from_secs(10));
        let snapshot = PostFields {
            id: Some(DocumentId(5)),
            ..PostFields::default()
        };

        let session = EditorSession::start(store.clone(), snapshot, &config, guards.clone());
        session.coordinator().mutate(|f| f.title = "Draft".into());
        assert_eq!(guards.before_unload(), UnloadDecision::Block);

        tokio::time::sleep(Duration::from_millis(10_001)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.request_count(), 1);
        assert!(!session.coordinator().is_dirty());
        assert_eq!(guards.before_unload(), UnloadDecision::Proceed);

        let coordinator = session.close();
        assert!(guards.is_empty());

        coordinator.mutate(|f| f.title = "After close".into());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.request_count(), 1);

        coordinator.save(FieldOverrides::new()).await.unwrap();
        assert_eq!(store.request_count(), 2);
    }
}
