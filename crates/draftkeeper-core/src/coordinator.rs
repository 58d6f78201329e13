//! Save coordinator
//!
//! Serializes save requests for one document into a single pipeline:
//! - At most one `persist` call is in flight
//! - Calls arriving meanwhile merge into one pending bucket
//! - When the active call settles, the bucket becomes the next request
//!
//! The active flag and the pending bucket live behind one mutex that is
//! never held across the network await. Handing the bucket to the follow-up
//! request happens under that same lock, so no newer call can slip in
//! between the two.
//!
//! Requests run on a pump task that owns the slot until the bucket is empty.
//! Dropping the future returned by `save` only drops the reply; the request
//! still settles and the slot is still released.

use crate::client::PersistenceClient;
use crate::config::EditorConfig;
use crate::document::DocumentState;
use crate::error::{PersistError, SaveError};
use crate::payload::build_body;
use crate::status::{SaveStatus, StatusReporter};
use crate::types::{
    FieldOverrides, PersistedFields, PostFields, PostStatus, RouteTarget, SaveBody, SaveOutcome,
    SessionId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

type Reply = oneshot::Sender<Result<PersistedFields, SaveError>>;

/// Handle to one document's save pipeline
///
/// Cheap to clone; clones share the same document and pipeline.
#[derive(Clone)]
pub struct SaveCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    session: SessionId,
    client: Arc<dyn PersistenceClient>,
    state: Mutex<PipelineState>,
    reporter: StatusReporter,
}

struct PipelineState {
    document: DocumentState,
    in_flight: bool,
    pending: Option<FieldOverrides>,
}

/// A request built from a snapshot, ready to send
#[derive(Debug)]
struct Outgoing {
    target: RouteTarget,
    body: SaveBody,
    /// Dirty version the snapshot reflects
    version: u64,
}

impl PipelineState {
    fn prepare(&self, overrides: &FieldOverrides) -> Outgoing {
        let mut fields = self.document.snapshot();
        overrides.apply_to(&mut fields);

        Outgoing {
            target: fields.route(),
            body: build_body(&fields, self.document.reference_date()),
            version: self.document.dirty_version(),
        }
    }

    /// Release the active slot, or hand it straight to the queued intents
    fn next_request(&mut self) -> Option<Outgoing> {
        match self.pending.take() {
            Some(overrides) => Some(self.prepare(&overrides)),
            None => {
                self.in_flight = false;
                None
            }
        }
    }
}

impl SaveCoordinator {
    /// Create coordinator from the initial snapshot
    ///
    /// The snapshot counts as saved.
    #[must_use]
    pub fn new(client: Arc<dyn PersistenceClient>, snapshot: PostFields, config: &EditorConfig) -> Self {
        let session = SessionId::new();
        tracing::debug!(%session, id = ?snapshot.id, "coordinator created");

        Self {
            shared: Arc::new(Shared {
                session,
                client,
                state: Mutex::new(PipelineState {
                    document: DocumentState::new(snapshot),
                    in_flight: false,
                    pending: None,
                }),
                reporter: StatusReporter::new(config.saved_reset(), config.error_reset()),
            }),
        }
    }

    /// Session identifier used in logs
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.shared.session
    }

    /// Current fields by value
    #[must_use]
    pub fn fields(&self) -> PostFields {
        self.shared.state.lock().document.snapshot()
    }

    /// Check for unsaved local edits
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.shared.state.lock().document.is_dirty()
    }

    /// Local edit count
    #[must_use]
    pub fn dirty_version(&self) -> u64 {
        self.shared.state.lock().document.dirty_version()
    }

    /// Edit count covered by the last confirmed save
    #[must_use]
    pub fn saved_version(&self) -> u64 {
        self.shared.state.lock().document.saved_version()
    }

    /// Date last confirmed by the store
    #[must_use]
    pub fn reference_date(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .document
            .reference_date()
            .map(str::to_owned)
    }

    /// Check if a request is in flight
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.shared.state.lock().in_flight
    }

    /// Current save status
    #[inline]
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.shared.reporter.status()
    }

    /// Receiver notified on every status transition
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.reporter.subscribe()
    }

    /// Message of the most recent failed save
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.reporter.last_error()
    }

    /// Apply a local edit; returns the new dirty version
    ///
    /// `updater` runs under the pipeline lock and must not call back into
    /// the coordinator.
    pub fn mutate<F>(&self, updater: F) -> u64
    where
        F: FnOnce(&mut PostFields),
    {
        self.shared.state.lock().document.mutate(updater)
    }

    /// Save the current document with `overrides` applied on top
    ///
    /// If a save is already in flight the overrides are merged into the
    /// pending bucket and the call returns `SaveOutcome::Queued` at once; the
    /// bucket is sent as one follow-up request after the active one settles.
    /// A queued caller is not told how that follow-up ends. Its outcome shows
    /// only through [`status`](Self::status) and
    /// [`last_error`](Self::last_error).
    ///
    /// Inside a tokio runtime the request runs on its own task, so cancelling
    /// this future (e.g. with `tokio::time::timeout`) does not stall the
    /// pipeline. Outside one, the request and any follow-ups run inline on
    /// the caller's executor and the future must be polled to completion.
    ///
    /// # Errors
    /// `SaveError::Persist` if the store rejects this call's request. The
    /// working document is left untouched. `SaveError::Interrupted` if the
    /// pump task stopped before replying (runtime shutdown).
    pub async fn save(&self, overrides: FieldOverrides) -> Result<SaveOutcome, SaveError> {
        let outgoing = {
            let mut state = self.shared.state.lock();
            if state.in_flight {
                state
                    .pending
                    .get_or_insert_with(FieldOverrides::default)
                    .merge(overrides);
                tracing::debug!(session = %self.shared.session, "save queued behind in-flight request");
                return Ok(SaveOutcome::Queued);
            }
            state.in_flight = true;
            state.prepare(&overrides)
        };

        let (reply, confirmed) = oneshot::channel();
        let pump = self.clone().pump(outgoing, reply);
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(pump);
            }
            Err(_) => pump.await,
        }

        match confirmed.await {
            Ok(result) => result.map(SaveOutcome::Persisted),
            Err(_) => Err(SaveError::Interrupted),
        }
    }

    /// Save with status set to published
    ///
    /// # Errors
    /// Same as [`save`](Self::save)
    pub async fn publish(&self) -> Result<SaveOutcome, SaveError> {
        self.save(FieldOverrides::status(PostStatus::Published)).await
    }

    /// Send `outgoing`, then every follow-up handed over, until the bucket is empty
    async fn pump(self, mut outgoing: Outgoing, reply: Reply) {
        let mut reply = Some(reply);
        loop {
            let (result, next) = self.send(outgoing).await;

            match reply.take() {
                Some(tx) => {
                    if tx.send(result.map_err(SaveError::from)).is_err() {
                        tracing::debug!(session = %self.shared.session, "save caller went away before the reply");
                    }
                }
                None => {
                    if let Err(e) = result {
                        tracing::warn!(session = %self.shared.session, error = %e, "queued save failed");
                    }
                }
            }

            match next {
                Some(follow_up) => {
                    tracing::debug!(session = %self.shared.session, "sending queued save");
                    outgoing = follow_up;
                }
                None => break,
            }
        }
    }

    /// One request: persist, settle the document, release or hand over the slot
    async fn send(
        &self,
        outgoing: Outgoing,
    ) -> (Result<PersistedFields, PersistError>, Option<Outgoing>) {
        let shared = &self.shared;
        let cycle = shared.reporter.begin();
        tracing::info!(
            session = %shared.session,
            endpoint = %outgoing.target.endpoint(),
            version = outgoing.version,
            "saving document"
        );

        let result = shared.client.persist(&outgoing.target, &outgoing.body).await;

        let next = {
            let mut state = shared.state.lock();
            if let Ok(confirmed) = &result {
                state.document.confirm(confirmed, outgoing.version);
            }
            state.next_request()
        };

        // Once the slot is released a newer request may already have begun;
        // the reporter drops this settle if so.
        match &result {
            Ok(confirmed) => {
                tracing::info!(session = %shared.session, id = %confirmed.id, status = %confirmed.status, "document saved");
                shared.reporter.succeeded(cycle);
            }
            Err(e) => {
                tracing::warn!(session = %shared.session, error = %e, "save failed");
                shared.reporter.failed(cycle, e.message());
            }
        }

        (result, next)
    }
}

impl std::fmt::Debug for SaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SaveCoordinator")
            .field("session", &self.shared.session)
            .field("dirty_version", &state.document.dirty_version())
            .field("saved_version", &state.document.saved_version())
            .field("in_flight", &state.in_flight)
            .field("status", &self.shared.reporter.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockPersistenceClient;
    use crate::error::PersistError;
    use crate::types::DocumentId;
    use mockall::predicate::always;

    fn snapshot() -> PostFields {
        PostFields {
            id: Some(DocumentId(42)),
            title: "Test Post".into(),
            content: "<p>Hello</p>".into(),
            lexical_state: r#"{"root":{}}"#.into(),
            slug: "test-post".into(),
            date: Some("2024-01-15T10:30:00".into()),
            categories: vec![1],
            rest_base: Some("posts".into()),
            ..PostFields::default()
        }
    }

    fn confirmed(status: PostStatus) -> PersistedFields {
        PersistedFields {
            id: DocumentId(42),
            status,
            slug: "test-post".into(),
            date: Some("2024-01-15T10:30:00".into()),
            modified: Some("2024-01-15T10:31:00".into()),
        }
    }

    fn coordinator(client: MockPersistenceClient) -> SaveCoordinator {
        SaveCoordinator::new(Arc::new(client), snapshot(), &EditorConfig::default())
    }

    #[tokio::test]
    async fn save_sends_snapshot_to_routed_endpoint() {
        let mut client = MockPersistenceClient::new();
        client
            .expect_persist()
            .withf(|target, body| {
                target.endpoint() == "wp/v2/posts/42"
                    && body.title == "Test Post"
                    && body.lexical_state == r#"{"root":{}}"#
                    && body.date.is_none()
            })
            .times(1)
            .returning(|_, _| Ok(confirmed(PostStatus::Draft)));

        let coord = coordinator(client);
        let outcome = coord.save(FieldOverrides::new()).await.unwrap();

        assert!(outcome.persisted().is_some());
        assert_eq!(coord.status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn publish_overrides_status() {
        let mut client = MockPersistenceClient::new();
        client
            .expect_persist()
            .withf(|_, body| body.status == PostStatus::Published)
            .times(1)
            .returning(|_, _| Ok(confirmed(PostStatus::Published)));

        let coord = coordinator(client);
        coord.publish().await.unwrap();

        assert_eq!(coord.fields().status, PostStatus::Published);
    }

    #[tokio::test]
    async fn failure_leaves_document_dirty_and_propagates() {
        let mut client = MockPersistenceClient::new();
        client
            .expect_persist()
            .with(always(), always())
            .times(1)
            .returning(|_, _| Err(PersistError::Transport("Network error".into())));

        let coord = coordinator(client);
        coord.mutate(|f| f.title = "Changed".into());

        let err = coord.save(FieldOverrides::new()).await.unwrap_err();

        assert!(matches!(err, SaveError::Persist(PersistError::Transport(_))));
        assert!(coord.is_dirty());
        assert_eq!(coord.fields().title, "Changed");
        assert_eq!(coord.status(), SaveStatus::Error);
        assert!(!coord.is_saving());
    }

    #[tokio::test]
    async fn latest_edit_is_sent() {
        let mut client = MockPersistenceClient::new();
        client
            .expect_persist()
            .withf(|_, body| body.title == "Final")
            .times(1)
            .returning(|_, _| Ok(confirmed(PostStatus::Draft)));

        let coord = coordinator(client);
        coord.mutate(|f| f.title = "First".into());
        coord.mutate(|f| f.title = "Second".into());
        coord.mutate(|f| f.title = "Final".into());

        coord.save(FieldOverrides::new()).await.unwrap();
        assert!(!coord.is_dirty());
    }

    #[test]
    fn save_runs_inline_without_runtime() {
        let mut client = MockPersistenceClient::new();
        client
            .expect_persist()
            .times(1)
            .returning(|_, _| Ok(confirmed(PostStatus::Draft)));

        let coord = coordinator(client);
        coord.mutate(|f| f.title = "Offline executor".into());

        let outcome = futures::executor::block_on(coord.save(FieldOverrides::new())).unwrap();

        assert!(outcome.persisted().is_some());
        assert!(!coord.is_dirty());
        assert!(!coord.is_saving());
        assert_eq!(coord.status(), SaveStatus::Saved);
    }

    #[tokio::test]
    async fn server_slug_is_merged_without_dirtying() {
        let mut client = MockPersistenceClient::new();
        client.expect_persist().times(1).returning(|_, _| {
            Ok(PersistedFields {
                slug: "updated-slug".into(),
                ..confirmed(PostStatus::Draft)
            })
        });

        let coord = coordinator(client);
        coord.save(FieldOverrides::new()).await.unwrap();

        assert_eq!(coord.fields().slug, "updated-slug");
        assert!(!coord.is_dirty());
    }
}
