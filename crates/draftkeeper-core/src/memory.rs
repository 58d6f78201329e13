//! In-memory persistence store
//!
//! A [`PersistenceClient`] that keeps documents in process. Used by the
//! session simulator and by tests that need store-like behavior (id
//! assignment, slug derivation, timestamps) rather than scripted replies.

use crate::client::PersistenceClient;
use crate::error::PersistError;
use crate::types::{DocumentId, PersistedFields, RouteTarget, SaveBody};
use async_trait::async_trait;
use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// A request as the store received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Where it was addressed
    pub target: RouteTarget,
    /// What was sent
    pub body: SaveBody,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    body: SaveBody,
    confirmed: PersistedFields,
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    documents: HashMap<(String, DocumentId), StoredDocument>,
    requests: Vec<RecordedRequest>,
    failures_pending: u32,
}

/// Process-local document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    latency: Duration,
    /// Every n-th request fails
    fail_every: Option<u64>,
}

impl MemoryStore {
    /// Create empty store with no latency and no failures
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a fixed delay before every reply
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// With every `n`-th request failing (0 disables)
    #[inline]
    #[must_use]
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// Fail the next `count` requests
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failures_pending += count;
    }

    /// Every request received so far
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Last body stored for a document
    #[must_use]
    pub fn stored_body(&self, rest_base: &str, id: DocumentId) -> Option<SaveBody> {
        self.state
            .lock()
            .documents
            .get(&(rest_base.to_string(), id))
            .map(|doc| doc.body.clone())
    }

    /// Confirmed fields for a document
    #[must_use]
    pub fn get(&self, rest_base: &str, id: DocumentId) -> Option<PersistedFields> {
        self.state
            .lock()
            .documents
            .get(&(rest_base.to_string(), id))
            .map(|doc| doc.confirmed.clone())
    }
}

#[async_trait]
impl PersistenceClient for MemoryStore {
    async fn persist(
        &self,
        target: &RouteTarget,
        body: &SaveBody,
    ) -> Result<PersistedFields, PersistError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            target: target.clone(),
            body: body.clone(),
        });
        let count = state.requests.len() as u64;

        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(PersistError::Injected("simulated failure".to_string()));
        }
        if self.fail_every.is_some_and(|n| count % n == 0) {
            return Err(PersistError::Injected(format!("simulated failure on request {count}")));
        }

        let id = match target.id {
            Some(id) => {
                state.next_id = state.next_id.max(id.0);
                id
            }
            None => {
                state.next_id += 1;
                DocumentId(state.next_id)
            }
        };

        let key = (target.rest_base.clone(), id);
        let previous = state.documents.get(&key).map(|doc| doc.confirmed.clone());
        let now = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S").to_string();

        let slug = if !body.slug.is_empty() {
            body.slug.clone()
        } else if let Some(prev) = previous.as_ref().filter(|p| !p.slug.is_empty()) {
            prev.slug.clone()
        } else {
            slugify(&body.title).unwrap_or_else(|| id.to_string())
        };

        let date = body
            .date
            .clone()
            .or_else(|| previous.and_then(|p| p.date))
            .unwrap_or_else(|| now.clone());

        let confirmed = PersistedFields {
            id,
            status: body.status,
            slug,
            date: Some(date),
            modified: Some(now),
        };

        tracing::trace!(endpoint = %target.endpoint(), id = %id, "memory store write");
        state.documents.insert(
            key,
            StoredDocument {
                body: body.clone(),
                confirmed: confirmed.clone(),
            },
        );

        Ok(confirmed)
    }
}

/// Lowercase, dash-separated slug; `None` if nothing usable remains
fn slugify(title: &str) -> Option<String> {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostStatus;

    fn body(title: &str) -> SaveBody {
        SaveBody {
            title: title.into(),
            content: String::new(),
            status: PostStatus::Draft,
            slug: String::new(),
            excerpt: String::new(),
            categories: vec![],
            tags: vec![],
            featured_media: 0,
            lexical_state: String::new(),
            date: None,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Hello,  World!").as_deref(), Some("hello-world"));
        assert_eq!(slugify("  ").as_deref(), None);
    }

    #[tokio::test]
    async fn creates_then_updates() {
        let store = MemoryStore::new();
        let create = RouteTarget::new(Some("pages"), None);

        let first = store.persist(&create, &body("About Us")).await.unwrap();
        assert_eq!(first.id, DocumentId(1));
        assert_eq!(first.slug, "about-us");

        let update = RouteTarget::new(Some("pages"), Some(first.id));
        let second = store.persist(&update, &body("About the team")).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.slug, "about-us");
        assert_eq!(second.date, first.date);
        assert_eq!(store.request_count(), 2);
        assert_eq!(
            store.stored_body("pages", first.id).map(|b| b.title),
            Some("About the team".to_string())
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryStore::new().with_failure_every(2);
        let target = RouteTarget::new(None, Some(DocumentId(7)));

        assert!(store.persist(&target, &body("a")).await.is_ok());
        assert!(store.persist(&target, &body("b")).await.is_err());

        store.fail_next(1);
        let err = store.persist(&target, &body("c")).await.unwrap_err();
        assert_eq!(err.message(), "simulated failure");
        assert_eq!(store.request_count(), 3);
    }

    #[tokio::test]
    async fn explicit_date_wins() {
        let store = MemoryStore::new();
        let target = RouteTarget::new(None, Some(DocumentId(3)));
        let mut b = body("dated");
        b.date = Some("2024-06-01T09:00:00".into());

        let confirmed = store.persist(&target, &b).await.unwrap();
        assert_eq!(confirmed.date.as_deref(), Some("2024-06-01T09:00:00"));
        assert_eq!(store.get("posts", DocumentId(3)), Some(confirmed));
    }
}
