//! Testing utilities for draftkeeper workspace
//!
//! Shared fixtures and a scripted persistence client whose replies can be
//! held open until a test releases them.

#![allow(missing_docs)]

use async_trait::async_trait;
use draftkeeper_core::{
    DocumentId, PersistError, PersistedFields, PersistenceClient, PostFields, PostStatus,
    RecordedRequest, RouteTarget, SaveBody,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{oneshot, watch};

pub const SAMPLE_DATE: &str = "2024-01-15T10:30:00";

type Reply = Result<PersistedFields, PersistError>;

/// Snapshot used across coordinator tests
pub fn sample_snapshot() -> PostFields {
    serde_json::from_value(serde_json::json!({
        "id": 42,
        "title": "Test Post",
        "content": "<p>Hello</p>",
        "lexical_state": "{\"root\":{}}",
        "status": "draft",
        "slug": "test-post",
        "excerpt": "",
        "date": SAMPLE_DATE,
        "categories": [1],
        "tags": [],
        "featured_media": 0,
        "rest_base": "posts"
    }))
    .unwrap()
}

pub fn confirmed(status: PostStatus) -> PersistedFields {
    confirmed_with_date(status, SAMPLE_DATE)
}

pub fn confirmed_with_date(status: PostStatus, date: &str) -> PersistedFields {
    PersistedFields {
        id: DocumentId(42),
        status,
        slug: "test-post".to_string(),
        date: Some(date.to_string()),
        modified: Some("2024-01-15T10:31:00".to_string()),
    }
}

enum Scripted {
    Now(Reply),
    Gated(oneshot::Receiver<Reply>),
}

/// Holds one scripted reply open until resolved
pub struct Gate(oneshot::Sender<Reply>);

impl Gate {
    pub fn resolve(self, fields: PersistedFields) {
        let _ = self.0.send(Ok(fields));
    }

    pub fn reject(self, error: PersistError) {
        let _ = self.0.send(Err(error));
    }
}

/// Persistence client driven by a queue of scripted replies
///
/// Unscripted calls echo the body back as confirmed fields.
pub struct ScriptedClient {
    calls: Mutex<Vec<RecordedRequest>>,
    script: Mutex<VecDeque<Scripted>>,
    count: watch::Sender<usize>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClient {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            count,
        }
    }

    /// Queue an immediate reply
    pub fn reply(&self, reply: Reply) {
        self.script.lock().push_back(Scripted::Now(reply));
    }

    /// Queue a reply that waits for the returned gate
    pub fn gate(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Scripted::Gated(rx));
        Gate(tx)
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn body(&self, index: usize) -> SaveBody {
        self.calls.lock()[index].body.clone()
    }

    /// Wait until at least `n` calls have been received
    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

fn echo(target: &RouteTarget, body: &SaveBody) -> PersistedFields {
    PersistedFields {
        id: target.id.unwrap_or(DocumentId(1)),
        status: body.status,
        slug: body.slug.clone(),
        date: Some(body.date.clone().unwrap_or_else(|| SAMPLE_DATE.to_string())),
        modified: Some("2024-01-15T10:35:00".to_string()),
    }
}

#[async_trait]
impl PersistenceClient for ScriptedClient {
    async fn persist(&self, target: &RouteTarget, body: &SaveBody) -> Reply {
        let next = {
            let mut calls = self.calls.lock();
            calls.push(RecordedRequest {
                target: target.clone(),
                body: body.clone(),
            });
            self.count.send_replace(calls.len());
            self.script.lock().pop_front()
        };

        match next {
            None => Ok(echo(target, body)),
            Some(Scripted::Now(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(PersistError::Transport("gate dropped".to_string()))),
        }
    }
}
