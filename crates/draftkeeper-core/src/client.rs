//! Remote persistence seam
//!
//! The coordinator only sees this trait. Implementations live elsewhere:
//! `MemoryStore` in this crate, the HTTP client in `draftkeeper-rest`.

use crate::error::PersistError;
use crate::types::{PersistedFields, RouteTarget, SaveBody};
use async_trait::async_trait;

/// Writes a document to the remote store
///
/// Calls may fail and are not assumed idempotent; the coordinator never
/// retries on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Persist `body` at `target` and return the confirmed fields
    async fn persist(
        &self,
        target: &RouteTarget,
        body: &SaveBody,
    ) -> Result<PersistedFields, PersistError>;
}
