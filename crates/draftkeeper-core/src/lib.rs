//! draftkeeper core - draft persistence for content editors
//!
//! Keeps an editor's working document and the remote store in step:
//! - Tracks unsaved edits with O(1) version counters
//! - Serializes saves into one in-flight request, coalescing the rest
//! - Drives a fixed-period autosave and an unload guard
//! - Reports a `idle | saving | saved | error` status with timed resets
//!
//! # Example
//!
//! ```rust,ignore
//! use draftkeeper_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(snapshot: PostFields) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let guards = Arc::new(GuardRegistry::new());
//! let session = EditorSession::start(store, snapshot, &EditorConfig::new(), guards);
//!
//! let doc = session.coordinator();
//! doc.mutate(|f| f.title = "Hello".into());
//! doc.publish().await?;
//! assert!(!doc.is_dirty());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod autosave;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod error;
pub mod memory;
pub mod payload;
pub mod session;
pub mod status;
pub mod types;

// Re-exports for convenience
pub use autosave::{
    AutoSaveHandle, AutoSaveScheduler, AutoSaveTarget, GuardId, GuardRegistry, UnloadDecision,
    UnloadGuard, UnloadGuardHost,
};
pub use client::PersistenceClient;
pub use config::EditorConfig;
pub use coordinator::SaveCoordinator;
pub use document::DocumentState;
pub use error::{ConfigError, PersistError, SaveError};
pub use memory::{MemoryStore, RecordedRequest};
pub use session::EditorSession;
pub use status::{actions_enabled, publish_label, save_label, SaveCycle, SaveStatus, StatusReporter};
pub use types::{
    DocumentId, FieldOverrides, PersistedFields, PostFields, PostStatus, RouteTarget, SaveBody,
    SaveOutcome, SessionId, DEFAULT_REST_BASE,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for hosting an editing session
    pub use crate::{
        EditorConfig, EditorSession, FieldOverrides, GuardRegistry, MemoryStore,
        PersistenceClient, PostFields, PostStatus, SaveCoordinator, SaveError, SaveOutcome,
        SaveStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
