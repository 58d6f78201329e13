//! # Document State
//!
//! Working copy of a post plus the two counters that decide whether it has
//! unsaved changes.
//!
//! ## Lifecycle
//!
//! ```text
//! snapshot → mutate* → snapshot() → persist → confirm(version)
//!    ↓          ↓                                ↓
//! saved=0   dirty+=1                       saved=version
//! ```
//!
//! Dirtiness is `dirty_version != saved_version`, never a deep comparison
//! of the fields.

use crate::types::{PersistedFields, PostFields};

/// Working copy plus dirty/saved bookkeeping
#[derive(Debug, Clone)]
pub struct DocumentState {
    fields: PostFields,
    /// Incremented once per `mutate` call
    dirty_version: u64,
    /// Dirty version covered by the last confirmed save
    saved_version: u64,
    /// Date last confirmed by the store
    reference_date: Option<String>,
}

impl DocumentState {
    /// Seed from an initial snapshot, which counts as already saved
    #[must_use]
    pub fn new(snapshot: PostFields) -> Self {
        let reference_date = snapshot.date.clone();
        Self {
            fields: snapshot,
            dirty_version: 0,
            saved_version: 0,
            reference_date,
        }
    }

    /// Apply a local edit and bump the dirty version
    ///
    /// No validation happens here.
    pub fn mutate<F>(&mut self, updater: F) -> u64
    where
        F: FnOnce(&mut PostFields),
    {
        updater(&mut self.fields);
        self.dirty_version += 1;
        self.dirty_version
    }

    /// Merge server-confirmed fields without touching the dirty version
    pub fn apply_server_fields(&mut self, confirmed: &PersistedFields) {
        self.fields.id = Some(confirmed.id);
        self.fields.slug.clone_from(&confirmed.slug);
        self.fields.status = confirmed.status;
        if confirmed.date.is_some() {
            self.fields.date.clone_from(&confirmed.date);
        }
        if confirmed.modified.is_some() {
            self.fields.modified.clone_from(&confirmed.modified);
        }
    }

    /// Record a confirmed save
    ///
    /// `version` is the dirty version captured when the request was built.
    /// Edits made while the request was in flight stay dirty.
    pub fn confirm(&mut self, confirmed: &PersistedFields, version: u64) {
        self.apply_server_fields(confirmed);
        self.saved_version = self.saved_version.max(version);
        self.reference_date.clone_from(&confirmed.date);
    }

    /// Current fields by value
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> PostFields {
        self.fields.clone()
    }

    /// Borrow current fields
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &PostFields {
        &self.fields
    }

    /// Check for unsaved local edits
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty_version != self.saved_version
    }

    /// Number of local edits so far
    #[inline]
    #[must_use]
    pub fn dirty_version(&self) -> u64 {
        self.dirty_version
    }

    /// Dirty version covered by the last confirmed save
    #[inline]
    #[must_use]
    pub fn saved_version(&self) -> u64 {
        self.saved_version
    }

    /// Date last confirmed by the store
    #[inline]
    #[must_use]
    pub fn reference_date(&self) -> Option<&str> {
        self.reference_date.as_deref()
    }
}
