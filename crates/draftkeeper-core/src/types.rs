//! Core types for draftkeeper
//!
//! Defines the document model shared by every component:
//! - Document and session identifiers
//! - Post status and the persistable field set
//! - Whole-field overrides carried by save requests
//! - Outgoing request bodies and server-confirmed fields

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Routing key used when a document carries none
pub const DEFAULT_REST_BASE: &str = "posts";

/// Identifier assigned by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique editing-session identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Publication state of a post
///
/// Wire names follow the WordPress REST API. `published` and `auto-draft`
/// are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostStatus {
    /// Not visible, still being written
    #[default]
    #[serde(alias = "auto-draft")]
    Draft,
    /// Awaiting review
    Pending,
    /// Published but visible to editors only
    Private,
    /// Publicly visible
    #[serde(rename = "publish", alias = "published")]
    Published,
    /// Scheduled for a future date
    Future,
}

impl PostStatus {
    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Published => "publish",
            Self::Future => "future",
        }
    }

    /// Check if the post is publicly live
    #[inline]
    #[must_use]
    pub fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working copy of a post
///
/// Missing keys in a snapshot fall back to defaults. Keys outside the known
/// set are kept in `extra` and travel with the document but are never sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFields {
    /// Store-assigned id, absent before the first save
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    /// Post title
    pub title: String,
    /// Rendered body
    pub content: String,
    /// Serialized editor state, opaque to the core
    pub lexical_state: String,
    /// Publication state
    pub status: PostStatus,
    /// URL slug
    pub slug: String,
    /// Excerpt
    pub excerpt: String,
    /// Scheduled date, `YYYY-MM-DDTHH:MM[:SS]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Last modification timestamp reported by the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Category ids
    pub categories: Vec<u64>,
    /// Tag ids
    pub tags: Vec<u64>,
    /// Featured media id, 0 when unset
    pub featured_media: u64,
    /// Storage-routing key (`posts`, `pages`, custom types)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_base: Option<String>,
    /// Any other attribute
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostFields {
    /// Where saves for this document are routed
    #[must_use]
    pub fn route(&self) -> RouteTarget {
        RouteTarget::new(self.rest_base.as_deref(), self.id)
    }
}

/// Whole-field replacements applied over a snapshot before sending
///
/// Each present value replaces the entire field; lists are never merged
/// element-wise. `merge` keeps the later value for every field both sides set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOverrides {
    /// Title
    pub title: Option<String>,
    /// Rendered body
    pub content: Option<String>,
    /// Serialized editor state
    pub lexical_state: Option<String>,
    /// Publication state
    pub status: Option<PostStatus>,
    /// Slug
    pub slug: Option<String>,
    /// Excerpt
    pub excerpt: Option<String>,
    /// Scheduled date
    pub date: Option<String>,
    /// Category ids
    pub categories: Option<Vec<u64>>,
    /// Tag ids
    pub tags: Option<Vec<u64>>,
    /// Featured media id
    pub featured_media: Option<u64>,
}

impl FieldOverrides {
    /// No overrides
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override only the status
    #[inline]
    #[must_use]
    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// With title
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// With date
    #[inline]
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// With categories
    #[inline]
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<u64>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// With tags
    #[inline]
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<u64>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Check if nothing is overridden
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `later` into `self`; later values win
    pub fn merge(&mut self, later: FieldOverrides) {
        self.title = later.title.or(self.title.take());
        self.content = later.content.or(self.content.take());
        self.lexical_state = later.lexical_state.or(self.lexical_state.take());
        self.status = later.status.or(self.status);
        self.slug = later.slug.or(self.slug.take());
        self.excerpt = later.excerpt.or(self.excerpt.take());
        self.date = later.date.or(self.date.take());
        self.categories = later.categories.or(self.categories.take());
        self.tags = later.tags.or(self.tags.take());
        self.featured_media = later.featured_media.or(self.featured_media);
    }

    /// Write every present value into `fields`
    pub fn apply_to(&self, fields: &mut PostFields) {
        if let Some(title) = &self.title {
            fields.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            fields.content.clone_from(content);
        }
        if let Some(state) = &self.lexical_state {
            fields.lexical_state.clone_from(state);
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
        if let Some(slug) = &self.slug {
            fields.slug.clone_from(slug);
        }
        if let Some(excerpt) = &self.excerpt {
            fields.excerpt.clone_from(excerpt);
        }
        if let Some(date) = &self.date {
            fields.date = Some(date.clone());
        }
        if let Some(categories) = &self.categories {
            fields.categories.clone_from(categories);
        }
        if let Some(tags) = &self.tags {
            fields.tags.clone_from(tags);
        }
        if let Some(media) = self.featured_media {
            fields.featured_media = media;
        }
    }
}

/// Allowlisted body sent to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveBody {
    /// Title
    pub title: String,
    /// Rendered body
    pub content: String,
    /// Publication state
    pub status: PostStatus,
    /// Slug
    pub slug: String,
    /// Excerpt
    pub excerpt: String,
    /// Category ids
    pub categories: Vec<u64>,
    /// Tag ids
    pub tags: Vec<u64>,
    /// Featured media id
    pub featured_media: u64,
    /// Serialized editor state
    pub lexical_state: String,
    /// Only present when the user changed the schedule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Fields the store confirms after a successful persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFields {
    /// Store-assigned id
    pub id: DocumentId,
    /// Status after the write
    pub status: PostStatus,
    /// Slug after the write (the store may derive one)
    pub slug: String,
    /// Effective schedule date
    #[serde(default)]
    pub date: Option<String>,
    /// Modification timestamp
    #[serde(default)]
    pub modified: Option<String>,
}

/// Collection and id a save is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    /// Collection name
    pub rest_base: String,
    /// Document id, `None` to create
    pub id: Option<DocumentId>,
}

impl RouteTarget {
    /// Build a target, falling back to [`DEFAULT_REST_BASE`]
    #[must_use]
    pub fn new(rest_base: Option<&str>, id: Option<DocumentId>) -> Self {
        let rest_base = match rest_base {
            Some(base) if !base.trim().is_empty() => base.trim().to_string(),
            _ => DEFAULT_REST_BASE.to_string(),
        };
        Self { rest_base, id }
    }

    /// Path relative to the REST root
    #[must_use]
    pub fn endpoint(&self) -> String {
        match self.id {
            Some(id) => format!("wp/v2/{}/{}", self.rest_base, id),
            None => format!("wp/v2/{}", self.rest_base),
        }
    }
}

/// Result of a `save()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// This call drove a request and the store confirmed it
    Persisted(PersistedFields),
    /// A request was already in flight; the overrides were queued for the follow-up
    Queued,
}

impl SaveOutcome {
    /// Confirmed fields, if this call persisted
    #[inline]
    #[must_use]
    pub fn persisted(&self) -> Option<&PersistedFields> {
        match self {
            Self::Persisted(fields) => Some(fields),
            Self::Queued => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_snapshot_gets_defaults() {
        let fields: PostFields = serde_json::from_value(json!({ "id": 1 })).unwrap();

        assert_eq!(fields.id, Some(DocumentId(1)));
        assert_eq!(fields.title, "");
        assert!(fields.categories.is_empty());
        assert!(fields.tags.is_empty());
        assert_eq!(fields.featured_media, 0);
        assert_eq!(fields.status, PostStatus::Draft);
    }

    #[test]
    fn auto_draft_normalizes_to_draft() {
        let fields: PostFields =
            serde_json::from_value(json!({ "id": 1, "status": "auto-draft" })).unwrap();
        assert_eq!(fields.status, PostStatus::Draft);
    }

    #[test]
    fn published_accepts_both_spellings() {
        let a: PostStatus = serde_json::from_value(json!("publish")).unwrap();
        let b: PostStatus = serde_json::from_value(json!("published")).unwrap();
        assert_eq!(a, PostStatus::Published);
        assert_eq!(b, PostStatus::Published);
        assert_eq!(serde_json::to_value(PostStatus::Published).unwrap(), json!("publish"));
    }

    #[test]
    fn unknown_keys_survive_in_extra() {
        let fields: PostFields = serde_json::from_value(json!({
            "id": 3,
            "preview_url": "https://example.test/?p=3"
        }))
        .unwrap();
        assert_eq!(fields.extra["preview_url"], json!("https://example.test/?p=3"));
    }

    #[test]
    fn route_defaults_to_posts() {
        let target = RouteTarget::new(None, Some(DocumentId(42)));
        assert_eq!(target.endpoint(), "wp/v2/posts/42");

        let target = RouteTarget::new(Some("pages"), Some(DocumentId(99)));
        assert_eq!(target.endpoint(), "wp/v2/pages/99");

        let target = RouteTarget::new(Some(""), None);
        assert_eq!(target.endpoint(), "wp/v2/posts");
    }

    #[test]
    fn merge_later_wins_whole_field() {
        let mut pending = FieldOverrides::new().with_tags(vec![1, 2]).with_title("a");
        pending.merge(FieldOverrides::status(PostStatus::Published).with_tags(vec![3]));

        assert_eq!(pending.tags, Some(vec![3]));
        assert_eq!(pending.title.as_deref(), Some("a"));
        assert_eq!(pending.status, Some(PostStatus::Published));
    }

    #[test]
    fn apply_leaves_unset_fields_alone() {
        let mut fields = PostFields {
            title: "kept".into(),
            ..PostFields::default()
        };
        FieldOverrides::status(PostStatus::Pending).apply_to(&mut fields);

        assert_eq!(fields.title, "kept");
        assert_eq!(fields.status, PostStatus::Pending);
    }

    #[test]
    fn empty_overrides() {
        assert!(FieldOverrides::new().is_empty());
        assert!(!FieldOverrides::status(PostStatus::Draft).is_empty());
    }
}
