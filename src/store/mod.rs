//! Store collaborators
//!
//! The publishing core talks to its data store only through the traits in
//! this module. Every operation runs inside a [`Transaction`] obtained from a
//! [`Store`]; a transaction sees one consistent read view, and dropping it
//! without calling [`Transaction::commit`] discards all of its writes.
//!
//! Relational schema (Postgres flavour, including the generated sort key):
//! see [`POSTGRES_SCHEMA`].

pub mod memory;
pub mod sort_key;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::error::StoreError;
use crate::history::{ChangeEvent, HistoryScope};

pub use memory::{MemoryStore, MemoryTransaction};
pub use sort_key::derive_sort_key;

/// DDL for a relational deployment of the same contract
pub const POSTGRES_SCHEMA: &str = include_str!("schema.sql");

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A project row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    pub description: Option<String>,
}

/// A concept scheme row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub uri: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A concept row, without its relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub id: Uuid,
    pub scheme_id: Uuid,
    pub uri: Option<String>,
    pub pref_label: Option<String>,
    #[serde(default)]
    pub alt_labels: Vec<String>,
    pub definition: Option<String>,
    pub scope_note: Option<String>,
    pub notation: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A concept row joined with its broader/related link tables
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptRow {
    pub concept: ConceptRecord,
    pub broader_ids: Vec<Uuid>,
    pub related_ids: Vec<Uuid>,
}

/// How many values a property may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

/// An ontology property row
///
/// The range is stored as three nullable columns; the snapshot builder
/// resolves them into exactly one range kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub uri: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub domain_class: Option<String>,
    pub range_scheme_id: Option<Uuid>,
    pub range_class_uri: Option<String>,
    pub range_datatype: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub required: bool,
    pub created_at: DateTime<Utc>,
}

/// An ontology class row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub uri: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub parent_uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A published version as handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    pub id: Uuid,
    pub project_id: Uuid,
    pub label: String,
    pub title: String,
    pub notes: Option<String>,
    pub publisher: String,
    pub finalized: bool,
    pub published_at: DateTime<Utc>,
    pub snapshot: serde_json::Value,
    pub checksum: Checksum,
}

/// A persisted published version, with its store-derived sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(flatten)]
    pub version: NewVersion,
    pub sort_key: String,
}

/// Read access to project vocabulary
pub trait VocabularyReader {
    fn get_project(&self, id: Uuid) -> StoreResult<Option<ProjectRecord>>;

    fn get_scheme(&self, id: Uuid) -> StoreResult<Option<SchemeRecord>>;

    fn get_concept(&self, id: Uuid) -> StoreResult<Option<ConceptRecord>>;

    fn get_property(&self, id: Uuid) -> StoreResult<Option<PropertyRecord>>;

    fn get_class(&self, id: Uuid) -> StoreResult<Option<ClassRecord>>;

    fn list_schemes_for_project(&self, project_id: Uuid) -> StoreResult<Vec<SchemeRecord>>;

    /// Concepts of a scheme with broader/related ids resolved from the link
    /// tables. `related` links are symmetric.
    fn list_concepts_for_scheme(&self, scheme_id: Uuid) -> StoreResult<Vec<ConceptRow>>;

    fn list_properties_for_project(&self, project_id: Uuid) -> StoreResult<Vec<PropertyRecord>>;

    fn list_classes_for_project(&self, project_id: Uuid) -> StoreResult<Vec<ClassRecord>>;
}

/// Write access to project vocabulary (the CRUD side)
///
/// Cascade policy: deleting a scheme deletes its concepts; deleting a concept
/// deletes every broader/related link touching it; a property whose range
/// points at a deleted scheme has its range scheme set to null.
pub trait VocabularyWriter {
    fn put_project(&mut self, project: ProjectRecord) -> StoreResult<()>;

    fn put_scheme(&mut self, scheme: SchemeRecord) -> StoreResult<()>;

    fn delete_scheme(&mut self, id: Uuid) -> StoreResult<()>;

    fn put_concept(&mut self, concept: ConceptRecord) -> StoreResult<()>;

    /// Replace the outgoing broader and related links of a concept
    fn set_concept_links(
        &mut self,
        concept_id: Uuid,
        broader_ids: Vec<Uuid>,
        related_ids: Vec<Uuid>,
    ) -> StoreResult<()>;

    fn delete_concept(&mut self, id: Uuid) -> StoreResult<()>;

    fn put_property(&mut self, property: PropertyRecord) -> StoreResult<()>;

    fn delete_property(&mut self, id: Uuid) -> StoreResult<()>;

    fn put_class(&mut self, class: ClassRecord) -> StoreResult<()>;

    fn delete_class(&mut self, id: Uuid) -> StoreResult<()>;
}

/// Persisted-version store
pub trait VersionStore {
    /// Insert a version; the store derives its sort key.
    ///
    /// Fails with [`StoreError::UniqueViolation`] when the label is taken for
    /// the project or when a second draft would exist.
    fn insert_version(&mut self, version: NewVersion) -> StoreResult<VersionRecord>;

    /// Insert a version that must sort above every finalized version of
    /// its project
    ///
    /// The ordering is checked again at commit, so concurrent publishes
    /// cannot land out of order. Fails with [`StoreError::OrderViolation`].
    fn insert_newest_version(&mut self, version: NewVersion) -> StoreResult<VersionRecord>;

    /// The finalized version with the highest sort key
    fn find_latest_finalized(&self, project_id: Uuid) -> StoreResult<Option<VersionRecord>>;

    fn find_version(&self, project_id: Uuid, label: &str) -> StoreResult<Option<VersionRecord>>;

    /// All versions of a project, sort key descending
    fn list_versions(&self, project_id: Uuid) -> StoreResult<Vec<VersionRecord>>;
}

/// Append-only change event store
pub trait ChangeEventStore {
    fn insert_event(&mut self, event: ChangeEvent) -> StoreResult<()>;

    /// Events matching a scope, newest first
    fn query_events(
        &self,
        scope: &HistoryScope,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ChangeEvent>>;
}

/// A unit of work against the store
pub trait Transaction: VocabularyReader + VocabularyWriter + VersionStore + ChangeEventStore {
    /// Make every write of this transaction visible atomically
    fn commit(self) -> StoreResult<()>;
}

/// Source of per-request transactions
pub trait Store: Send + Sync {
    type Tx<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self) -> StoreResult<Self::Tx<'_>>;
}
