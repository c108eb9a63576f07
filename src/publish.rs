//! Publishing orchestrator
//!
//! Composes the snapshot builder, validator, differ and version ordering on
//! top of a [`Store`]. Every operation runs in its own transaction; a publish
//! either persists its version together with its audit record or persists
//! nothing.
//!
//! Lifecycle of a project: no versions, then at most one draft, then
//! finalized versions (repeating). `publish` writes finalized versions
//! directly; the draft state exists only as a store-level possibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::config::PublishConfig;
use crate::diff::{diff, DiffResult, DiffSummary};
use crate::error::{PublishError, Result, StoreError};
use crate::history::{self, Change, ChangeEventView, ChangeTracker, HistoryScope, Page};
use crate::snapshot::{build_snapshot, ContentSummary, VocabularySnapshot};
use crate::store::{
    NewVersion, Store, Transaction, VersionRecord, VersionStore, VocabularyReader,
};
use crate::validate::{validate, ValidationResult};
use crate::version::Version;

/// Entity type recorded on publish audit events
pub const PUBLISHED_VERSION_ENTITY: &str = "published_version";

/// A request to publish the current state of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Target version label, e.g. `1.2` or `1.3-pre1`
    pub version: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Must agree with whether `version` carries a `-preN` suffix
    #[serde(default)]
    pub pre_release: bool,
}

impl PublishRequest {
    pub fn new(version: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            title: title.into(),
            notes: None,
            pre_release: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn pre_release(mut self, pre_release: bool) -> Self {
        self.pre_release = pre_release;
        self
    }

    /// Check the request shape without touching the store
    pub fn check(&self) -> Result<Version> {
        if self.title.trim().is_empty() {
            return Err(PublishError::invalid_request("title must not be blank"));
        }

        let has_suffix = Version::has_pre_release_suffix(&self.version);
        if self.pre_release && !has_suffix {
            return Err(PublishError::invalid_request(format!(
                "pre-release requested but '{}' has no -preN suffix",
                self.version
            )));
        }
        if !self.pre_release && has_suffix {
            return Err(PublishError::invalid_request(format!(
                "'{}' is a pre-release label; set pre_release to publish it",
                self.version
            )));
        }

        Version::parse(&self.version)
    }
}

/// A published version as listed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedVersionView {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version: String,
    pub title: String,
    pub notes: Option<String>,
    pub publisher: String,
    pub finalized: bool,
    pub published_at: DateTime<Utc>,
    pub checksum: Checksum,
    pub pre_release: bool,
    /// Highest finalized version of the project
    pub latest: bool,
}

impl PublishedVersionView {
    fn from_record(record: &VersionRecord, latest: bool) -> Self {
        let v = &record.version;
        Self {
            id: v.id,
            project_id: v.project_id,
            version: v.label.clone(),
            title: v.title.clone(),
            notes: v.notes.clone(),
            publisher: v.publisher.clone(),
            finalized: v.finalized,
            published_at: v.published_at,
            checksum: v.checksum.clone(),
            pre_release: Version::has_pre_release_suffix(&v.label),
            latest,
        }
    }
}

/// A published version with its verified snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedVersion {
    #[serde(flatten)]
    pub info: PublishedVersionView,
    pub snapshot: VocabularySnapshot,
}

/// What publishing now would produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishPreview {
    pub project_id: Uuid,
    pub validation: ValidationResult,
    /// Against the latest finalized version, or everything added
    pub diff: DiffResult,
    pub diff_summary: DiffSummary,
    pub content_summary: ContentSummary,
    pub suggested_version: String,
    pub suggested_pre_release_version: String,
    /// Highest finalized release label
    pub latest_version: Option<String>,
    /// Highest finalized pre-release label
    pub latest_pre_release_version: Option<String>,
}

/// Publishing operations over a store
pub struct Publisher<S> {
    store: S,
    config: PublishConfig,
}

impl<S: Store> Publisher<S> {
    pub fn new(store: S, config: PublishConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Build, validate and diff the current state without writing anything
    pub fn preview(&self, project_id: Uuid) -> Result<PublishPreview> {
        let tx = self.store.begin()?;
        require_project(&tx, project_id)?;

        let snapshot = build_snapshot(&tx, project_id)?;
        let validation = validate(&snapshot);

        let versions = tx.list_versions(project_id)?;
        let latest = versions.iter().find(|r| r.version.finalized);
        let previous = latest
            .map(|r| VocabularySnapshot::from_document(r.version.snapshot.clone()))
            .transpose()?;
        let diff = diff(previous.as_ref(), &snapshot);

        let (suggested, suggested_pre) = match latest {
            Some(record) => {
                let latest = Version::parse(&record.version.label)?;
                (latest.next_release(), latest.next_pre_release())
            }
            None => {
                let initial = self.config.initial_version()?;
                let first_pre = Version::parse(&format!("{}-pre1", initial))?;
                (initial, first_pre)
            }
        };

        let finalized_label = |pre: bool| {
            versions
                .iter()
                .filter(|r| r.version.finalized)
                .find(|r| Version::has_pre_release_suffix(&r.version.label) == pre)
                .map(|r| r.version.label.clone())
        };

        Ok(PublishPreview {
            project_id,
            diff_summary: diff.summary(),
            content_summary: snapshot.content_summary(),
            validation,
            diff,
            suggested_version: suggested.to_string(),
            suggested_pre_release_version: suggested_pre.to_string(),
            latest_version: finalized_label(false),
            latest_pre_release_version: finalized_label(true),
        })
    }

    /// Publish the current state of a project as a finalized version
    ///
    /// `publisher` falls back to `publishing.default_publisher`.
    pub fn publish(
        &self,
        project_id: Uuid,
        request: &PublishRequest,
        publisher: Option<&str>,
    ) -> Result<PublishedVersionView> {
        let version = request.check()?;
        let publisher = self.resolve_publisher(publisher)?;

        let mut tx = self.store.begin()?;
        let (record, latest) = self.stage_publish(&mut tx, project_id, &version, request, &publisher)?;
        tx.commit()
            .map_err(|e| lost_race(e, project_id, &record.version.label))?;

        info!(
            project_id = %project_id,
            version = %record.version.label,
            publisher = %publisher,
            checksum = %record.version.checksum,
            "published version"
        );
        Ok(PublishedVersionView::from_record(&record, latest))
    }

    /// All versions of a project, highest version first
    pub fn list_versions(&self, project_id: Uuid) -> Result<Vec<PublishedVersionView>> {
        let tx = self.store.begin()?;
        require_project(&tx, project_id)?;

        let records = tx.list_versions(project_id)?;
        let latest_id = records
            .iter()
            .find(|r| r.version.finalized)
            .map(|r| r.version.id);

        Ok(records
            .iter()
            .map(|r| PublishedVersionView::from_record(r, Some(r.version.id) == latest_id))
            .collect())
    }

    /// One version with its snapshot; the stored checksum is re-verified
    pub fn get_version(&self, project_id: Uuid, label: &str) -> Result<PublishedVersion> {
        let tx = self.store.begin()?;
        require_project(&tx, project_id)?;

        let record = tx
            .find_version(project_id, label)?
            .ok_or_else(|| PublishError::not_found("version", label))?;

        let stored = &record.version;
        if !stored.checksum.verify_json(&stored.snapshot) {
            return Err(PublishError::Integrity {
                label: stored.label.clone(),
                expected: stored.checksum.to_string(),
                actual: Checksum::from_json(&stored.snapshot).to_string(),
            });
        }

        let latest = tx
            .find_latest_finalized(project_id)?
            .map_or(false, |l| l.version.id == stored.id);
        let snapshot = VocabularySnapshot::from_document(stored.snapshot.clone())?;

        Ok(PublishedVersion {
            info: PublishedVersionView::from_record(&record, latest),
            snapshot,
        })
    }

    /// Change history of a project, newest first
    pub fn history(
        &self,
        project_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<ChangeEventView>> {
        let tx = self.store.begin()?;
        history::project_history(&tx, project_id, self.page(limit, offset))
    }

    /// Change history of a concept scheme, newest first
    pub fn scheme_history(
        &self,
        scheme_id: Uuid,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<ChangeEventView>> {
        let tx = self.store.begin()?;
        history::scheme_history(&tx, scheme_id, self.page(limit, offset))
    }

    fn page(&self, limit: Option<usize>, offset: usize) -> Page {
        let history = &self.config.history;
        Page::clamped(limit.unwrap_or(history.default_limit), offset, history.max_limit)
    }

    fn resolve_publisher(&self, publisher: Option<&str>) -> Result<String> {
        publisher
            .or(self.config.publishing.default_publisher.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .ok_or_else(|| PublishError::invalid_request("publisher is required"))
    }

    /// Every publish step short of commit
    ///
    /// Returns the inserted record and whether it is now the latest
    /// finalized version.
    fn stage_publish<T: Transaction>(
        &self,
        tx: &mut T,
        project_id: Uuid,
        version: &Version,
        request: &PublishRequest,
        publisher: &str,
    ) -> Result<(VersionRecord, bool)> {
        require_project(&*tx, project_id)?;

        let snapshot = build_snapshot(&*tx, project_id)?;
        let validation = validate(&snapshot);
        if !validation.valid {
            warn!(
                project_id = %project_id,
                errors = validation.errors.len(),
                "publish rejected by validation"
            );
            return Err(PublishError::Validation(validation));
        }

        let label = version.to_string();
        if tx.find_version(project_id, &label)?.is_some() {
            return Err(PublishError::Conflict { project_id, label });
        }

        let previous = tx
            .find_latest_finalized(project_id)?
            .map(|r| Version::parse(&r.version.label))
            .transpose()?;
        if let Some(previous) = &previous {
            if self.config.publishing.enforce_monotonic && version <= previous {
                return Err(PublishError::VersionNotNewer {
                    requested: label,
                    latest: previous.to_string(),
                });
            }
        }
        let latest = previous.map_or(true, |p| *version > p);

        let document = snapshot.to_document()?;
        let checksum = Checksum::from_json(&document);
        let new_version = NewVersion {
            id: Uuid::now_v7(),
            project_id,
            label: label.clone(),
            title: request.title.trim().to_string(),
            notes: request.notes.clone().filter(|n| !n.trim().is_empty()),
            publisher: publisher.to_string(),
            finalized: true,
            published_at: Utc::now(),
            snapshot: document,
            checksum,
        };
        let inserted = if self.config.publishing.enforce_monotonic {
            tx.insert_newest_version(new_version)
        } else {
            tx.insert_version(new_version)
        };
        let record = inserted.map_err(|e| lost_race(e, project_id, &label))?;

        let audit = json!({
            "label": record.version.label,
            "title": record.version.title,
            "notes": record.version.notes,
            "publisher": record.version.publisher,
            "finalized": record.version.finalized,
            "checksum": record.version.checksum,
        });
        ChangeTracker::new(Some(publisher)).record(
            &mut *tx,
            &HistoryScope::project(project_id),
            PUBLISHED_VERSION_ENTITY,
            record.version.id,
            Change::Create { after: audit },
        )?;

        Ok((record, latest))
    }
}

fn require_project<R: VocabularyReader + ?Sized>(reader: &R, project_id: Uuid) -> Result<()> {
    match reader.get_project(project_id)? {
        Some(_) => Ok(()),
        None => Err(PublishError::not_found("project", project_id)),
    }
}

/// Unique or ordering violations on insert or commit mean another publisher won
fn lost_race(err: StoreError, project_id: Uuid, label: &str) -> PublishError {
    match err {
        StoreError::UniqueViolation { .. } => {
            warn!(project_id = %project_id, version = label, error = %err, "publish lost a race");
            PublishError::Conflict {
                project_id,
                label: label.to_string(),
            }
        }
        StoreError::OrderViolation { label, latest } => {
            warn!(project_id = %project_id, version = %label, latest = %latest, "publish overtaken");
            PublishError::VersionNotNewer {
                requested: label,
                latest,
            }
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::{
        ChangeEventStore, ConceptRecord, MemoryStore, MemoryTransaction, ProjectRecord,
        SchemeRecord, StoreResult, VocabularyWriter,
    };
    use crate::validate::ValidationCode;

    struct Fixture {
        publisher: Publisher<MemoryStore>,
        project_id: Uuid,
        concept_id: Uuid,
    }

    fn seed(store: &MemoryStore, with_scheme: bool) -> (Uuid, Uuid) {
        let project_id = Uuid::new_v4();
        let scheme_id = Uuid::new_v4();
        let concept_id = Uuid::new_v4();
        let mut tx = store.begin().unwrap();
        tx.put_project(ProjectRecord {
            id: project_id,
            name: "Animals".into(),
            namespace: "https://example.org/animals/".into(),
            description: None,
        })
        .unwrap();
        if with_scheme {
            tx.put_scheme(SchemeRecord {
                id: scheme_id,
                project_id,
                uri: Some("https://example.org/animals/scheme".into()),
                title: "Animals".into(),
                description: None,
                created_at: Utc::now(),
            })
            .unwrap();
            tx.put_concept(ConceptRecord {
                id: concept_id,
                scheme_id,
                uri: Some("https://example.org/animals/cat".into()),
                pref_label: Some("Cat".into()),
                alt_labels: vec![],
                definition: Some("A cat".into()),
                scope_note: None,
                notation: None,
                created_at: Utc::now(),
            })
            .unwrap();
        }
        tx.commit().unwrap();
        (project_id, concept_id)
    }

    fn fixture_with(config: PublishConfig) -> Fixture {
        let store = MemoryStore::new();
        let (project_id, concept_id) = seed(&store, true);
        Fixture {
            publisher: Publisher::new(store, config),
            project_id,
            concept_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PublishConfig::default())
    }

    fn redefine(f: &Fixture, definition: &str) {
        let mut tx = f.publisher.store().begin().unwrap();
        let scheme = tx.list_schemes_for_project(f.project_id).unwrap().remove(0);
        let mut concept = tx
            .list_concepts_for_scheme(scheme.id)
            .unwrap()
            .into_iter()
            .find(|row| row.concept.id == f.concept_id)
            .unwrap()
            .concept;
        concept.definition = Some(definition.into());
        tx.put_concept(concept).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_request_check() {
        assert!(PublishRequest::new("1.0", "First").check().is_ok());
        assert!(PublishRequest::new("1.0-pre1", "Draft").pre_release(true).check().is_ok());

        let mismatch = PublishRequest::new("1.0", "First").pre_release(true).check();
        assert!(matches!(mismatch, Err(PublishError::InvalidRequest(_))));

        let mismatch = PublishRequest::new("1.0-pre1", "Draft").check();
        assert!(matches!(mismatch, Err(PublishError::InvalidRequest(_))));

        let blank = PublishRequest::new("1.0", "   ").check();
        assert!(matches!(blank, Err(PublishError::InvalidRequest(_))));

        let malformed = PublishRequest::new("1.0.x", "First").check();
        assert!(matches!(malformed, Err(PublishError::InvalidVersion(_))));
    }

    /// A store that fails as soon as it is touched
    struct Untouchable;

    impl Store for Untouchable {
        type Tx<'a> = MemoryTransaction<'a>;

        fn begin(&self) -> StoreResult<MemoryTransaction<'_>> {
            Err(StoreError::Unavailable("store must not be touched".into()))
        }
    }

    #[test]
    fn test_bad_requests_rejected_before_store_access() {
        let publisher = Publisher::new(Untouchable, PublishConfig::default());
        let request = PublishRequest::new("1.0", "First").pre_release(true);
        let err = publisher
            .publish(Uuid::new_v4(), &request, Some("ana"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = publisher
            .publish(Uuid::new_v4(), &PublishRequest::new("1.0", "First"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_preview_of_unpublished_project() {
        let f = fixture();
        let preview = f.publisher.preview(f.project_id).unwrap();
        assert!(preview.validation.valid);
        assert_eq!(preview.diff_summary.added, 2);
        assert_eq!(preview.content_summary.concepts, 1);
        assert_eq!(preview.suggested_version, "1.0");
        assert_eq!(preview.suggested_pre_release_version, "1.0-pre1");
        assert_eq!(preview.latest_version, None);
        assert_eq!(preview.latest_pre_release_version, None);

        // Preview writes nothing
        let tx = f.publisher.store().begin().unwrap();
        assert!(tx.list_versions(f.project_id).unwrap().is_empty());
        assert!(tx
            .query_events(&HistoryScope::default(), 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_preview_unknown_project() {
        let f = fixture();
        let err = f.publisher.preview(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, PublishError::NotFound { entity: "project", .. }));
    }

    #[test]
    fn test_publish_then_preview_diff() {
        let f = fixture();
        let view = f
            .publisher
            .publish(f.project_id, &PublishRequest::new("1.0", "First"), Some("ana"))
            .unwrap();
        assert!(view.latest && view.finalized && !view.pre_release);
        assert_eq!(view.publisher, "ana");

        let unchanged = f.publisher.preview(f.project_id).unwrap();
        assert!(unchanged.diff.is_empty());
        assert_eq!(unchanged.suggested_version, "1.1");
        assert_eq!(unchanged.suggested_pre_release_version, "1.1-pre1");
        assert_eq!(unchanged.latest_version.as_deref(), Some("1.0"));

        redefine(&f, "A small domesticated feline");
        let changed = f.publisher.preview(f.project_id).unwrap();
        assert_eq!(changed.diff.modified.len(), 1);
        assert_eq!(changed.diff.modified[0].changes.len(), 1);
        assert_eq!(changed.diff.modified[0].changes[0].field, "definition");
    }

    #[test]
    fn test_publish_records_audit_event() {
        let f = fixture();
        let view = f
            .publisher
            .publish(
                f.project_id,
                &PublishRequest::new("1.0-pre1", "Draft").pre_release(true),
                Some("ana"),
            )
            .unwrap();
        assert!(view.pre_release);

        let history = f.publisher.history(f.project_id, None, 0).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].entity_type, PUBLISHED_VERSION_ENTITY);
        assert_eq!(history[0].entity_id, view.id);
        assert_eq!(history[0].actor.as_deref(), Some("ana"));
        assert_eq!(history[0].after_state.as_ref().unwrap()["label"], "1.0-pre1");
    }

    #[test]
    fn test_invalid_snapshot_is_not_published() {
        let store = MemoryStore::new();
        let (project_id, _) = seed(&store, false);
        let publisher = Publisher::new(store, PublishConfig::default());

        let err = publisher
            .publish(project_id, &PublishRequest::new("1.0", "First"), Some("ana"))
            .unwrap_err();
        match err {
            PublishError::Validation(result) => {
                assert_eq!(result.codes(), vec![ValidationCode::NoSchemes]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let tx = publisher.store().begin().unwrap();
        assert!(tx.list_versions(project_id).unwrap().is_empty());
        assert!(tx
            .query_events(&HistoryScope::default(), 10, 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_duplicate_label_conflicts() {
        let f = fixture();
        let request = PublishRequest::new("1.0", "First");
        f.publisher.publish(f.project_id, &request, Some("ana")).unwrap();
        let err = f
            .publisher
            .publish(f.project_id, &request, Some("ben"))
            .unwrap_err();
        assert!(matches!(err, PublishError::Conflict { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_monotonic_enforcement() {
        let f = fixture();
        f.publisher
            .publish(f.project_id, &PublishRequest::new("1.1", "Second"), Some("ana"))
            .unwrap();
        let err = f
            .publisher
            .publish(f.project_id, &PublishRequest::new("1.0", "Older"), Some("ana"))
            .unwrap_err();
        assert!(matches!(err, PublishError::VersionNotNewer { .. }));

        let mut config = PublishConfig::default();
        config.publishing.enforce_monotonic = false;
        let f = fixture_with(config);
        f.publisher
            .publish(f.project_id, &PublishRequest::new("1.1", "Second"), Some("ana"))
            .unwrap();
        let older = f
            .publisher
            .publish(f.project_id, &PublishRequest::new("1.0", "Older"), Some("ana"))
            .unwrap();
        assert!(!older.latest);

        let versions = f.publisher.list_versions(f.project_id).unwrap();
        let labels: Vec<(&str, bool)> = versions
            .iter()
            .map(|v| (v.version.as_str(), v.latest))
            .collect();
        assert_eq!(labels, vec![("1.1", true), ("1.0", false)]);
    }

    #[test]
    fn test_commit_race_becomes_conflict() {
        let f = fixture();
        let request = PublishRequest::new("2.0", "Race");
        let version = request.check().unwrap();
        let store = f.publisher.store();

        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        f.publisher
            .stage_publish(&mut first, f.project_id, &version, &request, "ana")
            .unwrap();
        let (record, _) = f
            .publisher
            .stage_publish(&mut second, f.project_id, &version, &request, "ben")
            .unwrap();

        first.commit().unwrap();
        let err = second
            .commit()
            .map_err(|e| lost_race(e, f.project_id, &record.version.label))
            .unwrap_err();
        assert!(matches!(err, PublishError::Conflict { .. }));

        let tx = store.begin().unwrap();
        assert_eq!(tx.list_versions(f.project_id).unwrap().len(), 1);
        let events = tx.query_events(&HistoryScope::project(f.project_id), 10, 0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor.as_deref(), Some("ana"));
    }

    #[test]
    fn test_concurrent_lower_publish_is_not_newer() {
        let f = fixture();
        f.publisher
            .publish(f.project_id, &PublishRequest::new("0.9", "Base"), Some("ana"))
            .unwrap();
        let store = f.publisher.store();

        let higher = PublishRequest::new("1.1", "Higher");
        let lower = PublishRequest::new("1.0", "Lower");
        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();
        f.publisher
            .stage_publish(&mut first, f.project_id, &higher.check().unwrap(), &higher, "ana")
            .unwrap();
        let (record, _) = f
            .publisher
            .stage_publish(&mut second, f.project_id, &lower.check().unwrap(), &lower, "ben")
            .unwrap();

        first.commit().unwrap();
        let err = second
            .commit()
            .map_err(|e| lost_race(e, f.project_id, &record.version.label))
            .unwrap_err();
        match &err {
            PublishError::VersionNotNewer { requested, latest } => {
                assert_eq!(requested, "1.0");
                assert_eq!(latest, "1.1");
            }
            other => panic!("Expected VersionNotNewer, got {:?}", other),
        }
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let versions = f.publisher.list_versions(f.project_id).unwrap();
        let labels: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(labels, vec!["1.1", "0.9"]);
    }

    #[test]
    fn test_get_version_round_trip() {
        let f = fixture();
        let preview_snapshot = {
            let tx = f.publisher.store().begin().unwrap();
            build_snapshot(&tx, f.project_id).unwrap()
        };
        f.publisher
            .publish(
                f.project_id,
                &PublishRequest::new("1.0", "First").with_notes("Initial release"),
                Some("ana"),
            )
            .unwrap();

        let version = f.publisher.get_version(f.project_id, "1.0").unwrap();
        assert_eq!(version.snapshot, preview_snapshot);
        assert_eq!(version.info.notes.as_deref(), Some("Initial release"));
        assert!(version.info.latest);
        assert_eq!(version.info.checksum, preview_snapshot.checksum().unwrap());

        let err = f.publisher.get_version(f.project_id, "9.9").unwrap_err();
        assert!(matches!(err, PublishError::NotFound { entity: "version", .. }));
    }

    #[test]
    fn test_get_version_detects_tampering() {
        let f = fixture();
        let mut tx = f.publisher.store().begin().unwrap();
        tx.insert_version(NewVersion {
            id: Uuid::now_v7(),
            project_id: f.project_id,
            label: "1.0".into(),
            title: "Tampered".into(),
            notes: None,
            publisher: "mallory".into(),
            finalized: true,
            published_at: Utc::now(),
            snapshot: json!({"project": "something else"}),
            checksum: Checksum::from("0000"),
        })
        .unwrap();
        tx.commit().unwrap();

        let err = f.publisher.get_version(f.project_id, "1.0").unwrap_err();
        assert!(matches!(err, PublishError::Integrity { .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_history_limit_is_clamped() {
        let mut config = PublishConfig::default();
        config.history.max_limit = 2;
        config.history.default_limit = 1;
        let f = fixture_with(config);
        for label in ["1.0", "1.1", "1.2"] {
            f.publisher
                .publish(f.project_id, &PublishRequest::new(label, label), Some("ana"))
                .unwrap();
        }

        assert_eq!(f.publisher.history(f.project_id, None, 0).unwrap().len(), 1);
        let page = f.publisher.history(f.project_id, Some(100), 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].after_state.as_ref().unwrap()["label"], "1.2");

        let err = f.publisher.history(Uuid::new_v4(), None, 0).unwrap_err();
        assert!(matches!(err, PublishError::NotFound { .. }));
    }
}
