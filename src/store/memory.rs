//! In-memory reference store
//!
//! Honours the store contract the publishing core relies on:
//!
//! - `begin()` clones the committed state; that clone is the transaction's
//!   read view and never sees later commits.
//! - Writes are applied to the read view immediately (so the transaction
//!   reads its own writes) and staged for commit.
//! - `commit()` replays the staged writes against the latest committed state
//!   under the store lock. Unique and foreign-key constraints are checked
//!   again at that point, so two transactions that both passed their own
//!   checks cannot both commit. Either every staged write lands or none.
//! - Dropping a transaction discards its writes.
//!
//! A store opened with [`MemoryStore::open`] also writes the committed state
//! to a JSON file on every commit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use super::sort_key::derive_sort_key;
use super::{
    ChangeEventStore, ClassRecord, ConceptRecord, ConceptRow, NewVersion, ProjectRecord,
    PropertyRecord, SchemeRecord, Store, StoreResult, Transaction, VersionRecord, VersionStore,
    VocabularyReader, VocabularyWriter,
};
use crate::error::StoreError;
use crate::history::{ChangeEvent, HistoryScope};

const PROJECT_LABEL_KEY: &str = "published_versions_project_label_key";
const ONE_DRAFT_KEY: &str = "published_versions_one_draft_per_project";

/// Committed contents of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    projects: BTreeMap<Uuid, ProjectRecord>,
    schemes: BTreeMap<Uuid, SchemeRecord>,
    concepts: BTreeMap<Uuid, ConceptRecord>,
    /// (concept, broader concept)
    broader: BTreeSet<(Uuid, Uuid)>,
    /// (concept, related concept); read symmetrically
    related: BTreeSet<(Uuid, Uuid)>,
    properties: BTreeMap<Uuid, PropertyRecord>,
    classes: BTreeMap<Uuid, ClassRecord>,
    versions: Vec<VersionRecord>,
    events: Vec<ChangeEvent>,
}

/// A staged write
#[derive(Debug, Clone)]
enum Write {
    PutProject(ProjectRecord),
    PutScheme(SchemeRecord),
    DeleteScheme(Uuid),
    PutConcept(ConceptRecord),
    SetLinks {
        concept_id: Uuid,
        broader_ids: Vec<Uuid>,
        related_ids: Vec<Uuid>,
    },
    DeleteConcept(Uuid),
    PutProperty(PropertyRecord),
    DeleteProperty(Uuid),
    PutClass(ClassRecord),
    DeleteClass(Uuid),
    InsertVersion { record: VersionRecord, newest: bool },
    InsertEvent(ChangeEvent),
}

impl StoreState {
    fn apply(&mut self, write: Write) -> StoreResult<()> {
        match write {
            Write::PutProject(project) => {
                self.projects.insert(project.id, project);
            }
            Write::PutScheme(scheme) => {
                self.require_project(scheme.project_id)?;
                self.schemes.insert(scheme.id, scheme);
            }
            Write::DeleteScheme(id) => {
                let doomed: Vec<Uuid> = self
                    .concepts
                    .values()
                    .filter(|c| c.scheme_id == id)
                    .map(|c| c.id)
                    .collect();
                for concept_id in doomed {
                    self.remove_concept(concept_id);
                }
                for property in self.properties.values_mut() {
                    if property.range_scheme_id == Some(id) {
                        property.range_scheme_id = None;
                    }
                }
                self.schemes.remove(&id);
            }
            Write::PutConcept(concept) => {
                if !self.schemes.contains_key(&concept.scheme_id) {
                    return Err(StoreError::ForeignKeyViolation(format!(
                        "concept {} references missing scheme {}",
                        concept.id, concept.scheme_id
                    )));
                }
                self.concepts.insert(concept.id, concept);
            }
            Write::SetLinks {
                concept_id,
                broader_ids,
                related_ids,
            } => {
                self.require_concept(concept_id)?;
                for target in broader_ids.iter().chain(related_ids.iter()) {
                    self.require_concept(*target)?;
                }
                self.broader.retain(|(from, _)| *from != concept_id);
                self.related.retain(|(from, _)| *from != concept_id);
                self.broader
                    .extend(broader_ids.into_iter().map(|to| (concept_id, to)));
                self.related
                    .extend(related_ids.into_iter().map(|to| (concept_id, to)));
            }
            Write::DeleteConcept(id) => self.remove_concept(id),
            Write::PutProperty(property) => {
                self.require_project(property.project_id)?;
                if let Some(scheme_id) = property.range_scheme_id {
                    if !self.schemes.contains_key(&scheme_id) {
                        return Err(StoreError::ForeignKeyViolation(format!(
                            "property {} ranges over missing scheme {}",
                            property.id, scheme_id
                        )));
                    }
                }
                self.properties.insert(property.id, property);
            }
            Write::DeleteProperty(id) => {
                self.properties.remove(&id);
            }
            Write::PutClass(class) => {
                self.require_project(class.project_id)?;
                self.classes.insert(class.id, class);
            }
            Write::DeleteClass(id) => {
                self.classes.remove(&id);
            }
            Write::InsertVersion { record, newest } => {
                let version = &record.version;
                self.require_project(version.project_id)?;
                let same_project = self
                    .versions
                    .iter()
                    .filter(|v| v.version.project_id == version.project_id);
                for existing in same_project {
                    if existing.version.label == version.label {
                        return Err(StoreError::UniqueViolation {
                            constraint: PROJECT_LABEL_KEY,
                        });
                    }
                    if !existing.version.finalized && !version.finalized {
                        return Err(StoreError::UniqueViolation {
                            constraint: ONE_DRAFT_KEY,
                        });
                    }
                }
                if newest {
                    if let Some(latest) = self
                        .versions_desc(version.project_id)
                        .into_iter()
                        .find(|v| v.version.finalized)
                        .filter(|v| v.sort_key >= record.sort_key)
                    {
                        return Err(StoreError::OrderViolation {
                            label: version.label.clone(),
                            latest: latest.version.label,
                        });
                    }
                }
                self.versions.push(record);
            }
            Write::InsertEvent(event) => {
                if !event.is_well_formed() {
                    return Err(StoreError::CheckViolation(format!(
                        "change event {} has states inconsistent with action {}",
                        event.id,
                        event.action.as_str()
                    )));
                }
                self.events.push(event);
            }
        }
        Ok(())
    }

    fn require_project(&self, id: Uuid) -> StoreResult<()> {
        if self.projects.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!("missing project {}", id)))
        }
    }

    fn require_concept(&self, id: Uuid) -> StoreResult<()> {
        if self.concepts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!("missing concept {}", id)))
        }
    }

    fn remove_concept(&mut self, id: Uuid) {
        self.concepts.remove(&id);
        self.broader.retain(|(from, to)| *from != id && *to != id);
        self.related.retain(|(from, to)| *from != id && *to != id);
    }

    fn concept_row(&self, concept: &ConceptRecord) -> ConceptRow {
        let id = concept.id;
        let broader_ids = self
            .broader
            .iter()
            .filter(|(from, _)| *from == id)
            .map(|(_, to)| *to)
            .collect();
        let related: BTreeSet<Uuid> = self
            .related
            .iter()
            .filter_map(|(a, b)| {
                if *a == id {
                    Some(*b)
                } else if *b == id {
                    Some(*a)
                } else {
                    None
                }
            })
            .collect();
        ConceptRow {
            concept: concept.clone(),
            broader_ids,
            related_ids: related.into_iter().collect(),
        }
    }

    fn versions_desc(&self, project_id: Uuid) -> Vec<VersionRecord> {
        let mut versions: Vec<VersionRecord> = self
            .versions
            .iter()
            .filter(|v| v.version.project_id == project_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.sort_key.cmp(&a.sort_key));
        versions
    }
}

/// A thread-safe in-memory store, optionally backed by a JSON file
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// An empty, purely in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a file-backed store, loading existing contents if the file exists
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            StoreState::default()
        };
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn persist(&self, state: &StoreState) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> StoreResult<MemoryTransaction<'_>> {
        let view = self.lock()?.clone();
        Ok(MemoryTransaction {
            store: self,
            view,
            writes: Vec::new(),
        })
    }
}

/// A transaction over a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    view: StoreState,
    writes: Vec<Write>,
}

impl MemoryTransaction<'_> {
    fn stage(&mut self, write: Write) -> StoreResult<()> {
        self.view.apply(write.clone())?;
        self.writes.push(write);
        Ok(())
    }

    fn stage_version(&mut self, version: NewVersion, newest: bool) -> StoreResult<VersionRecord> {
        let sort_key = derive_sort_key(&version.label).ok_or_else(|| {
            StoreError::CheckViolation(format!("malformed version label '{}'", version.label))
        })?;
        let record = VersionRecord { version, sort_key };
        self.stage(Write::InsertVersion {
            record: record.clone(),
            newest,
        })?;
        Ok(record)
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn commit(self) -> StoreResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut committed = self.store.lock()?;
        let mut next = committed.clone();
        let count = self.writes.len();
        for write in self.writes {
            if let Err(err) = next.apply(write) {
                warn!(error = %err, "commit rejected");
                return Err(err);
            }
        }
        self.store.persist(&next)?;
        *committed = next;
        debug!(writes = count, "committed transaction");
        Ok(())
    }
}

impl VocabularyReader for MemoryTransaction<'_> {
    fn get_project(&self, id: Uuid) -> StoreResult<Option<ProjectRecord>> {
        Ok(self.view.projects.get(&id).cloned())
    }

    fn get_scheme(&self, id: Uuid) -> StoreResult<Option<SchemeRecord>> {
        Ok(self.view.schemes.get(&id).cloned())
    }

    fn get_concept(&self, id: Uuid) -> StoreResult<Option<ConceptRecord>> {
        Ok(self.view.concepts.get(&id).cloned())
    }

    fn get_property(&self, id: Uuid) -> StoreResult<Option<PropertyRecord>> {
        Ok(self.view.properties.get(&id).cloned())
    }

    fn get_class(&self, id: Uuid) -> StoreResult<Option<ClassRecord>> {
        Ok(self.view.classes.get(&id).cloned())
    }

    fn list_schemes_for_project(&self, project_id: Uuid) -> StoreResult<Vec<SchemeRecord>> {
        Ok(self
            .view
            .schemes
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    fn list_concepts_for_scheme(&self, scheme_id: Uuid) -> StoreResult<Vec<ConceptRow>> {
        Ok(self
            .view
            .concepts
            .values()
            .filter(|c| c.scheme_id == scheme_id)
            .map(|c| self.view.concept_row(c))
            .collect())
    }

    fn list_properties_for_project(&self, project_id: Uuid) -> StoreResult<Vec<PropertyRecord>> {
        Ok(self
            .view
            .properties
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }

    fn list_classes_for_project(&self, project_id: Uuid) -> StoreResult<Vec<ClassRecord>> {
        Ok(self
            .view
            .classes
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }
}

impl VocabularyWriter for MemoryTransaction<'_> {
    fn put_project(&mut self, project: ProjectRecord) -> StoreResult<()> {
        self.stage(Write::PutProject(project))
    }

    fn put_scheme(&mut self, scheme: SchemeRecord) -> StoreResult<()> {
        self.stage(Write::PutScheme(scheme))
    }

    fn delete_scheme(&mut self, id: Uuid) -> StoreResult<()> {
        self.stage(Write::DeleteScheme(id))
    }

    fn put_concept(&mut self, concept: ConceptRecord) -> StoreResult<()> {
        self.stage(Write::PutConcept(concept))
    }

    fn set_concept_links(
        &mut self,
        concept_id: Uuid,
        broader_ids: Vec<Uuid>,
        related_ids: Vec<Uuid>,
    ) -> StoreResult<()> {
        self.stage(Write::SetLinks {
            concept_id,
            broader_ids,
            related_ids,
        })
    }

    fn delete_concept(&mut self, id: Uuid) -> StoreResult<()> {
        self.stage(Write::DeleteConcept(id))
    }

    fn put_property(&mut self, property: PropertyRecord) -> StoreResult<()> {
        self.stage(Write::PutProperty(property))
    }

    fn delete_property(&mut self, id: Uuid) -> StoreResult<()> {
        self.stage(Write::DeleteProperty(id))
    }

    fn put_class(&mut self, class: ClassRecord) -> StoreResult<()> {
        self.stage(Write::PutClass(class))
    }

    fn delete_class(&mut self, id: Uuid) -> StoreResult<()> {
        self.stage(Write::DeleteClass(id))
    }
}

impl VersionStore for MemoryTransaction<'_> {
    fn insert_version(&mut self, version: NewVersion) -> StoreResult<VersionRecord> {
        self.stage_version(version, false)
    }

    fn insert_newest_version(&mut self, version: NewVersion) -> StoreResult<VersionRecord> {
        self.stage_version(version, true)
    }

    fn find_latest_finalized(&self, project_id: Uuid) -> StoreResult<Option<VersionRecord>> {
        Ok(self
            .view
            .versions_desc(project_id)
            .into_iter()
            .find(|v| v.version.finalized))
    }

    fn find_version(&self, project_id: Uuid, label: &str) -> StoreResult<Option<VersionRecord>> {
        Ok(self
            .view
            .versions
            .iter()
            .find(|v| v.version.project_id == project_id && v.version.label == label)
            .cloned())
    }

    fn list_versions(&self, project_id: Uuid) -> StoreResult<Vec<VersionRecord>> {
        Ok(self.view.versions_desc(project_id))
    }
}

impl ChangeEventStore for MemoryTransaction<'_> {
    fn insert_event(&mut self, event: ChangeEvent) -> StoreResult<()> {
        self.stage(Write::InsertEvent(event))
    }

    fn query_events(
        &self,
        scope: &HistoryScope,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<ChangeEvent>> {
        let mut events: Vec<&ChangeEvent> =
            self.view.events.iter().filter(|e| scope.matches(e)).collect();
        // Commit order is not event order; sort like the (occurred_at, id) index
        events.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
        Ok(events
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::history::Change;
    use chrono::Utc;
    use tempfile::tempdir;

    fn project(id: Uuid) -> ProjectRecord {
        ProjectRecord {
            id,
            name: "Animals".into(),
            namespace: "https://example.org/animals/".into(),
            description: None,
        }
    }

    fn scheme(id: Uuid, project_id: Uuid) -> SchemeRecord {
        SchemeRecord {
            id,
            project_id,
            uri: Some(format!("https://example.org/{}", id)),
            title: "Scheme".into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    fn concept(id: Uuid, scheme_id: Uuid) -> ConceptRecord {
        ConceptRecord {
            id,
            scheme_id,
            uri: None,
            pref_label: Some("Cat".into()),
            alt_labels: vec![],
            definition: None,
            scope_note: None,
            notation: None,
            created_at: Utc::now(),
        }
    }

    fn version(project_id: Uuid, label: &str, finalized: bool) -> NewVersion {
        NewVersion {
            id: Uuid::now_v7(),
            project_id,
            label: label.into(),
            title: label.into(),
            notes: None,
            publisher: "ana".into(),
            finalized,
            published_at: Utc::now(),
            snapshot: serde_json::json!({}),
            checksum: Checksum::from("x"),
        }
    }

    fn seeded() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let mut tx = store.begin().unwrap();
        tx.put_project(project(id)).unwrap();
        tx.commit().unwrap();
        (store, id)
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let (store, project_id) = seeded();
        {
            let mut tx = store.begin().unwrap();
            tx.insert_version(version(project_id, "1.0", true)).unwrap();
            assert!(tx.find_version(project_id, "1.0").unwrap().is_some());
        }
        let tx = store.begin().unwrap();
        assert!(tx.find_version(project_id, "1.0").unwrap().is_none());
    }

    #[test]
    fn test_read_view_is_stable() {
        let (store, project_id) = seeded();
        let reader = store.begin().unwrap();

        let mut writer = store.begin().unwrap();
        writer.insert_version(version(project_id, "1.0", true)).unwrap();
        writer.commit().unwrap();

        assert!(reader.list_versions(project_id).unwrap().is_empty());
        assert_eq!(store.begin().unwrap().list_versions(project_id).unwrap().len(), 1);
    }

    #[test]
    fn test_label_uniqueness_checked_at_commit() {
        let (store, project_id) = seeded();
        let mut first = store.begin().unwrap();
        let mut second = store.begin().unwrap();

        first.insert_version(version(project_id, "1.0", true)).unwrap();
        second.insert_version(version(project_id, "1.0", true)).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                constraint: PROJECT_LABEL_KEY
            }
        ));
        assert_eq!(store.begin().unwrap().list_versions(project_id).unwrap().len(), 1);
    }

    #[test]
    fn test_newest_version_ordering_checked_at_commit() {
        let (store, project_id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.insert_version(version(project_id, "0.9", true)).unwrap();
        tx.commit().unwrap();

        let mut higher = store.begin().unwrap();
        let mut lower = store.begin().unwrap();
        higher.insert_newest_version(version(project_id, "1.1", true)).unwrap();
        lower.insert_newest_version(version(project_id, "1.0", true)).unwrap();

        higher.commit().unwrap();
        match lower.commit().unwrap_err() {
            StoreError::OrderViolation { label, latest } => {
                assert_eq!(label, "1.0");
                assert_eq!(latest, "1.1");
            }
            other => panic!("Expected OrderViolation, got {:?}", other),
        }

        let tx = store.begin().unwrap();
        let labels: Vec<String> = tx
            .list_versions(project_id)
            .unwrap()
            .into_iter()
            .map(|v| v.version.label)
            .collect();
        assert_eq!(labels, vec!["1.1", "0.9"]);
    }

    #[test]
    fn test_at_most_one_draft_per_project() {
        let (store, project_id) = seeded();
        let mut tx = store.begin().unwrap();
        tx.insert_version(version(project_id, "1.0-pre1", false)).unwrap();
        let err = tx.insert_version(version(project_id, "1.0-pre2", false)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation {
                constraint: ONE_DRAFT_KEY
            }
        ));
        tx.insert_version(version(project_id, "1.0", true)).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_versions_listed_by_derived_key() {
        let (store, project_id) = seeded();
        let mut tx = store.begin().unwrap();
        for label in ["1.0-pre1", "1.10", "1.0", "1.9", "1.10-pre3"] {
            tx.insert_version(version(project_id, label, true)).unwrap();
        }
        let labels: Vec<String> = tx
            .list_versions(project_id)
            .unwrap()
            .into_iter()
            .map(|v| v.version.label)
            .collect();
        assert_eq!(labels, vec!["1.10", "1.10-pre3", "1.9", "1.0", "1.0-pre1"]);
        assert_eq!(
            tx.find_latest_finalized(project_id).unwrap().unwrap().version.label,
            "1.10"
        );
    }

    #[test]
    fn test_malformed_label_violates_check() {
        let (store, project_id) = seeded();
        let mut tx = store.begin().unwrap();
        let err = tx.insert_version(version(project_id, "v1", true)).unwrap_err();
        assert!(matches!(err, StoreError::CheckViolation(_)));
    }

    #[test]
    fn test_concept_delete_cascades_links() {
        let (store, project_id) = seeded();
        let scheme_id = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut tx = store.begin().unwrap();
        tx.put_scheme(scheme(scheme_id, project_id)).unwrap();
        for id in [a, b, c] {
            tx.put_concept(concept(id, scheme_id)).unwrap();
        }
        tx.set_concept_links(a, vec![b], vec![c]).unwrap();
        tx.set_concept_links(c, vec![b], vec![]).unwrap();

        let rows = tx.list_concepts_for_scheme(scheme_id).unwrap();
        let row_c = rows.iter().find(|r| r.concept.id == c).unwrap();
        assert_eq!(row_c.related_ids, vec![a]);

        tx.delete_concept(b).unwrap();
        let rows = tx.list_concepts_for_scheme(scheme_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.broader_ids.is_empty()));
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let (store, _) = seeded();
        let mut tx = store.begin().unwrap();
        let err = tx.put_scheme(scheme(Uuid::new_v4(), Uuid::new_v4())).unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[test]
    fn test_malformed_event_rejected() {
        let (store, project_id) = seeded();
        let mut tx = store.begin().unwrap();
        let mut event = ChangeEvent::new(
            &HistoryScope::project(project_id),
            "concept",
            Uuid::new_v4(),
            Change::Create {
                after: serde_json::json!({}),
            },
            None,
        );
        event.before_state = Some(serde_json::json!({}));
        assert!(matches!(
            tx.insert_event(event),
            Err(StoreError::CheckViolation(_))
        ));
    }

    fn created_event(project_id: Uuid, entity_id: Uuid) -> ChangeEvent {
        ChangeEvent::new(
            &HistoryScope::project(project_id),
            "concept",
            entity_id,
            Change::Create {
                after: serde_json::json!({}),
            },
            None,
        )
    }

    #[test]
    fn test_events_newest_first_regardless_of_commit_order() {
        let (store, project_id) = seeded();
        let (older_id, newer_id) = (Uuid::new_v4(), Uuid::new_v4());

        let mut slow = store.begin().unwrap();
        let older = created_event(project_id, older_id);
        slow.insert_event(older.clone()).unwrap();

        let mut fast = store.begin().unwrap();
        let mut newer = created_event(project_id, newer_id);
        newer.occurred_at = older.occurred_at + chrono::Duration::milliseconds(5);
        fast.insert_event(newer).unwrap();
        fast.commit().unwrap();
        slow.commit().unwrap();

        let tx = store.begin().unwrap();
        let scope = HistoryScope::project(project_id);
        let ids: Vec<Uuid> = tx
            .query_events(&scope, 2, 0)
            .unwrap()
            .into_iter()
            .map(|e| e.entity_id)
            .collect();
        assert_eq!(ids, vec![newer_id, older_id]);

        let second_page = tx.query_events(&scope, 1, 1).unwrap();
        assert_eq!(second_page[0].entity_id, older_id);
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let project_id = Uuid::new_v4();
        {
            let store = MemoryStore::open(&path).unwrap();
            let mut tx = store.begin().unwrap();
            tx.put_project(project(project_id)).unwrap();
            tx.insert_version(version(project_id, "1.0", true)).unwrap();
            tx.commit().unwrap();
        }
        let store = MemoryStore::open(&path).unwrap();
        let tx = store.begin().unwrap();
        assert!(tx.get_project(project_id).unwrap().is_some());
        assert_eq!(tx.list_versions(project_id).unwrap().len(), 1);
    }
}
