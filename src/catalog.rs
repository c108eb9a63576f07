//! Project documents and audited import
//!
//! A [`ProjectDocument`] is the complete editable content of one project.
//! Importing it reconciles the store with the document: entities missing
//! from the document are deleted, new ones are created and changed ones are
//! updated. Every mutation is audited through the same transaction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::error::{PublishError, Result};
use crate::history::{Audited, ChangeAction, ChangeTracker, HistoryScope};
use crate::snapshot::EntityKind;
use crate::store::{
    Cardinality, ClassRecord, ConceptRecord, ProjectRecord, PropertyRecord, SchemeRecord, Store,
    Transaction, VocabularyReader, VocabularyWriter,
};

/// Editable content of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub project: ProjectEntry,
    #[serde(default)]
    pub schemes: Vec<SchemeEntry>,
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
    #[serde(default)]
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeEntry {
    pub id: Uuid,
    #[serde(default)]
    pub uri: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub concepts: Vec<ConceptEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEntry {
    pub id: Uuid,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub pref_label: Option<String>,
    #[serde(default)]
    pub alt_labels: Vec<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub scope_note: Option<String>,
    #[serde(default)]
    pub notation: Option<String>,
    /// Ids of broader concepts
    #[serde(default)]
    pub broader: Vec<Uuid>,
    /// Ids of related concepts
    #[serde(default)]
    pub related: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub id: Uuid,
    #[serde(default)]
    pub uri: Option<String>,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain_class: Option<String>,
    #[serde(default)]
    pub range_scheme_id: Option<Uuid>,
    #[serde(default)]
    pub range_class_uri: Option<String>,
    #[serde(default)]
    pub range_datatype: Option<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: Uuid,
    #[serde(default)]
    pub uri: Option<String>,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_uri: Option<String>,
}

impl ProjectDocument {
    /// Read a document from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PublishError::invalid_request(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Reject documents that reuse an id for two entities
    fn check_ids(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let ids = std::iter::once(self.project.id)
            .chain(self.schemes.iter().map(|s| s.id))
            .chain(self.schemes.iter().flat_map(|s| s.concepts.iter().map(|c| c.id)))
            .chain(self.properties.iter().map(|p| p.id))
            .chain(self.classes.iter().map(|c| c.id));
        for id in ids {
            if !seen.insert(id) {
                return Err(PublishError::invalid_request(format!(
                    "id {} appears more than once in the document",
                    id
                )));
            }
        }
        Ok(())
    }
}

// Audit states carry domain fields only: no timestamps, no links.

impl Audited for ProjectRecord {
    fn entity_type(&self) -> &'static str {
        EntityKind::Project.as_str()
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn audit_state(&self) -> Value {
        json!({
            "name": self.name,
            "namespace": self.namespace,
            "description": self.description,
        })
    }
}

impl Audited for SchemeRecord {
    fn entity_type(&self) -> &'static str {
        EntityKind::Scheme.as_str()
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn audit_state(&self) -> Value {
        json!({
            "uri": self.uri,
            "title": self.title,
            "description": self.description,
        })
    }
}

impl Audited for ConceptRecord {
    fn entity_type(&self) -> &'static str {
        EntityKind::Concept.as_str()
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn audit_state(&self) -> Value {
        json!({
            "scheme_id": self.scheme_id,
            "uri": self.uri,
            "pref_label": self.pref_label,
            "alt_labels": self.alt_labels,
            "definition": self.definition,
            "scope_note": self.scope_note,
            "notation": self.notation,
        })
    }
}

impl Audited for PropertyRecord {
    fn entity_type(&self) -> &'static str {
        EntityKind::Property.as_str()
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn audit_state(&self) -> Value {
        json!({
            "uri": self.uri,
            "label": self.label,
            "description": self.description,
            "domain_class": self.domain_class,
            "range_scheme_id": self.range_scheme_id,
            "range_class_uri": self.range_class_uri,
            "range_datatype": self.range_datatype,
            "cardinality": self.cardinality,
            "required": self.required,
        })
    }
}

impl Audited for ClassRecord {
    fn entity_type(&self) -> &'static str {
        EntityKind::Class.as_str()
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn audit_state(&self) -> Value {
        json!({
            "uri": self.uri,
            "label": self.label,
            "description": self.description,
            "parent_uri": self.parent_uri,
        })
    }
}

/// Counts of an import, by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// One reconciliation pass over a transaction
struct Importer<'t, T: ?Sized> {
    tx: &'t mut T,
    tracker: &'t ChangeTracker,
    summary: ImportSummary,
    now: DateTime<Utc>,
    sequence: i64,
}

impl<T: Transaction + ?Sized> Importer<'_, T> {
    /// Creation time for a new entity; keeps document order stable
    fn next_created_at(&mut self) -> DateTime<Utc> {
        self.sequence += 1;
        self.now + Duration::microseconds(self.sequence)
    }

    fn audit<A: Audited>(
        &mut self,
        scope: &HistoryScope,
        before: Option<&A>,
        after: Option<&A>,
    ) -> Result<()> {
        match self.tracker.record_transition(&mut *self.tx, scope, before, after)? {
            Some(event) => match event.action {
                ChangeAction::Create => self.summary.created += 1,
                ChangeAction::Update => self.summary.updated += 1,
                ChangeAction::Delete => self.summary.deleted += 1,
            },
            None => self.summary.unchanged += 1,
        }
        Ok(())
    }
}

fn foreign(kind: EntityKind, id: Uuid) -> PublishError {
    PublishError::invalid_request(format!(
        "{} {} belongs to another project",
        kind.as_str(),
        id
    ))
}

/// Reject documents that would take over entities of another project
fn check_ownership<R>(reader: &R, doc: &ProjectDocument) -> Result<()>
where
    R: VocabularyReader + ?Sized,
{
    let project_id = doc.project.id;
    for scheme in &doc.schemes {
        if let Some(existing) = reader.get_scheme(scheme.id)? {
            if existing.project_id != project_id {
                return Err(foreign(EntityKind::Scheme, scheme.id));
            }
        }
        for concept in &scheme.concepts {
            let Some(existing) = reader.get_concept(concept.id)? else {
                continue;
            };
            let owner = reader.get_scheme(existing.scheme_id)?.map(|s| s.project_id);
            if owner != Some(project_id) {
                return Err(foreign(EntityKind::Concept, concept.id));
            }
        }
    }
    for class in &doc.classes {
        if let Some(existing) = reader.get_class(class.id)? {
            if existing.project_id != project_id {
                return Err(foreign(EntityKind::Class, class.id));
            }
        }
    }
    for property in &doc.properties {
        if let Some(existing) = reader.get_property(property.id)? {
            if existing.project_id != project_id {
                return Err(foreign(EntityKind::Property, property.id));
            }
        }
    }
    Ok(())
}

/// Reconcile the store with `doc` inside `tx`
///
/// Nothing is committed here; the caller owns the transaction.
pub fn apply_document<T>(tx: &mut T, doc: &ProjectDocument, tracker: &ChangeTracker) -> Result<ImportSummary>
where
    T: Transaction + ?Sized,
{
    doc.check_ids()?;
    let project_id = doc.project.id;

    check_ownership(&*tx, doc)?;

    let mut importer = Importer {
        tx,
        tracker,
        summary: ImportSummary::default(),
        now: Utc::now(),
        sequence: 0,
    };
    let project_scope = HistoryScope::project(project_id);

    // Project
    let before = importer.tx.get_project(project_id)?;
    let project = ProjectRecord {
        id: project_id,
        name: doc.project.name.clone(),
        namespace: doc.project.namespace.clone(),
        description: doc.project.description.clone(),
    };
    importer.tx.put_project(project.clone())?;
    importer.audit(&project_scope, before.as_ref(), Some(&project))?;

    // Existing content
    let existing_schemes = importer.tx.list_schemes_for_project(project_id)?;
    let mut existing_concepts: HashMap<Uuid, ConceptRecord> = HashMap::new();
    for scheme in &existing_schemes {
        for row in importer.tx.list_concepts_for_scheme(scheme.id)? {
            existing_concepts.insert(row.concept.id, row.concept);
        }
    }

    let doc_schemes: HashSet<Uuid> = doc.schemes.iter().map(|s| s.id).collect();
    let doc_concepts: HashSet<Uuid> = doc
        .schemes
        .iter()
        .flat_map(|s| s.concepts.iter().map(|c| c.id))
        .collect();

    // Deletions, concepts before their schemes so each gets its own event
    let mut removed: Vec<&ConceptRecord> = existing_concepts
        .values()
        .filter(|c| !doc_concepts.contains(&c.id))
        .collect();
    removed.sort_by_key(|c| (c.created_at, c.id));
    for concept in removed {
        importer.tx.delete_concept(concept.id)?;
        let scope = HistoryScope::scheme(project_id, concept.scheme_id);
        importer.audit(&scope, Some(concept), None)?;
    }
    for scheme in existing_schemes.iter().filter(|s| !doc_schemes.contains(&s.id)) {
        importer.tx.delete_scheme(scheme.id)?;
        let scope = HistoryScope::scheme(project_id, scheme.id);
        importer.audit(&scope, Some(scheme), None)?;
    }

    // Schemes and concepts
    let schemes_by_id: HashMap<Uuid, &SchemeRecord> =
        existing_schemes.iter().map(|s| (s.id, s)).collect();
    for entry in &doc.schemes {
        let before = schemes_by_id.get(&entry.id).copied();
        let created_at = match before {
            Some(s) => s.created_at,
            None => importer.next_created_at(),
        };
        let scheme = SchemeRecord {
            id: entry.id,
            project_id,
            uri: entry.uri.clone(),
            title: entry.title.clone(),
            description: entry.description.clone(),
            created_at,
        };
        importer.tx.put_scheme(scheme.clone())?;
        let scope = HistoryScope::scheme(project_id, entry.id);
        importer.audit(&scope, before, Some(&scheme))?;

        for concept_entry in &entry.concepts {
            let before = existing_concepts.get(&concept_entry.id);
            let created_at = match before {
                Some(c) => c.created_at,
                None => importer.next_created_at(),
            };
            let concept = ConceptRecord {
                id: concept_entry.id,
                scheme_id: entry.id,
                uri: concept_entry.uri.clone(),
                pref_label: concept_entry.pref_label.clone(),
                alt_labels: concept_entry.alt_labels.clone(),
                definition: concept_entry.definition.clone(),
                scope_note: concept_entry.scope_note.clone(),
                notation: concept_entry.notation.clone(),
                created_at,
            };
            importer.tx.put_concept(concept.clone())?;
            importer.audit(&scope, before, Some(&concept))?;
        }
    }

    // Links once every concept exists
    for concept in doc.schemes.iter().flat_map(|s| s.concepts.iter()) {
        importer
            .tx
            .set_concept_links(concept.id, concept.broader.clone(), concept.related.clone())?;
    }

    // Classes
    let existing_classes = importer.tx.list_classes_for_project(project_id)?;
    let doc_classes: HashSet<Uuid> = doc.classes.iter().map(|c| c.id).collect();
    for class in existing_classes.iter().filter(|c| !doc_classes.contains(&c.id)) {
        importer.tx.delete_class(class.id)?;
        importer.audit(&project_scope, Some(class), None)?;
    }
    let classes_by_id: HashMap<Uuid, &ClassRecord> =
        existing_classes.iter().map(|c| (c.id, c)).collect();
    for entry in &doc.classes {
        let before = classes_by_id.get(&entry.id).copied();
        let created_at = match before {
            Some(c) => c.created_at,
            None => importer.next_created_at(),
        };
        let class = ClassRecord {
            id: entry.id,
            project_id,
            uri: entry.uri.clone(),
            label: entry.label.clone(),
            description: entry.description.clone(),
            parent_uri: entry.parent_uri.clone(),
            created_at,
        };
        importer.tx.put_class(class.clone())?;
        importer.audit(&project_scope, before, Some(&class))?;
    }

    // Properties
    let existing_properties = importer.tx.list_properties_for_project(project_id)?;
    let doc_properties: HashSet<Uuid> = doc.properties.iter().map(|p| p.id).collect();
    for property in existing_properties
        .iter()
        .filter(|p| !doc_properties.contains(&p.id))
    {
        importer.tx.delete_property(property.id)?;
        importer.audit(&project_scope, Some(property), None)?;
    }
    let properties_by_id: HashMap<Uuid, &PropertyRecord> =
        existing_properties.iter().map(|p| (p.id, p)).collect();
    for entry in &doc.properties {
        let before = properties_by_id.get(&entry.id).copied();
        let created_at = match before {
            Some(p) => p.created_at,
            None => importer.next_created_at(),
        };
        let property = PropertyRecord {
            id: entry.id,
            project_id,
            uri: entry.uri.clone(),
            label: entry.label.clone(),
            description: entry.description.clone(),
            domain_class: entry.domain_class.clone(),
            range_scheme_id: entry.range_scheme_id,
            range_class_uri: entry.range_class_uri.clone(),
            range_datatype: entry.range_datatype.clone(),
            cardinality: entry.cardinality,
            required: entry.required,
            created_at,
        };
        importer.tx.put_property(property.clone())?;
        importer.audit(&project_scope, before, Some(&property))?;
    }

    Ok(importer.summary)
}

/// Import a document in its own transaction
pub fn import_document<S: Store>(store: &S, doc: &ProjectDocument, actor: Option<&str>) -> Result<ImportSummary> {
    let tracker = ChangeTracker::new(actor);
    let mut tx = store.begin()?;
    let summary = apply_document(&mut tx, doc, &tracker)?;
    tx.commit()?;

    info!(
        project_id = %doc.project.id,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        unchanged = summary.unchanged,
        "imported project document"
    );
    Ok(summary)
}
