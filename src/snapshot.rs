//! Vocabulary snapshots
//!
//! A [`VocabularySnapshot`] is the fully resolved, point-in-time content of a
//! project: its concept schemes with their concepts, its ontology properties
//! and its ontology classes. Relationship references are plain ids that
//! resolve inside the same snapshot. Snapshots are built on demand at
//! preview/publish time and stored verbatim inside published versions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::checksum::Checksum;
use crate::error::{PublishError, Result};
use crate::store::{Cardinality, ClassRecord, ConceptRow, PropertyRecord, VocabularyReader};

/// Kinds of entity found in a snapshot, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Scheme,
    Concept,
    Property,
    Class,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::Scheme => "scheme",
            EntityKind::Concept => "concept",
            EntityKind::Property => "property",
            EntityKind::Class => "class",
        }
    }
}

/// Project metadata carried by a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: Uuid,
    pub name: String,
    pub namespace: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeSnapshot {
    pub id: Uuid,
    pub uri: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub concepts: Vec<ConceptSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptSnapshot {
    pub id: Uuid,
    pub scheme_id: Uuid,
    pub uri: Option<String>,
    pub pref_label: Option<String>,
    pub alt_labels: Vec<String>,
    pub definition: Option<String>,
    pub scope_note: Option<String>,
    pub notation: Option<String>,
    /// Sorted, deduplicated
    pub broader_ids: Vec<Uuid>,
    /// Sorted, deduplicated
    pub related_ids: Vec<Uuid>,
}

impl ConceptSnapshot {
    /// Preferred label, or the empty string
    pub fn label(&self) -> &str {
        self.pref_label.as_deref().unwrap_or("")
    }
}

/// What values a property ranges over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyRange {
    /// Concepts of a scheme in the same snapshot
    Scheme { scheme_id: Uuid },
    /// A literal datatype such as `xsd:string`
    Datatype { name: String },
    /// Instances of an ontology class
    Class { uri: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub id: Uuid,
    pub uri: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub domain_class: Option<String>,
    pub range: Option<PropertyRange>,
    pub cardinality: Cardinality,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSnapshot {
    pub id: Uuid,
    pub uri: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub parent_uri: Option<String>,
}

/// Immutable content of a project at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularySnapshot {
    pub project: ProjectInfo,
    pub schemes: Vec<SchemeSnapshot>,
    pub properties: Vec<PropertySnapshot>,
    pub classes: Vec<ClassSnapshot>,
}

/// Entity counts of a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    pub schemes: usize,
    pub concepts: usize,
    pub properties: usize,
    pub classes: usize,
    pub broader_links: usize,
    pub related_links: usize,
}

impl VocabularySnapshot {
    /// All concepts across all schemes, in snapshot order
    pub fn concepts(&self) -> impl Iterator<Item = &ConceptSnapshot> {
        self.schemes.iter().flat_map(|s| s.concepts.iter())
    }

    pub fn concept_ids(&self) -> HashSet<Uuid> {
        self.concepts().map(|c| c.id).collect()
    }

    pub fn scheme_ids(&self) -> HashSet<Uuid> {
        self.schemes.iter().map(|s| s.id).collect()
    }

    pub fn content_summary(&self) -> ContentSummary {
        ContentSummary {
            schemes: self.schemes.len(),
            concepts: self.concepts().count(),
            properties: self.properties.len(),
            classes: self.classes.len(),
            broader_links: self.concepts().map(|c| c.broader_ids.len()).sum(),
            related_links: self.concepts().map(|c| c.related_ids.len()).sum(),
        }
    }

    /// The snapshot as a structured document
    pub fn to_document(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(document: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(document)?)
    }

    /// SHA256 of the canonical document
    pub fn checksum(&self) -> Result<Checksum> {
        Ok(Checksum::of(self)?)
    }
}

/// Build the snapshot of a project from one read view
///
/// All reads go through `reader`, which must be a single transaction so the
/// result reflects one instant. Nested lists are ordered by creation time and
/// id, so repeated builds of unchanged data are identical.
pub fn build_snapshot<R>(reader: &R, project_id: Uuid) -> Result<VocabularySnapshot>
where
    R: VocabularyReader + ?Sized,
{
    let project = reader
        .get_project(project_id)?
        .ok_or_else(|| PublishError::not_found("project", project_id))?;

    let mut scheme_records = reader.list_schemes_for_project(project_id)?;
    scheme_records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

    let mut concept_rows: Vec<Vec<ConceptRow>> = Vec::with_capacity(scheme_records.len());
    for scheme in &scheme_records {
        let mut rows = reader.list_concepts_for_scheme(scheme.id)?;
        rows.sort_by(|a, b| {
            (a.concept.created_at, a.concept.id).cmp(&(b.concept.created_at, b.concept.id))
        });
        concept_rows.push(rows);
    }

    let known_concepts: HashSet<Uuid> = concept_rows
        .iter()
        .flatten()
        .map(|row| row.concept.id)
        .collect();
    let known_schemes: HashSet<Uuid> = scheme_records.iter().map(|s| s.id).collect();

    let schemes = scheme_records
        .into_iter()
        .zip(concept_rows)
        .map(|(scheme, rows)| SchemeSnapshot {
            id: scheme.id,
            uri: scheme.uri,
            title: scheme.title,
            description: scheme.description,
            concepts: rows
                .into_iter()
                .map(|row| resolve_concept(row, &known_concepts))
                .collect(),
        })
        .collect();

    let mut property_records = reader.list_properties_for_project(project_id)?;
    property_records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    let properties = property_records
        .into_iter()
        .map(|p| resolve_property(p, &known_schemes))
        .collect();

    let mut class_records = reader.list_classes_for_project(project_id)?;
    class_records.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    let classes = class_records.into_iter().map(class_snapshot).collect();

    let snapshot = VocabularySnapshot {
        project: ProjectInfo {
            id: project.id,
            name: project.name,
            namespace: project.namespace,
            description: project.description,
        },
        schemes,
        properties,
        classes,
    };

    let summary = snapshot.content_summary();
    debug!(
        project_id = %project_id,
        schemes = summary.schemes,
        concepts = summary.concepts,
        properties = summary.properties,
        classes = summary.classes,
        "built vocabulary snapshot"
    );
    Ok(snapshot)
}

/// Keep only ids that resolve inside the project; sorted and deduplicated
fn resolve_links(owner: Uuid, relation: &str, ids: Vec<Uuid>, known: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut resolved: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| {
            let ok = known.contains(id);
            if !ok {
                warn!(concept_id = %owner, target = %id, relation, "dropping link outside project");
            }
            ok
        })
        .collect();
    resolved.sort();
    resolved.dedup();
    resolved
}

fn resolve_concept(row: ConceptRow, known: &HashSet<Uuid>) -> ConceptSnapshot {
    let concept = row.concept;
    ConceptSnapshot {
        broader_ids: resolve_links(concept.id, "broader", row.broader_ids, known),
        related_ids: resolve_links(concept.id, "related", row.related_ids, known),
        id: concept.id,
        scheme_id: concept.scheme_id,
        uri: concept.uri,
        pref_label: concept.pref_label,
        alt_labels: concept.alt_labels,
        definition: concept.definition,
        scope_note: concept.scope_note,
        notation: concept.notation,
    }
}

/// Resolve the three range columns into one range kind
///
/// Precedence is scheme, then class, then datatype. A scheme outside the
/// project is dropped.
fn resolve_property(property: PropertyRecord, known_schemes: &HashSet<Uuid>) -> PropertySnapshot {
    let scheme_range = property.range_scheme_id.filter(|id| {
        let ok = known_schemes.contains(id);
        if !ok {
            warn!(property_id = %property.id, scheme_id = %id, "dropping range scheme outside project");
        }
        ok
    });

    let range = match (scheme_range, &property.range_class_uri, &property.range_datatype) {
        (Some(scheme_id), _, _) => Some(PropertyRange::Scheme { scheme_id }),
        (None, Some(uri), _) => Some(PropertyRange::Class { uri: uri.clone() }),
        (None, None, Some(name)) => Some(PropertyRange::Datatype { name: name.clone() }),
        (None, None, None) => None,
    };

    PropertySnapshot {
        id: property.id,
        uri: property.uri,
        label: property.label,
        description: property.description,
        domain_class: property.domain_class,
        range,
        cardinality: property.cardinality,
        required: property.required,
    }
}

fn class_snapshot(class: ClassRecord) -> ClassSnapshot {
    ClassSnapshot {
        id: class.id,
        uri: class.uri,
        label: class.label,
        description: class.description,
        parent_uri: class.parent_uri,
    }
}
