//! Snapshot diffing
//!
//! Compares a previously published snapshot with the current one. Entities
//! are matched by id, never by position, and collection-valued fields are
//! compared as sets, so reordering alone never shows up as a change.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::snapshot::{
    ClassSnapshot, ConceptSnapshot, EntityKind, ProjectInfo, PropertySnapshot, SchemeSnapshot,
    VocabularySnapshot,
};

/// An entity named in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
    pub label: String,
}

/// One differing field of a modified entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    /// Word-level inline rendering: `[-removed-]{+added+}`
    pub fn render_inline(&self) -> String {
        let old = display_value(&self.old);
        let new = display_value(&self.new);
        let diff = TextDiff::from_words(old.as_str(), new.as_str());

        // Merge adjacent tokens with the same tag into one run
        let mut runs: Vec<(ChangeTag, String)> = Vec::new();
        for change in diff.iter_all_changes() {
            match runs.last_mut() {
                Some((tag, text)) if *tag == change.tag() => text.push_str(change.value()),
                _ => runs.push((change.tag(), change.value().to_string())),
            }
        }

        runs.into_iter()
            .map(|(tag, text)| match tag {
                ChangeTag::Equal => text,
                ChangeTag::Delete => format!("[-{}-]", text),
                ChangeTag::Insert => format!("{{+{}+}}", text),
            })
            .collect()
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A modified entity with its field-level changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifiedEntity {
    #[serde(flatten)]
    pub entity: EntityRef,
    pub changes: Vec<FieldChange>,
}

/// Counts of a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

/// Differences between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: Vec<EntityRef>,
    pub modified: Vec<ModifiedEntity>,
    pub removed: Vec<EntityRef>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            added: self.added.len(),
            modified: self.modified.len(),
            removed: self.removed.len(),
        }
    }
}

/// Something the differ can match and compare
trait Diffable {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn label(&self) -> String;

    /// The compared fields, with collections normalized to sorted order
    fn fields(&self) -> Vec<(&'static str, Value)>;
}

fn sorted_set<T: Ord + Clone + Serialize>(items: &[T]) -> Value {
    let mut items = items.to_vec();
    items.sort();
    items.dedup();
    json!(items)
}

impl Diffable for ProjectInfo {
    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", json!(self.name)),
            ("namespace", json!(self.namespace)),
            ("description", json!(self.description)),
        ]
    }
}

impl Diffable for SchemeSnapshot {
    const KIND: EntityKind = EntityKind::Scheme;

    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> String {
        self.title.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("uri", json!(self.uri)),
            ("title", json!(self.title)),
            ("description", json!(self.description)),
        ]
    }
}

impl Diffable for ConceptSnapshot {
    const KIND: EntityKind = EntityKind::Concept;

    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> String {
        self.label().to_string()
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("scheme_id", json!(self.scheme_id)),
            ("uri", json!(self.uri)),
            ("pref_label", json!(self.pref_label)),
            ("alt_labels", sorted_set(&self.alt_labels)),
            ("definition", json!(self.definition)),
            ("scope_note", json!(self.scope_note)),
            ("notation", json!(self.notation)),
            ("broader_ids", sorted_set(&self.broader_ids)),
            ("related_ids", sorted_set(&self.related_ids)),
        ]
    }
}

impl Diffable for PropertySnapshot {
    const KIND: EntityKind = EntityKind::Property;

    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("uri", json!(self.uri)),
            ("label", json!(self.label)),
            ("description", json!(self.description)),
            ("domain_class", json!(self.domain_class)),
            ("range", json!(self.range)),
            ("cardinality", json!(self.cardinality)),
            ("required", json!(self.required)),
        ]
    }
}

impl Diffable for ClassSnapshot {
    const KIND: EntityKind = EntityKind::Class;

    fn id(&self) -> Uuid {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("uri", json!(self.uri)),
            ("label", json!(self.label)),
            ("description", json!(self.description)),
            ("parent_uri", json!(self.parent_uri)),
        ]
    }
}

fn entity_ref<T: Diffable>(entity: &T) -> EntityRef {
    EntityRef {
        kind: T::KIND,
        id: entity.id(),
        label: entity.label(),
    }
}

fn field_changes<T: Diffable>(old: &T, new: &T) -> Vec<FieldChange> {
    old.fields()
        .into_iter()
        .zip(new.fields())
        .filter(|((_, a), (_, b))| a != b)
        .map(|((field, a), (_, b))| FieldChange {
            field: field.to_string(),
            old: a,
            new: b,
        })
        .collect()
}

/// Identity-keyed comparison of one entity collection
fn diff_collection<'a, T: Diffable + 'a>(
    previous: impl IntoIterator<Item = &'a T>,
    current: impl IntoIterator<Item = &'a T>,
    out: &mut DiffResult,
) {
    let previous: BTreeMap<Uuid, &T> = previous.into_iter().map(|e| (e.id(), e)).collect();
    let current: BTreeMap<Uuid, &T> = current.into_iter().map(|e| (e.id(), e)).collect();

    for (id, entity) in &current {
        match previous.get(id) {
            None => out.added.push(entity_ref(*entity)),
            Some(old) => {
                let changes = field_changes(*old, *entity);
                if !changes.is_empty() {
                    out.modified.push(ModifiedEntity {
                        entity: entity_ref(*entity),
                        changes,
                    });
                }
            }
        }
    }

    for (id, entity) in &previous {
        if !current.contains_key(id) {
            out.removed.push(entity_ref(*entity));
        }
    }
}

fn display_order(a: &EntityRef, b: &EntityRef) -> std::cmp::Ordering {
    (a.kind, &a.label, a.id).cmp(&(b.kind, &b.label, b.id))
}

/// Compare `previous` (if any) with `current`
///
/// Without a previous snapshot every scheme, concept, property and class of
/// `current` is reported as added. Project metadata only ever appears as a
/// modification.
pub fn diff(previous: Option<&VocabularySnapshot>, current: &VocabularySnapshot) -> DiffResult {
    let mut result = DiffResult::default();
    let empty = VocabularySnapshot {
        project: current.project.clone(),
        schemes: Vec::new(),
        properties: Vec::new(),
        classes: Vec::new(),
    };
    let previous = previous.unwrap_or(&empty);

    let changes = field_changes(&previous.project, &current.project);
    if !changes.is_empty() {
        result.modified.push(ModifiedEntity {
            entity: entity_ref(&current.project),
            changes,
        });
    }

    diff_collection(&previous.schemes, &current.schemes, &mut result);
    diff_collection(previous.concepts(), current.concepts(), &mut result);
    diff_collection(&previous.properties, &current.properties, &mut result);
    diff_collection(&previous.classes, &current.classes, &mut result);

    result.added.sort_by(display_order);
    result.removed.sort_by(display_order);
    result
        .modified
        .sort_by(|a, b| display_order(&a.entity, &b.entity));
    result
}
