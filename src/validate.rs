//! Publish-time validation of vocabulary snapshots
//!
//! Every rule runs over the whole snapshot and every violation is reported;
//! nothing short-circuits. The function is pure so it can be exercised
//! without a store.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::snapshot::{ConceptSnapshot, EntityKind, PropertyRange, VocabularySnapshot};

/// Stable machine-readable violation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCode {
    NoSchemes,
    SchemeNoConcepts,
    SchemeMissingUri,
    ConceptMissingPrefLabel,
    DuplicateConceptUri,
    DanglingBroader,
    DanglingRelated,
    BroaderCycle,
    PropertyMissingRange,
    DanglingRangeScheme,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::NoSchemes => "no_schemes",
            ValidationCode::SchemeNoConcepts => "scheme_no_concepts",
            ValidationCode::SchemeMissingUri => "scheme_missing_uri",
            ValidationCode::ConceptMissingPrefLabel => "concept_missing_pref_label",
            ValidationCode::DuplicateConceptUri => "duplicate_concept_uri",
            ValidationCode::DanglingBroader => "dangling_broader",
            ValidationCode::DanglingRelated => "dangling_related",
            ValidationCode::BroaderCycle => "broader_cycle",
            ValidationCode::PropertyMissingRange => "property_missing_range",
            ValidationCode::DanglingRangeScheme => "dangling_range_scheme",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ValidationCode,
    pub message: String,
    pub entity_type: Option<EntityKind>,
    pub entity_id: Option<Uuid>,
    pub entity_label: Option<String>,
}

impl ValidationError {
    fn snapshot_wide(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            entity_label: None,
        }
    }

    fn entity(
        code: ValidationCode,
        message: impl Into<String>,
        kind: EntityKind,
        id: Uuid,
        label: &str,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            entity_type: Some(kind),
            entity_id: Some(id),
            entity_label: Some(label.to_string()).filter(|l| !l.is_empty()),
        }
    }
}

/// Outcome of validating a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::from_errors(Vec::new())
    }
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Whether any violation carries `code`
    pub fn has(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn codes(&self) -> Vec<ValidationCode> {
        self.errors.iter().map(|e| e.code).collect()
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Validate a snapshot for publishing
pub fn validate(snapshot: &VocabularySnapshot) -> ValidationResult {
    let mut errors = Vec::new();

    if snapshot.schemes.is_empty() {
        errors.push(ValidationError::snapshot_wide(
            ValidationCode::NoSchemes,
            "The project has no concept schemes",
        ));
    }

    let concept_ids = snapshot.concept_ids();
    let scheme_ids = snapshot.scheme_ids();

    for scheme in &snapshot.schemes {
        if is_blank(scheme.uri.as_deref()) {
            errors.push(ValidationError::entity(
                ValidationCode::SchemeMissingUri,
                format!("Concept scheme '{}' has no URI", scheme.title),
                EntityKind::Scheme,
                scheme.id,
                &scheme.title,
            ));
        }
        if scheme.concepts.is_empty() {
            errors.push(ValidationError::entity(
                ValidationCode::SchemeNoConcepts,
                format!("Concept scheme '{}' has no concepts", scheme.title),
                EntityKind::Scheme,
                scheme.id,
                &scheme.title,
            ));
        }

        let mut seen_uris = HashSet::new();
        for concept in &scheme.concepts {
            check_concept(concept, &concept_ids, &mut seen_uris, &mut errors);
        }
    }

    for property in &snapshot.properties {
        match &property.range {
            None => errors.push(ValidationError::entity(
                ValidationCode::PropertyMissingRange,
                format!("Property '{}' has no range", property.label),
                EntityKind::Property,
                property.id,
                &property.label,
            )),
            Some(PropertyRange::Scheme { scheme_id }) if !scheme_ids.contains(scheme_id) => {
                errors.push(ValidationError::entity(
                    ValidationCode::DanglingRangeScheme,
                    format!(
                        "Property '{}' ranges over unknown concept scheme {}",
                        property.label, scheme_id
                    ),
                    EntityKind::Property,
                    property.id,
                    &property.label,
                ))
            }
            Some(_) => {}
        }
    }

    let cyclic = concepts_in_broader_cycles(snapshot);
    for concept in snapshot.concepts().filter(|c| cyclic.contains(&c.id)) {
        errors.push(ValidationError::entity(
            ValidationCode::BroaderCycle,
            format!("Concept '{}' is its own broader ancestor", concept.label()),
            EntityKind::Concept,
            concept.id,
            concept.label(),
        ));
    }

    ValidationResult::from_errors(errors)
}

fn check_concept(
    concept: &ConceptSnapshot,
    concept_ids: &HashSet<Uuid>,
    seen_uris: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    if is_blank(concept.pref_label.as_deref()) {
        errors.push(ValidationError::entity(
            ValidationCode::ConceptMissingPrefLabel,
            format!("Concept {} has no preferred label", concept.id),
            EntityKind::Concept,
            concept.id,
            "",
        ));
    }

    if let Some(uri) = concept.uri.as_deref().filter(|u| !u.trim().is_empty()) {
        if !seen_uris.insert(uri.to_string()) {
            errors.push(ValidationError::entity(
                ValidationCode::DuplicateConceptUri,
                format!("URI {} is used by more than one concept in the scheme", uri),
                EntityKind::Concept,
                concept.id,
                concept.label(),
            ));
        }
    }

    for target in concept.broader_ids.iter().filter(|id| !concept_ids.contains(id)) {
        errors.push(ValidationError::entity(
            ValidationCode::DanglingBroader,
            format!("Concept '{}' has unknown broader concept {}", concept.label(), target),
            EntityKind::Concept,
            concept.id,
            concept.label(),
        ));
    }

    for target in concept.related_ids.iter().filter(|id| !concept_ids.contains(id)) {
        errors.push(ValidationError::entity(
            ValidationCode::DanglingRelated,
            format!("Concept '{}' has unknown related concept {}", concept.label(), target),
            EntityKind::Concept,
            concept.id,
            concept.label(),
        ));
    }
}

/// Ids of concepts that sit on a cycle of broader links
fn concepts_in_broader_cycles(snapshot: &VocabularySnapshot) -> HashSet<Uuid> {
    let mut graph: DiGraph<Uuid, ()> = DiGraph::new();
    let mut nodes: HashMap<Uuid, NodeIndex> = HashMap::new();
    for concept in snapshot.concepts() {
        nodes.insert(concept.id, graph.add_node(concept.id));
    }

    let mut self_loops = HashSet::new();
    for concept in snapshot.concepts() {
        for target in &concept.broader_ids {
            if *target == concept.id {
                self_loops.insert(concept.id);
            }
            if let (Some(from), Some(to)) = (nodes.get(&concept.id), nodes.get(target)) {
                graph.add_edge(*from, *to, ());
            }
        }
    }

    let mut cyclic = self_loops;
    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            cyclic.extend(component.into_iter().map(|idx| graph[idx]));
        }
    }
    cyclic
}
