//! Append-only change tracking
//!
//! Every mutation of a vocabulary entity is documented by one [`ChangeEvent`]
//! written through the same transaction as the mutation itself, so a rolled
//! back mutation never leaves an audit record behind. Events are never
//! updated or deleted.
//!
//! The before/after states are caller-serialized documents holding only the
//! domain fields of an entity (see [`Audited`]); timestamps and graph
//! relationships are left out so that states stay comparable across edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PublishError, Result};
use crate::store::{ChangeEventStore, VocabularyReader};

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        }
    }
}

/// A mutation together with the states it carries
///
/// The variants fix which states are present for each action.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create { after: Value },
    Update { before: Value, after: Value },
    Delete { before: Value },
}

impl Change {
    pub fn action(&self) -> ChangeAction {
        match self {
            Change::Create { .. } => ChangeAction::Create,
            Change::Update { .. } => ChangeAction::Update,
            Change::Delete { .. } => ChangeAction::Delete,
        }
    }

    fn into_states(self) -> (Option<Value>, Option<Value>) {
        match self {
            Change::Create { after } => (None, Some(after)),
            Change::Update { before, after } => (Some(before), Some(after)),
            Change::Delete { before } => (Some(before), None),
        }
    }
}

/// Which part of the vocabulary a history query or event belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryScope {
    pub project_id: Option<Uuid>,
    pub scheme_id: Option<Uuid>,
}

impl HistoryScope {
    pub fn project(project_id: Uuid) -> Self {
        Self {
            project_id: Some(project_id),
            scheme_id: None,
        }
    }

    pub fn scheme(project_id: Uuid, scheme_id: Uuid) -> Self {
        Self {
            project_id: Some(project_id),
            scheme_id: Some(scheme_id),
        }
    }

    /// Whether an event falls inside this scope
    ///
    /// Every present component must match; an empty scope matches all events.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        let project_ok = self
            .project_id
            .map_or(true, |id| event.project_id == Some(id));
        let scheme_ok = self
            .scheme_id
            .map_or(true, |id| event.scheme_id == Some(id));
        project_ok && scheme_ok
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub actor: Option<String>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub project_id: Option<Uuid>,
    pub scheme_id: Option<Uuid>,
    pub action: ChangeAction,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
}

impl ChangeEvent {
    pub fn new(
        scope: &HistoryScope,
        entity_type: impl Into<String>,
        entity_id: Uuid,
        change: Change,
        actor: Option<&str>,
    ) -> Self {
        let action = change.action();
        let (before_state, after_state) = change.into_states();
        Self {
            id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            actor: actor.map(String::from),
            entity_type: entity_type.into(),
            entity_id,
            project_id: scope.project_id,
            scheme_id: scope.scheme_id,
            action,
            before_state,
            after_state,
        }
    }

    /// Whether the present states agree with the action
    pub fn is_well_formed(&self) -> bool {
        match self.action {
            ChangeAction::Create => self.before_state.is_none() && self.after_state.is_some(),
            ChangeAction::Update => self.before_state.is_some() && self.after_state.is_some(),
            ChangeAction::Delete => self.before_state.is_some() && self.after_state.is_none(),
        }
    }
}

/// An entity whose mutations are audited
pub trait Audited {
    /// Entity type name stored on events
    fn entity_type(&self) -> &'static str;

    fn entity_id(&self) -> Uuid;

    /// Domain fields only; no timestamps, no relationships
    fn audit_state(&self) -> Value;
}

/// Writes change events on behalf of one acting user
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    actor: Option<String>,
}

impl ChangeTracker {
    pub fn new(actor: Option<&str>) -> Self {
        Self {
            actor: actor.map(String::from),
        }
    }

    pub fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }

    /// Append one event. Store failures propagate unchanged.
    pub fn record<T>(
        &self,
        store: &mut T,
        scope: &HistoryScope,
        entity_type: &str,
        entity_id: Uuid,
        change: Change,
    ) -> Result<ChangeEvent>
    where
        T: ChangeEventStore + ?Sized,
    {
        let event = ChangeEvent::new(scope, entity_type, entity_id, change, self.actor());
        store.insert_event(event.clone())?;
        debug!(
            entity_type,
            entity_id = %entity_id,
            action = event.action.as_str(),
            "recorded change event"
        );
        Ok(event)
    }

    /// Record the transition of an audited entity between two states
    ///
    /// Returns `None` when nothing changed (no event is written).
    pub fn record_transition<T, A>(
        &self,
        store: &mut T,
        scope: &HistoryScope,
        before: Option<&A>,
        after: Option<&A>,
    ) -> Result<Option<ChangeEvent>>
    where
        T: ChangeEventStore + ?Sized,
        A: Audited,
    {
        let (entity, change) = match (before, after) {
            (None, Some(after)) => (
                after,
                Change::Create {
                    after: after.audit_state(),
                },
            ),
            (Some(before), None) => (
                before,
                Change::Delete {
                    before: before.audit_state(),
                },
            ),
            (Some(before), Some(after)) => {
                let (old, new) = (before.audit_state(), after.audit_state());
                if old == new {
                    return Ok(None);
                }
                (after, Change::Update { before: old, after: new })
            }
            (None, None) => return Ok(None),
        };

        let event = self.record(store, scope, entity.entity_type(), entity.entity_id(), change)?;
        Ok(Some(event))
    }
}

/// Pagination of history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// A page whose limit is capped at `max_limit`
    pub fn clamped(limit: usize, offset: usize, max_limit: usize) -> Self {
        Self {
            limit: limit.min(max_limit),
            offset,
        }
    }
}

/// A change event as shown to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventView {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub actor: Option<String>,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: ChangeAction,
    /// Top-level fields whose value differs between before and after
    pub changed_fields: Vec<String>,
    pub before_state: Option<Value>,
    pub after_state: Option<Value>,
}

impl From<ChangeEvent> for ChangeEventView {
    fn from(event: ChangeEvent) -> Self {
        let changed_fields = changed_fields(event.before_state.as_ref(), event.after_state.as_ref());
        Self {
            id: event.id,
            occurred_at: event.occurred_at,
            actor: event.actor,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            action: event.action,
            changed_fields,
            before_state: event.before_state,
            after_state: event.after_state,
        }
    }
}

fn changed_fields(before: Option<&Value>, after: Option<&Value>) -> Vec<String> {
    let empty = serde_json::Map::new();
    let before = before.and_then(Value::as_object).unwrap_or(&empty);
    let after = after.and_then(Value::as_object).unwrap_or(&empty);

    let mut fields: Vec<String> = before
        .keys()
        .chain(after.keys())
        .filter(|key| before.get(*key) != after.get(*key))
        .cloned()
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Events in a scope, newest first
pub fn get_history<T>(store: &T, scope: &HistoryScope, page: Page) -> Result<Vec<ChangeEventView>>
where
    T: ChangeEventStore + ?Sized,
{
    let events = store.query_events(scope, page.limit, page.offset)?;
    Ok(events.into_iter().map(ChangeEventView::from).collect())
}

/// History of a project; NotFound if the project does not exist
pub fn project_history<T>(store: &T, project_id: Uuid, page: Page) -> Result<Vec<ChangeEventView>>
where
    T: ChangeEventStore + VocabularyReader + ?Sized,
{
    if store.get_project(project_id)?.is_none() {
        return Err(PublishError::not_found("project", project_id));
    }
    get_history(store, &HistoryScope::project(project_id), page)
}

/// History of a concept scheme; NotFound if the scheme does not exist
pub fn scheme_history<T>(store: &T, scheme_id: Uuid, page: Page) -> Result<Vec<ChangeEventView>>
where
    T: ChangeEventStore + VocabularyReader + ?Sized,
{
    let scheme = store
        .get_scheme(scheme_id)?
        .ok_or_else(|| PublishError::not_found("concept scheme", scheme_id))?;
    get_history(store, &HistoryScope::scheme(scheme.project_id, scheme_id), page)
}
