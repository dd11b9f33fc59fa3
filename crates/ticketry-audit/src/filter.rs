//! Predicate filtering of audit events.

use std::borrow::Borrow;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketry_trace::TraceId;

use crate::actor::ActorType;
use crate::event::{AuditEvent, Operation};

/// An inclusive time window. A missing bound is open on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest matching timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// Latest matching timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// A window bounded on both sides.
    #[must_use]
    pub const fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Everything at or after `start`.
    #[must_use]
    pub const fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Everything at or before `end`.
    #[must_use]
    pub const fn until(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    /// Returns true if `timestamp` falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

/// A conjunction of optional clauses over audit events.
///
/// Every non-empty clause must hold for an event to match; empty sets and
/// `None` fields place no constraint.
///
/// ```
/// use ticketry_audit::{ActorType, AuditFilter, Operation};
///
/// let filter = AuditFilter::new()
///     .operation(Operation::Update)
///     .operation(Operation::Delete)
///     .actor_type(ActorType::Ai)
///     .entity_type("ticket");
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    /// Allowed operations.
    pub operations: BTreeSet<Operation>,
    /// Allowed entity types.
    pub entity_types: BTreeSet<String>,
    /// Allowed entity IDs.
    pub entity_ids: BTreeSet<String>,
    /// Allowed actor IDs.
    pub actor_ids: BTreeSet<String>,
    /// Allowed actor types.
    pub actor_types: BTreeSet<ActorType>,
    /// Case-insensitive substring of the actor's display name.
    pub actor_name: Option<String>,
    /// Allowed sources.
    pub sources: BTreeSet<String>,
    /// Allowed trace IDs.
    pub trace_ids: BTreeSet<TraceId>,
    /// Allowed time window.
    pub date_range: Option<DateRange>,
}

fn allows<T, Q>(set: &BTreeSet<T>, value: &Q) -> bool
where
    T: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
{
    set.is_empty() || set.contains(value)
}

impl AuditFilter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Adds an allowed operation.
    #[must_use]
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.insert(operation);
        self
    }

    /// Adds an allowed entity type.
    #[must_use]
    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_types.insert(entity_type.into());
        self
    }

    /// Adds an allowed entity ID.
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_ids.insert(entity_id.into());
        self
    }

    /// Adds an allowed actor ID.
    #[must_use]
    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_ids.insert(actor_id.into());
        self
    }

    /// Adds an allowed actor type.
    #[must_use]
    pub fn actor_type(mut self, actor_type: ActorType) -> Self {
        self.actor_types.insert(actor_type);
        self
    }

    /// Requires the actor name to contain `needle`, ignoring case.
    #[must_use]
    pub fn actor_name(mut self, needle: impl Into<String>) -> Self {
        self.actor_name = Some(needle.into());
        self
    }

    /// Adds an allowed source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.insert(source.into());
        self
    }

    /// Adds an allowed trace ID.
    #[must_use]
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_ids.insert(trace_id);
        self
    }

    /// Restricts matches to a time window.
    #[must_use]
    pub const fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Returns true if `event` satisfies every clause.
    #[must_use]
    pub fn matches(&self, event: &AuditEvent) -> bool {
        let actor = event.actor();

        allows(&self.operations, &event.operation())
            && allows(&self.entity_types, event.entity_type())
            && allows(&self.entity_ids, event.entity_id())
            && allows(&self.actor_ids, actor.id.as_str())
            && allows(&self.actor_types, &actor.actor_type)
            && self.actor_name_matches(actor.name.as_deref())
            && allows(&self.sources, event.source())
            && allows(&self.trace_ids, &event.trace_id())
            && self
                .date_range
                .map_or(true, |range| range.contains(event.timestamp()))
    }

    fn actor_name_matches(&self, name: Option<&str>) -> bool {
        match self.actor_name.as_deref().filter(|n| !n.is_empty()) {
            None => true,
            Some(needle) => {
                name.is_some_and(|n| n.to_lowercase().contains(&needle.to_lowercase()))
            }
        }
    }

    /// Returns the events that match, in their original order.
    pub fn apply<'a, I>(&'a self, events: I) -> impl Iterator<Item = &'a AuditEvent> + 'a
    where
        I: IntoIterator<Item = &'a AuditEvent>,
        I::IntoIter: 'a,
    {
        events.into_iter().filter(move |event| self.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::event::EventOptions;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn event(actor: Actor, operation: Operation, hour: u32) -> AuditEvent {
        let builder = AuditEvent::builder(operation)
            .actor(actor)
            .entity("ticket", "T-1")
            .source("cli")
            .options(EventOptions::new().timestamp(at(hour)));
        let builder = match operation {
            Operation::Create => builder.after(json!({ "title": "X" })),
            Operation::Read => builder.state(json!({ "title": "X" })),
            Operation::Update => builder
                .before(json!({ "title": "X" }))
                .after(json!({ "title": "Y" })),
            Operation::Delete => builder.before(json!({ "title": "Y" })),
        };
        builder.build().unwrap()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = AuditFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&event(Actor::human("u1"), Operation::Create, 9)));
    }

    #[test]
    fn test_operation_and_actor_type_clauses() {
        let filter = AuditFilter::new()
            .operation(Operation::Update)
            .operation(Operation::Delete)
            .actor_type(ActorType::Ai);

        assert!(filter.matches(&event(Actor::ai("a1", "u1"), Operation::Update, 9)));
        assert!(filter.matches(&event(Actor::ai("a1", "u1"), Operation::Delete, 9)));
        assert!(!filter.matches(&event(Actor::ai("a1", "u1"), Operation::Create, 9)));
        assert!(!filter.matches(&event(Actor::human("u1"), Operation::Update, 9)));
    }

    #[test]
    fn test_identity_clauses() {
        let e = event(Actor::human("u1"), Operation::Read, 9);

        assert!(AuditFilter::new().actor_id("u1").matches(&e));
        assert!(!AuditFilter::new().actor_id("u2").matches(&e));
        assert!(AuditFilter::new().entity_type("ticket").entity_id("T-1").matches(&e));
        assert!(!AuditFilter::new().entity_id("T-2").matches(&e));
        assert!(AuditFilter::new().source("cli").source("mcp").matches(&e));
        assert!(!AuditFilter::new().source("sdk").matches(&e));
        assert!(AuditFilter::new().trace_id(e.trace_id()).matches(&e));
        assert!(!AuditFilter::new().trace_id(TraceId::generate()).matches(&e));
    }

    #[test]
    fn test_actor_name_substring() {
        let named = event(Actor::human("u1").with_name("Grace Hopper"), Operation::Read, 9);
        let anonymous = event(Actor::human("u2"), Operation::Read, 9);

        assert!(AuditFilter::new().actor_name("hopper").matches(&named));
        assert!(AuditFilter::new().actor_name("GRACE").matches(&named));
        assert!(!AuditFilter::new().actor_name("ada").matches(&named));
        assert!(!AuditFilter::new().actor_name("hopper").matches(&anonymous));
        assert!(AuditFilter::new().actor_name("").matches(&anonymous));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let e = event(Actor::human("u1"), Operation::Read, 10);

        assert!(AuditFilter::new()
            .date_range(DateRange::between(at(10), at(10)))
            .matches(&e));
        assert!(AuditFilter::new().date_range(DateRange::since(at(9))).matches(&e));
        assert!(AuditFilter::new().date_range(DateRange::until(at(10))).matches(&e));
        assert!(!AuditFilter::new()
            .date_range(DateRange::since(at(10) + Duration::seconds(1)))
            .matches(&e));
        assert!(!AuditFilter::new().date_range(DateRange::until(at(9))).matches(&e));
        assert!(AuditFilter::new().date_range(DateRange::default()).matches(&e));
    }

    #[test]
    fn test_all_clauses_must_hold() {
        let e = event(Actor::ai("a1", "u1"), Operation::Update, 10);
        let filter = AuditFilter::new()
            .operation(Operation::Update)
            .actor_type(ActorType::Ai)
            .source("sdk");
        assert!(!filter.matches(&e));
        assert!(!e.matches(&filter));
    }

    #[test]
    fn test_apply_keeps_order() {
        let events = vec![
            event(Actor::human("u1"), Operation::Create, 8),
            event(Actor::human("u2"), Operation::Update, 9),
            event(Actor::human("u1"), Operation::Delete, 10),
        ];
        let filter = AuditFilter::new().actor_id("u1");
        let ops: Vec<_> = filter.apply(&events).map(AuditEvent::operation).collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Delete]);
    }

    #[test]
    fn test_filter_deserializes_from_partial_json() {
        let filter: AuditFilter = serde_json::from_value(json!({
            "operations": ["UPDATE"],
            "actor_types": ["ai"]
        }))
        .unwrap();
        assert_eq!(filter, AuditFilter::new().operation(Operation::Update).actor_type(ActorType::Ai));
    }
}
