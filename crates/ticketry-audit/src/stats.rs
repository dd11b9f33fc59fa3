//! Aggregate counts over a collection of audit events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorType;
use crate::event::{AuditEvent, Operation};

/// The reporting window a set of statistics describes.
///
/// The window is carried for display only; [`calculate_statistics`] counts
/// every event it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsPeriod {
    /// Start of the window.
    pub start: DateTime<Utc>,
    /// End of the window.
    pub end: DateTime<Utc>,
}

impl StatisticsPeriod {
    /// Creates a period.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Event counts, in total and grouped by operation, actor type, entity type
/// and source.
///
/// Each grouping sums to `total_events`. Keys with a zero count are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStatistics {
    /// The window the counts describe.
    pub period: StatisticsPeriod,
    /// Number of events counted.
    pub total_events: usize,
    /// Count per operation.
    pub by_operation: BTreeMap<Operation, usize>,
    /// Count per actor type.
    pub by_actor_type: BTreeMap<ActorType, usize>,
    /// Count per entity type.
    pub by_entity_type: BTreeMap<String, usize>,
    /// Count per source.
    pub by_source: BTreeMap<String, usize>,
}

impl AuditStatistics {
    /// Statistics for an empty collection.
    #[must_use]
    pub const fn empty(period: StatisticsPeriod) -> Self {
        Self {
            period,
            total_events: 0,
            by_operation: BTreeMap::new(),
            by_actor_type: BTreeMap::new(),
            by_entity_type: BTreeMap::new(),
            by_source: BTreeMap::new(),
        }
    }

    /// Adds one event to the counts.
    pub fn record(&mut self, event: &AuditEvent) {
        self.total_events += 1;
        *self.by_operation.entry(event.operation()).or_default() += 1;
        *self
            .by_actor_type
            .entry(event.actor().actor_type)
            .or_default() += 1;
        *self
            .by_entity_type
            .entry(event.entity_type().to_owned())
            .or_default() += 1;
        *self.by_source.entry(event.source().to_owned()).or_default() += 1;
    }

    /// Returns the count for `operation`.
    #[must_use]
    pub fn operation_count(&self, operation: Operation) -> usize {
        self.by_operation.get(&operation).copied().unwrap_or(0)
    }

    /// Returns the count for `actor_type`.
    #[must_use]
    pub fn actor_type_count(&self, actor_type: ActorType) -> usize {
        self.by_actor_type.get(&actor_type).copied().unwrap_or(0)
    }
}

/// Counts `events` in a single pass.
///
/// ```
/// use chrono::Utc;
/// use ticketry_audit::{calculate_statistics, AuditEvent, StatisticsPeriod};
///
/// let now = Utc::now();
/// let events: Vec<AuditEvent> = Vec::new();
/// let stats = calculate_statistics(&events, StatisticsPeriod::new(now, now));
/// assert_eq!(stats.total_events, 0);
/// assert!(stats.by_operation.is_empty());
/// ```
pub fn calculate_statistics<'a, I>(events: I, period: StatisticsPeriod) -> AuditStatistics
where
    I: IntoIterator<Item = &'a AuditEvent>,
{
    events
        .into_iter()
        .fold(AuditStatistics::empty(period), |mut stats, event| {
            stats.record(event);
            stats
        })
}
