//! Audit event definitions.
//!
//! An [`AuditEvent`] records one completed create, read, update or delete of
//! an entity. The shared fields (who, what, when, which trace) live on the
//! event; the operation-specific state lives in [`AuditPayload`], so the
//! operation tag and the shape of the state can never disagree.
//!
//! Events are built once, through [`AuditEvent::create`],
//! [`AuditEvent::read`], [`AuditEvent::update`], [`AuditEvent::delete`] or
//! [`AuditEventBuilder`], and are immutable afterwards. The `with_*` methods
//! and [`AuditEvent::sanitized`] return new events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ticketry_core::redact::is_sensitive_key;
use ticketry_core::validation::non_empty;
use ticketry_core::{Redactor, Validate, ValidationError, ValidationErrors};
use ticketry_trace::{current_context, SpanId, TraceContext, TraceId};
use uuid::{Timestamp, Uuid};

use crate::actor::Actor;
use crate::diff::{calculate_changes, ChangeType, FieldChange};
use crate::filter::AuditFilter;

/// Keyed entity state.
pub type State = Map<String, Value>;

/// Generates a new time-ordered v7 UUID for audit events.
pub(crate) fn new_event_id() -> Uuid {
    let ts = Timestamp::now(uuid::NoContext);
    Uuid::new_v7(ts)
}

/// The kind of operation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// An entity was created.
    Create,
    /// An entity was read.
    Read,
    /// An entity was modified.
    Update,
    /// An entity was removed.
    Delete,
}

impl Operation {
    /// Returns the uppercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation-specific state of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum AuditPayload {
    /// State of a newly created entity. There is no prior state.
    Create {
        /// State after creation.
        after: State,
    },
    /// State that was accessed.
    Read {
        /// State that was read.
        state: State,
        /// How the state was accessed (query, fields, etc.).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access: Option<State>,
    },
    /// State before and after a modification.
    Update {
        /// State before the update.
        before: State,
        /// State after the update.
        after: State,
        /// Field differences from `before` to `after`.
        changes: Vec<FieldChange>,
    },
    /// State of a removed entity. There is no later state.
    Delete {
        /// State before deletion.
        before: State,
        /// How the entity was deleted (soft/hard, reason, etc.).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deletion: Option<State>,
    },
}

impl AuditPayload {
    /// The operation this payload belongs to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::Read { .. } => Operation::Read,
            Self::Update { .. } => Operation::Update,
            Self::Delete { .. } => Operation::Delete,
        }
    }

    fn redacted(&self, redactor: &mut Redactor) -> Self {
        match self {
            Self::Create { after } => Self::Create {
                after: redactor.redact_object(after),
            },
            Self::Read { state, access } => Self::Read {
                state: redactor.redact_object(state),
                access: redact_details(redactor, access.as_ref()),
            },
            Self::Update {
                before,
                after,
                changes,
            } => Self::Update {
                before: redactor.redact_object(before),
                after: redactor.redact_object(after),
                changes: changes
                    .iter()
                    .filter_map(|c| c.redacted(redactor))
                    .collect(),
            },
            Self::Delete { before, deletion } => Self::Delete {
                before: redactor.redact_object(before),
                deletion: redact_details(redactor, deletion.as_ref()),
            },
        }
    }
}

fn redact_details(redactor: &mut Redactor, details: Option<&State>) -> Option<State> {
    details.map(|d| redactor.redact_object(d))
}

/// Where in a trace an event was produced, plus free-form request metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Span of the operation that produced the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,

    /// Parent of that span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,

    /// Caller-supplied request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Additional request metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: State,
}

impl EventContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the span position of `trace`.
    #[must_use]
    pub fn from_trace(trace: &TraceContext) -> Self {
        Self {
            span_id: Some(trace.span_id()),
            parent_span_id: trace.parent_span_id(),
            ..Self::default()
        }
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Optional overrides applied when constructing an event.
///
/// Anything left unset is filled in automatically: a fresh v7 UUID, the
/// current time, the trace ID of the current scoped context (or a new one),
/// and the span position of the current context.
#[derive(Debug, Clone, Default)]
pub struct EventOptions {
    id: Option<Uuid>,
    timestamp: Option<DateTime<Utc>>,
    trace_id: Option<TraceId>,
    context: Option<EventContext>,
}

impl EventOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific event ID.
    #[must_use]
    pub const fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Uses a specific timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Uses a specific trace ID.
    #[must_use]
    pub const fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Attaches an explicit event context.
    #[must_use]
    pub fn context(mut self, context: EventContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// A recorded operation on an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    id: Uuid,
    timestamp: DateTime<Utc>,
    trace_id: TraceId,
    actor: Actor,
    entity_type: String,
    entity_id: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<EventContext>,
    #[serde(flatten)]
    payload: AuditPayload,
}

impl AuditEvent {
    /// Starts building an event for `operation`.
    #[must_use]
    pub fn builder(operation: Operation) -> AuditEventBuilder {
        AuditEventBuilder::new(operation)
    }

    /// Records the creation of an entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is empty, the actor is
    /// invalid, or `after` is not a JSON object.
    pub fn create(
        actor: Actor,
        entity_type: &str,
        entity_id: &str,
        after: Value,
        source: &str,
        options: EventOptions,
    ) -> Result<Self, ValidationError> {
        Self::builder(Operation::Create)
            .actor(actor)
            .entity(entity_type, entity_id)
            .source(source)
            .after(after)
            .options(options)
            .build()
    }

    /// Records a read of an entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is empty, the actor is
    /// invalid, or `state` is not a JSON object.
    pub fn read(
        actor: Actor,
        entity_type: &str,
        entity_id: &str,
        state: Value,
        source: &str,
        options: EventOptions,
    ) -> Result<Self, ValidationError> {
        Self::builder(Operation::Read)
            .actor(actor)
            .entity(entity_type, entity_id)
            .source(source)
            .state(state)
            .options(options)
            .build()
    }

    /// Records an update of an entity; the field changes are computed.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is empty, the actor is
    /// invalid, or either snapshot is not a JSON object.
    pub fn update(
        actor: Actor,
        entity_type: &str,
        entity_id: &str,
        before: Value,
        after: Value,
        source: &str,
        options: EventOptions,
    ) -> Result<Self, ValidationError> {
        Self::builder(Operation::Update)
            .actor(actor)
            .entity(entity_type, entity_id)
            .source(source)
            .before(before)
            .after(after)
            .options(options)
            .build()
    }

    /// Records the deletion of an entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is empty, the actor is
    /// invalid, or `before` is not a JSON object.
    pub fn delete(
        actor: Actor,
        entity_type: &str,
        entity_id: &str,
        before: Value,
        source: &str,
        options: EventOptions,
    ) -> Result<Self, ValidationError> {
        Self::builder(Operation::Delete)
            .actor(actor)
            .entity(entity_type, entity_id)
            .source(source)
            .before(before)
            .options(options)
            .build()
    }

    /// Parses and validates an event from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe an event or the event
    /// fails validation.
    pub fn from_json(json: &str) -> ticketry_core::Result<Self> {
        let event: Self = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }

    /// Event ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// When the operation completed.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Trace the operation belonged to.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Operation kind.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.payload.operation()
    }

    /// Who performed the operation.
    #[must_use]
    pub const fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Type of the affected entity.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// ID of the affected entity.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Component that performed the operation (e.g. `cli`, `sdk`, `mcp`).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Span position and request metadata.
    #[must_use]
    pub const fn context(&self) -> Option<&EventContext> {
        self.context.as_ref()
    }

    /// Operation-specific state.
    #[must_use]
    pub const fn payload(&self) -> &AuditPayload {
        &self.payload
    }

    /// State before the operation; `None` for creates and reads.
    #[must_use]
    pub const fn before(&self) -> Option<&State> {
        match &self.payload {
            AuditPayload::Update { before, .. } | AuditPayload::Delete { before, .. } => {
                Some(before)
            }
            AuditPayload::Create { .. } | AuditPayload::Read { .. } => None,
        }
    }

    /// State after the operation; `None` for reads and deletes.
    #[must_use]
    pub const fn after(&self) -> Option<&State> {
        match &self.payload {
            AuditPayload::Create { after } | AuditPayload::Update { after, .. } => Some(after),
            AuditPayload::Read { .. } | AuditPayload::Delete { .. } => None,
        }
    }

    /// Field changes; empty for everything but updates.
    #[must_use]
    pub fn changes(&self) -> &[FieldChange] {
        match &self.payload {
            AuditPayload::Update { changes, .. } => changes,
            _ => &[],
        }
    }

    /// Returns a copy of this event attributed to another trace.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Returns a copy of this event with a different context.
    #[must_use]
    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Returns a copy of this event with sensitive values redacted.
    ///
    /// Applies to every snapshot, field change, detail map and context
    /// metadata. See [`ticketry_core::redact`] for the rules.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut redactor = Redactor::new();
        let payload = self.payload.redacted(&mut redactor);
        let context = self.context.as_ref().map(|ctx| EventContext {
            metadata: redactor.redact_object(&ctx.metadata),
            ..ctx.clone()
        });
        redactor.report(&self.id.to_string());

        Self {
            context,
            payload,
            ..self.clone()
        }
    }

    /// Returns true if this event satisfies every clause of `filter`.
    #[must_use]
    pub fn matches(&self, filter: &AuditFilter) -> bool {
        filter.matches(self)
    }
}

/// Redacts `event`. Equivalent to [`AuditEvent::sanitized`].
#[must_use]
pub fn sanitize(event: &AuditEvent) -> AuditEvent {
    event.sanitized()
}

impl Validate for AuditEvent {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(actor_errors) = self.actor.validate() {
            errors.merge(actor_errors);
        }
        errors.check(non_empty("entity_type", &self.entity_type));
        errors.check(non_empty("entity_id", &self.entity_id));
        errors.check(non_empty("source", &self.source));
        if let AuditPayload::Update {
            before,
            after,
            changes,
        } = &self.payload
        {
            errors.check(check_changes(before, after, changes));
        }
        errors.finish()
    }
}

/// Checks that `changes` is the diff of `before` and `after`.
///
/// Every recorded change must agree with both snapshots, in field order, and
/// every difference between them must be recorded. A change whose values
/// redaction made equal is kept, and a difference on a sensitive field may
/// be missing because redaction drops structured credentials.
fn check_changes(
    before: &State,
    after: &State,
    changes: &[FieldChange],
) -> Result<(), ValidationError> {
    let forged = |message: String| Err(ValidationError::constraint("changes", message));

    let mut previous: Option<&str> = None;
    for change in changes {
        if previous.is_some_and(|p| p >= change.field.as_str()) {
            return forged(format!("'{}' is out of order or repeated", change.field));
        }
        previous = Some(change.field.as_str());

        let old_value = before.get(&change.field);
        let new_value = after.get(&change.field);
        let expected = match (old_value, new_value) {
            (None, Some(_)) => ChangeType::Added,
            (Some(_), None) => ChangeType::Removed,
            (Some(_), Some(_)) => ChangeType::Modified,
            (None, None) => {
                return forged(format!("'{}' is in neither snapshot", change.field));
            }
        };
        if change.change_type != expected
            || change.old_value.as_ref() != old_value
            || change.new_value.as_ref() != new_value
        {
            return forged(format!("'{}' does not match the snapshots", change.field));
        }
    }

    for change in calculate_changes(before, after) {
        let recorded = changes.iter().any(|c| c.field == change.field);
        if !recorded && !is_sensitive_key(&change.field) {
            return forged(format!("'{}' changed but is not recorded", change.field));
        }
    }
    Ok(())
}

/// Builder for [`AuditEvent`] that validates the supplied state against the
/// declared operation.
///
/// | Operation | Requires | Rejects |
/// |-----------|----------|---------|
/// | CREATE | `after` | `before`, `state`, `details` |
/// | READ | `state` | `before`, `after` |
/// | UPDATE | `before`, `after` | `state`, `details` |
/// | DELETE | `before` | `after`, `state` |
///
/// A `null` snapshot counts as absent.
#[derive(Debug, Clone)]
pub struct AuditEventBuilder {
    operation: Operation,
    actor: Option<Actor>,
    entity_type: String,
    entity_id: String,
    source: String,
    before: Option<Value>,
    after: Option<Value>,
    state: Option<Value>,
    details: Option<Value>,
    options: EventOptions,
}

impl AuditEventBuilder {
    /// Creates a builder for `operation`.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            actor: None,
            entity_type: String::new(),
            entity_id: String::new(),
            source: String::new(),
            before: None,
            after: None,
            state: None,
            details: None,
            options: EventOptions::default(),
        }
    }

    /// Sets the actor.
    #[must_use]
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the affected entity.
    #[must_use]
    pub fn entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self.entity_id = entity_id.into();
        self
    }

    /// Sets the source component.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the prior state.
    #[must_use]
    pub fn before(mut self, before: Value) -> Self {
        self.before = Some(before);
        self
    }

    /// Sets the resulting state.
    #[must_use]
    pub fn after(mut self, after: Value) -> Self {
        self.after = Some(after);
        self
    }

    /// Sets the accessed state of a read.
    #[must_use]
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets access details (reads) or deletion details (deletes).
    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets construction overrides.
    #[must_use]
    pub fn options(mut self, options: EventOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the inputs and builds the event.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure: missing or invalid actor, empty
    /// entity type, entity ID or source, or state that does not fit the
    /// operation.
    pub fn build(self) -> Result<AuditEvent, ValidationError> {
        let actor = self.actor.ok_or_else(|| ValidationError::required("actor"))?;
        actor.check()?;
        non_empty("entity_type", &self.entity_type)?;
        non_empty("entity_id", &self.entity_id)?;
        non_empty("source", &self.source)?;

        let payload = build_payload(
            self.operation,
            self.before,
            self.after,
            self.state,
            self.details,
        )?;

        let current = current_context();
        let trace_id = self
            .options
            .trace_id
            .or_else(|| current.as_ref().map(TraceContext::trace_id))
            .unwrap_or_else(TraceId::generate);
        let context = self
            .options
            .context
            .or_else(|| current.as_ref().map(EventContext::from_trace));

        Ok(AuditEvent {
            id: self.options.id.unwrap_or_else(new_event_id),
            timestamp: self.options.timestamp.unwrap_or_else(Utc::now),
            trace_id,
            actor,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            source: self.source,
            context,
            payload,
        })
    }
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn require_state(field: &str, value: Option<Value>) -> Result<State, ValidationError> {
    match present(value) {
        None => Err(ValidationError::required(field)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ValidationError::format(field, "must be a JSON object")),
    }
}

fn optional_state(field: &str, value: Option<Value>) -> Result<Option<State>, ValidationError> {
    match present(value) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ValidationError::format(field, "must be a JSON object")),
    }
}

fn reject(operation: Operation, field: &str, value: Option<&Value>) -> Result<(), ValidationError> {
    if value.is_some_and(|v| !v.is_null()) {
        return Err(ValidationError::constraint(
            field,
            format!("'{field}' must not be set on {operation} events"),
        ));
    }
    Ok(())
}

fn build_payload(
    operation: Operation,
    before: Option<Value>,
    after: Option<Value>,
    state: Option<Value>,
    details: Option<Value>,
) -> Result<AuditPayload, ValidationError> {
    match operation {
        Operation::Create => {
            reject(operation, "before", before.as_ref())?;
            reject(operation, "state", state.as_ref())?;
            reject(operation, "details", details.as_ref())?;
            Ok(AuditPayload::Create {
                after: require_state("after", after)?,
            })
        }
        Operation::Read => {
            reject(operation, "before", before.as_ref())?;
            reject(operation, "after", after.as_ref())?;
            Ok(AuditPayload::Read {
                state: require_state("state", state)?,
                access: optional_state("details", details)?,
            })
        }
        Operation::Update => {
            reject(operation, "state", state.as_ref())?;
            reject(operation, "details", details.as_ref())?;
            let before = require_state("before", before)?;
            let after = require_state("after", after)?;
            let changes = calculate_changes(&before, &after);
            Ok(AuditPayload::Update {
                before,
                after,
                changes,
            })
        }
        Operation::Delete => {
            reject(operation, "after", after.as_ref())?;
            reject(operation, "state", state.as_ref())?;
            Ok(AuditPayload::Delete {
                before: require_state("before", before)?,
                deletion: optional_state("details", details)?,
            })
        }
    }
}
