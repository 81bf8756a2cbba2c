use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use leadops_domain::event::EventStatus;
use leadops_domain::id::{EventId, ProjectId, TenantId};

/// Outbox event as stored in the `events` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    pub event_type: String,
    pub payload: Value,
    pub status: EventStatus,
    pub retry_count: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub acked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Fresh `new` event built from a producer's draft.
    pub fn create(draft: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: EventId::generate(),
            tenant_id: draft.tenant_id,
            project_id: draft.project_id,
            event_type: draft.event_type,
            payload: draft.payload,
            status: EventStatus::New,
            retry_count: 0,
            sent_at: None,
            acked_at: None,
            last_error: None,
            created_at: now,
        }
    }

    pub fn is_exhausted(&self, max_retries: i32) -> bool {
        self.retry_count >= max_retries
    }
}

/// What a producer supplies to record a new event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    pub event_type: String,
    pub payload: Value,
}

/// Wire wrapper posted to `{AUTOMATION_URL}/events`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub event_id: EventId,
    pub app_name: String,
    pub event_type: String,
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    #[serde(serialize_with = "leadops_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}

impl Envelope {
    pub fn for_event(event: &Event, app_name: &str) -> Self {
        Self {
            event_id: event.id,
            app_name: app_name.to_owned(),
            event_type: event.event_type.clone(),
            tenant_id: event.tenant_id,
            project_id: event.project_id,
            created_at: event.created_at,
            payload: event.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MaxRetriesReached,
    Backoff,
}

/// Outcome of one event within a dispatcher batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DispatchOutcome {
    Sent,
    Skipped { reason: SkipReason },
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub id: EventId,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Number of events selected for this batch.
    pub processed: usize,
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn count(&self, pred: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Audit record written once per callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRun {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    pub agent_id: Option<String>,
    pub event_id: EventId,
    pub event_type: String,
    pub input: Value,
    pub output: Value,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The `run` sub-object of a callback body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunReport {
    #[serde(default)]
    pub agent_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Named database function call requested by a callback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcCall {
    #[serde(rename = "fn")]
    pub function: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Insert,
    Update,
    Upsert,
}

/// Declarative table mutation requested by a callback.
///
/// `insert` writes `match ∪ data`; `update` sets `data` on rows equal to
/// `match`; `upsert` inserts `match ∪ data` and on conflict over the `match`
/// columns updates the `data` columns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableMutation {
    pub table: String,
    pub op: MutationOp,
    #[serde(default, rename = "match")]
    pub match_on: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Event a callback asks to create. Scope defaults to the acknowledged event's.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmitRequest {
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Filter for the event inspection listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub tenant_id: Option<TenantId>,
    /// `Some(true)`: only events at or past the retry bound; `Some(false)`: only below it.
    pub exhausted: Option<bool>,
}

/// Returns `true` for names safe to splice into SQL as quoted identifiers:
/// lowercase ASCII letters, digits and `_`, not starting with a digit, ≤ 63 bytes.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= 63
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
