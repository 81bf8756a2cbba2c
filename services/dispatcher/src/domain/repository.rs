#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use serde_json::Value;

use leadops_domain::id::EventId;
use leadops_domain::pagination::PageRequest;

use crate::domain::types::{AgentRun, Envelope, Event, EventFilter, RpcCall, TableMutation};
use crate::error::{DeliveryError, DispatcherError};

/// Repository for outbox events. Every mutation targets a single row by id.
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: &Event) -> Result<(), DispatcherError>;

    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>, DispatcherError>;

    /// Up to `limit` events with status `new`/`failed` and `retry_count < max_retries`,
    /// oldest `created_at` first.
    async fn list_dispatchable(
        &self,
        limit: u64,
        max_retries: i32,
    ) -> Result<Vec<Event>, DispatcherError>;

    /// `status=sent`, `sent_at=at`, `last_error=NULL`. No-op on acked events.
    async fn mark_sent(&self, id: EventId, at: DateTime<Utc>) -> Result<(), DispatcherError>;

    /// `status=failed`, `retry_count += 1`, `sent_at=at`, `last_error=error`.
    /// No-op on acked events.
    async fn mark_failed(
        &self,
        id: EventId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DispatcherError>;

    /// `status=acked`, `acked_at=at`. Idempotent.
    async fn mark_acked(&self, id: EventId, at: DateTime<Utc>) -> Result<(), DispatcherError>;

    /// Newest first.
    async fn list(
        &self,
        filter: EventFilter,
        max_retries: i32,
        page: PageRequest,
    ) -> Result<Vec<Event>, DispatcherError>;
}

/// Append-only store for agent run audit records.
pub trait AgentRunRepository: Send + Sync {
    async fn create(&self, run: &AgentRun) -> Result<(), DispatcherError>;
}

/// Executes the declarative side effects a callback carries.
/// Callers validate names against the allow-list before calling.
pub trait SideEffectPort: Send + Sync {
    /// Returns the function's result rows as a JSON array.
    async fn call_rpc(&self, call: &RpcCall) -> Result<Value, DispatcherError>;

    /// Returns the number of affected rows.
    async fn apply_mutation(&self, mutation: &TableMutation) -> Result<u64, DispatcherError>;
}

/// Delivery transport to the external automation endpoint.
pub trait EventSink: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError>;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
