use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, Statement, UpdateMany,
    Value as DbValue, sea_query::Expr,
};
use serde_json::Value;

use leadops_dispatcher_schema::{agent_runs, events};
use leadops_domain::event::EventStatus;
use leadops_domain::id::{EventId, ProjectId, TenantId};
use leadops_domain::pagination::PageRequest;

use crate::domain::repository::{AgentRunRepository, EventRepository, SideEffectPort};
use crate::domain::types::{AgentRun, Event, EventFilter, RpcCall, TableMutation};
use crate::error::DispatcherError;
use crate::infra::sql::{build_mutation, build_rpc};

// ── Event repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbEventRepository {
    pub db: DatabaseConnection,
}

impl EventRepository for DbEventRepository {
    async fn insert(&self, event: &Event) -> Result<(), DispatcherError> {
        events::ActiveModel {
            id: Set(event.id.0),
            tenant_id: Set(event.tenant_id.0),
            project_id: Set(event.project_id.map(|p| p.0)),
            event_type: Set(event.event_type.clone()),
            payload: Set(event.payload.clone()),
            status: Set(event.status.as_str().to_owned()),
            retry_count: Set(event.retry_count),
            sent_at: Set(event.sent_at),
            acked_at: Set(event.acked_at),
            last_error: Set(event.last_error.clone()),
            created_at: Set(event.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert event")?;
        Ok(())
    }

    async fn find_by_id(&self, id: EventId) -> Result<Option<Event>, DispatcherError> {
        let model = events::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .context("find event by id")?;
        model.map(event_from_model).transpose()
    }

    async fn list_dispatchable(
        &self,
        limit: u64,
        max_retries: i32,
    ) -> Result<Vec<Event>, DispatcherError> {
        let models = dispatchable_query(limit, max_retries)
            .all(&self.db)
            .await
            .context("list dispatchable events")?;
        models.into_iter().map(event_from_model).collect()
    }

    async fn mark_sent(&self, id: EventId, at: DateTime<Utc>) -> Result<(), DispatcherError> {
        mark_sent_query(id, at)
            .exec(&self.db)
            .await
            .context("mark event sent")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: EventId,
        error: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DispatcherError> {
        mark_failed_query(id, error, at)
            .exec(&self.db)
            .await
            .context("mark event failed")?;
        Ok(())
    }

    async fn mark_acked(&self, id: EventId, at: DateTime<Utc>) -> Result<(), DispatcherError> {
        mark_acked_query(id, at)
            .exec(&self.db)
            .await
            .context("mark event acked")?;
        Ok(())
    }

    async fn list(
        &self,
        filter: EventFilter,
        max_retries: i32,
        page: PageRequest,
    ) -> Result<Vec<Event>, DispatcherError> {
        let models = list_query(filter, max_retries, page)
            .all(&self.db)
            .await
            .context("list events")?;
        models.into_iter().map(event_from_model).collect()
    }
}

// ── Event queries ────────────────────────────────────────────────────────────

/// Oldest deliverable events still below the retry bound.
fn dispatchable_query(limit: u64, max_retries: i32) -> Select<events::Entity> {
    events::Entity::find()
        .filter(events::Column::Status.is_in(EventStatus::DISPATCHABLE.map(EventStatus::as_str)))
        .filter(events::Column::RetryCount.lt(max_retries))
        .order_by_asc(events::Column::CreatedAt)
        .order_by_asc(events::Column::Id)
        .limit(limit)
}

/// Delivery outcomes never overwrite an ack that landed first.
fn unless_acked(update: UpdateMany<events::Entity>, id: EventId) -> UpdateMany<events::Entity> {
    update
        .filter(events::Column::Id.eq(id.0))
        .filter(events::Column::Status.ne(EventStatus::Acked.as_str()))
}

fn mark_sent_query(id: EventId, at: DateTime<Utc>) -> UpdateMany<events::Entity> {
    let update = events::Entity::update_many()
        .col_expr(events::Column::Status, Expr::value(EventStatus::Sent.as_str()))
        .col_expr(events::Column::SentAt, Expr::value(at))
        .col_expr(events::Column::LastError, Expr::value(Option::<String>::None));
    unless_acked(update, id)
}

fn mark_failed_query(id: EventId, error: &str, at: DateTime<Utc>) -> UpdateMany<events::Entity> {
    let update = events::Entity::update_many()
        .col_expr(events::Column::Status, Expr::value(EventStatus::Failed.as_str()))
        .col_expr(
            events::Column::RetryCount,
            Expr::col(events::Column::RetryCount).add(1),
        )
        .col_expr(events::Column::SentAt, Expr::value(at))
        .col_expr(events::Column::LastError, Expr::value(error));
    unless_acked(update, id)
}

fn mark_acked_query(id: EventId, at: DateTime<Utc>) -> UpdateMany<events::Entity> {
    events::Entity::update_many()
        .col_expr(events::Column::Status, Expr::value(EventStatus::Acked.as_str()))
        .col_expr(events::Column::AckedAt, Expr::value(at))
        .filter(events::Column::Id.eq(id.0))
}

fn list_query(filter: EventFilter, max_retries: i32, page: PageRequest) -> Select<events::Entity> {
    let mut query = events::Entity::find();
    if let Some(status) = filter.status {
        query = query.filter(events::Column::Status.eq(status.as_str()));
    }
    if let Some(tenant_id) = filter.tenant_id {
        query = query.filter(events::Column::TenantId.eq(tenant_id.0));
    }
    query = match filter.exhausted {
        Some(true) => query.filter(events::Column::RetryCount.gte(max_retries)),
        Some(false) => query.filter(events::Column::RetryCount.lt(max_retries)),
        None => query,
    };
    let page = page.clamped();
    query
        .order_by_desc(events::Column::CreatedAt)
        .order_by_desc(events::Column::Id)
        .offset(page.offset())
        .limit(u64::from(page.per_page))
}

fn event_from_model(model: events::Model) -> Result<Event, DispatcherError> {
    let status = model
        .status
        .parse::<EventStatus>()
        .with_context(|| format!("event {}", model.id))?;
    Ok(Event {
        id: EventId(model.id),
        tenant_id: TenantId(model.tenant_id),
        project_id: model.project_id.map(ProjectId),
        event_type: model.event_type,
        payload: model.payload,
        status,
        retry_count: model.retry_count,
        sent_at: model.sent_at,
        acked_at: model.acked_at,
        last_error: model.last_error,
        created_at: model.created_at,
    })
}

// ── Agent run repository ─────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbAgentRunRepository {
    pub db: DatabaseConnection,
}

impl AgentRunRepository for DbAgentRunRepository {
    async fn create(&self, run: &AgentRun) -> Result<(), DispatcherError> {
        agent_runs::ActiveModel {
            id: Set(run.id),
            tenant_id: Set(run.tenant_id.0),
            project_id: Set(run.project_id.map(|p| p.0)),
            agent_id: Set(run.agent_id.clone()),
            event_id: Set(run.event_id.0),
            event_type: Set(run.event_type.clone()),
            input: Set(run.input.clone()),
            output: Set(run.output.clone()),
            status: Set(run.status.clone()),
            started_at: Set(run.started_at),
            finished_at: Set(run.finished_at),
            error: Set(run.error.clone()),
            created_at: Set(run.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert agent run")?;
        Ok(())
    }
}

// ── Declarative side effects ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSideEffects {
    pub db: DatabaseConnection,
}

impl SideEffectPort for DbSideEffects {
    async fn call_rpc(&self, call: &RpcCall) -> Result<Value, DispatcherError> {
        let (sql, args) = build_rpc(call);
        let rows = self
            .db
            .query_all(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                &sql,
                args.into_iter().map(rpc_arg),
            ))
            .await
            .with_context(|| format!("call {}", call.function))?;
        let results = rows
            .iter()
            .map(|row| row.try_get::<Value>("", "result"))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("read result of {}", call.function))?;
        Ok(Value::Array(results))
    }

    async fn apply_mutation(&self, mutation: &TableMutation) -> Result<u64, DispatcherError> {
        let built = build_mutation(mutation);
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                self.db.get_database_backend(),
                &built.sql,
                built.params.into_iter().map(DbValue::from),
            ))
            .await
            .with_context(|| format!("{:?} {}", mutation.op, mutation.table))?;
        Ok(result.rows_affected())
    }
}

/// Binds a JSON argument with the closest scalar Postgres type so plain
/// `text`/`bigint`/`double precision`/`boolean` parameters resolve; objects
/// and arrays go as `jsonb`. Integers beyond `bigint` go as text so no digit
/// is lost.
fn rpc_arg(value: Value) -> DbValue {
    match value {
        Value::Null => DbValue::String(None),
        Value::Bool(b) => b.into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None if n.is_u64() => n.to_string().into(),
            None => n.as_f64().unwrap_or(f64::NAN).into(),
        },
        Value::String(s) => s.into(),
        other @ (Value::Array(_) | Value::Object(_)) => other.into(),
    }
}
