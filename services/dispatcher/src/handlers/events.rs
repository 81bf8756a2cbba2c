use axum::{
    Json,
    extract::{Path, RawQuery, State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use leadops_domain::event::EventStatus;
use leadops_domain::id::{EventId, ProjectId, TenantId};
use leadops_domain::pagination::PageRequest;

use crate::auth::WebhookAuth;
use crate::domain::types::{Event, EventFilter, NewEvent};
use crate::error::DispatcherError;
use crate::state::AppState;
use crate::usecase::emit::EmitEventUseCase;
use crate::usecase::events::{GetEventUseCase, ListEventsUseCase};

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: EventId,
    pub tenant_id: TenantId,
    pub project_id: Option<ProjectId>,
    pub event_type: String,
    pub payload: Value,
    pub status: EventStatus,
    pub retry_count: i32,
    pub exhausted: bool,
    #[serde(serialize_with = "leadops_core::serde::to_rfc3339_ms_opt")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "leadops_core::serde::to_rfc3339_ms_opt")]
    pub acked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(serialize_with = "leadops_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

impl EventResponse {
    fn new(event: Event, max_retries: i32) -> Self {
        Self {
            exhausted: event.is_exhausted(max_retries),
            id: event.id,
            tenant_id: event.tenant_id,
            project_id: event.project_id,
            event_type: event.event_type,
            payload: event.payload,
            status: event.status,
            retry_count: event.retry_count,
            sent_at: event.sent_at,
            acked_at: event.acked_at,
            last_error: event.last_error,
            created_at: event.created_at,
        }
    }
}

// ── POST /events ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

pub async fn create_event(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    body: Result<Json<EmitEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EventResponse>), DispatcherError> {
    let Json(body) = body.map_err(|e| DispatcherError::InvalidRequest(e.body_text()))?;
    let usecase = EmitEventUseCase {
        events: state.event_repo(),
        clock: state.clock(),
    };
    let event = usecase
        .execute(NewEvent {
            tenant_id: body.tenant_id,
            project_id: body.project_id,
            event_type: body.event_type,
            payload: body.payload,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(EventResponse::new(event, state.config.dispatch_max_retries)),
    ))
}

// ── GET /events/{id} ─────────────────────────────────────────────────────────

pub async fn get_event(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>, DispatcherError> {
    let id: EventId = id
        .parse()
        .map_err(|_| DispatcherError::InvalidRequest(format!("invalid event id: {id}")))?;
    let usecase = GetEventUseCase {
        repo: state.event_repo(),
    };
    let event = usecase.execute(id).await?;
    Ok(Json(EventResponse::new(
        event,
        state.config.dispatch_max_retries,
    )))
}

// ── GET /events ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct EventListQuery {
    pub status: Option<EventStatus>,
    pub tenant_id: Option<TenantId>,
    pub exhausted: Option<bool>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

impl EventListQuery {
    fn parse(raw: Option<&str>) -> Result<Self, DispatcherError> {
        raw.map(serde_qs::from_str)
            .transpose()
            .map_err(|e| DispatcherError::InvalidRequest(format!("invalid query: {e}")))
            .map(Option::unwrap_or_default)
    }
}

pub async fn list_events(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Vec<EventResponse>>, DispatcherError> {
    let query = EventListQuery::parse(raw_query.as_deref())?;
    let filter = EventFilter {
        status: query.status,
        tenant_id: query.tenant_id,
        exhausted: query.exhausted,
    };
    let page = PageRequest {
        per_page: query.per_page.unwrap_or(25),
        page: query.page.unwrap_or(1),
    };

    let max_retries = state.config.dispatch_max_retries;
    let usecase = ListEventsUseCase {
        repo: state.event_repo(),
        max_retries,
    };
    let events = usecase.execute(filter, page).await?;
    Ok(Json(
        events
            .into_iter()
            .map(|event| EventResponse::new(event, max_retries))
            .collect(),
    ))
}
