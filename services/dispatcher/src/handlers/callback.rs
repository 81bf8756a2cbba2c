use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use leadops_domain::id::{EventId, ProjectId, TenantId};

use crate::auth::WebhookAuth;
use crate::domain::types::{EmitRequest, RpcCall, RunReport, TableMutation};
use crate::error::DispatcherError;
use crate::state::AppState;
use crate::usecase::callback::{CallbackInput, CallbackUseCase};

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub event_id: EventId,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub run: RunReport,
    #[serde(default)]
    pub rpc: Vec<RpcCall>,
    #[serde(default)]
    pub updates: Vec<TableMutation>,
    #[serde(default)]
    pub emit: Vec<EmitRequest>,
}

impl From<CallbackRequest> for CallbackInput {
    fn from(req: CallbackRequest) -> Self {
        Self {
            event_id: req.event_id,
            tenant_id: req.tenant_id,
            project_id: req.project_id,
            run: req.run,
            rpc: req.rpc,
            updates: req.updates,
            emit: req.emit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub ok: bool,
    pub run_id: Uuid,
    pub rpc_results: Vec<Value>,
    pub emitted: Vec<EventId>,
}

// ── POST /callback ───────────────────────────────────────────────────────────

pub async fn callback(
    _auth: WebhookAuth,
    State(state): State<AppState>,
    body: Result<Json<CallbackRequest>, JsonRejection>,
) -> Result<Json<CallbackResponse>, DispatcherError> {
    let Json(body) = body.map_err(|e| DispatcherError::InvalidRequest(e.body_text()))?;
    let usecase = CallbackUseCase {
        events: state.event_repo(),
        runs: state.agent_run_repo(),
        effects: state.side_effects(),
        clock: state.clock(),
        allow_list: state.config.allow_list(),
    };
    let outcome = usecase.execute(body.into()).await?;
    Ok(Json(CallbackResponse {
        ok: true,
        run_id: outcome.run_id,
        rpc_results: outcome.rpc_results,
        emitted: outcome.emitted,
    }))
}
