use axum::{Json, extract::State};
use serde::Serialize;

use crate::auth::WebhookAuth;
use crate::domain::types::DispatchResult;
use crate::error::DispatcherError;
use crate::infra::sink::HttpEventSink;
use crate::state::AppState;
use crate::usecase::dispatch::DispatchUseCase;

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub ok: bool,
    pub processed: usize,
    pub results: Vec<DispatchResult>,
}

// ── POST /dispatch ───────────────────────────────────────────────────────────

pub async fn dispatch(
    _auth: WebhookAuth,
    State(state): State<AppState>,
) -> Result<Json<DispatchResponse>, DispatcherError> {
    // Nothing can be delivered without an endpoint; fail before touching the store.
    let target = state.config.sink_target()?;
    let usecase = DispatchUseCase {
        events: state.event_repo(),
        sink: HttpEventSink::new(state.http.clone(), &target),
        clock: state.clock(),
        settings: state.config.dispatch_settings(),
        app_name: target.app_name,
    };
    let report = usecase.execute().await?;
    Ok(Json(DispatchResponse {
        ok: true,
        processed: report.processed,
        results: report.results,
    }))
}
