use axum::extract::State;
use axum::http::StatusCode;

use leadops_core::error::AppError;

use crate::state::AppState;

/// `GET /readyz`: ready once the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    match state.db.ping().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            Err(AppError::ServiceUnavailable)
        }
    }
}
