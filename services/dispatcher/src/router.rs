use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use leadops_core::error::AppError;
use leadops_core::health::healthz;
use leadops_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    callback::callback,
    dispatch::dispatch,
    events::{create_event, get_event, list_events},
    health::readyz,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Dispatcher (scheduler-triggered)
        .route("/dispatch", post(dispatch))
        // Callback receiver
        .route("/callback", post(callback))
        // Event emission & inspection
        .route("/events", post(create_event).get(list_events))
        .route("/events/{id}", get(get_event))
        .fallback(|| async { AppError::NotFound })
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_request_id_layer()),
        )
        .with_state(state)
}
