use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use leadops_core::error::error_response;
use leadops_domain::id::EventId;

/// Dispatcher service error variants.
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("event not found")]
    EventNotFound,
    #[error("missing reference: event {0} not found")]
    MissingReference(EventId),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("side effect rejected: {0}")]
    SideEffectRejected(String),
    #[error("{step} failed: {message}")]
    CallbackStep { step: String, message: String },
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl DispatcherError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::MissingReference(_) => "MISSING_REFERENCE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::SideEffectRejected(_) => "SIDE_EFFECT_REJECTED",
            Self::CallbackStep { .. } => "CALLBACK_STEP_FAILED",
            Self::MissingConfig(_) => "MISSING_CONFIG",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Wrap an error raised while executing one callback step, keeping the
    /// full message so the caller can tell which step broke.
    pub fn at_step(step: impl Into<String>, err: DispatcherError) -> Self {
        let message = match &err {
            Self::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        };
        Self::CallbackStep {
            step: step.into(),
            message,
        }
    }
}

impl IntoResponse for DispatcherError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::EventNotFound => StatusCode::NOT_FOUND,
            Self::MissingReference(_)
            | Self::InvalidRequest(_)
            | Self::SideEffectRejected(_)
            | Self::CallbackStep { .. } => StatusCode::BAD_REQUEST,
            Self::MissingConfig(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        match &self {
            Self::Internal(e) => tracing::error!(error = %e, kind = "INTERNAL", "internal error"),
            Self::MissingConfig(name) => {
                tracing::error!(setting = %name, kind = "MISSING_CONFIG", "dispatcher misconfigured")
            }
            _ => {}
        }
        error_response(status, self.kind(), &self.to_string())
    }
}

/// Why one delivery attempt to the automation endpoint failed.
/// The `Display` text is what lands in `events.last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("endpoint responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}
