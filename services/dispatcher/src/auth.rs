//! Shared-secret authentication for server-to-server routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use leadops_core::error::AppError;

use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Proof that the request carried the configured `x-webhook-secret`.
///
/// Rejects with 401 when the header is absent, differs from the secret, or
/// no secret is configured at all.
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth;

impl FromRequestParts<AppState> for WebhookAuth {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let presented = parts
            .headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        let authorized = match (state.config.webhook_secret(), presented) {
            (Some(expected), Some(presented)) => secrets_match(expected, presented),
            _ => false,
        };

        async move {
            if authorized {
                Ok(WebhookAuth)
            } else {
                tracing::warn!("rejected request with missing or invalid webhook secret");
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn secrets_match(expected: &str, presented: &str) -> bool {
    let (a, b) = (expected.as_bytes(), presented.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
