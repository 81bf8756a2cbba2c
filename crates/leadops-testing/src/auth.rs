//! Shared-secret helpers for integration tests.
//!
//! Server-to-server routes expect an `x-webhook-secret` header. `MockSecret`
//! builds it so tests do not repeat header plumbing.

use axum::http::{HeaderName, HeaderValue};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Secret used by the service under test and by the requests sent to it.
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

pub struct MockSecret {
    pub secret: String,
}

impl MockSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_owned(),
        }
    }

    pub fn valid() -> Self {
        Self::new(TEST_WEBHOOK_SECRET)
    }

    pub fn header_name() -> HeaderName {
        HeaderName::from_static(WEBHOOK_SECRET_HEADER)
    }

    pub fn header_value(&self) -> HeaderValue {
        HeaderValue::from_str(&self.secret).unwrap()
    }
}
