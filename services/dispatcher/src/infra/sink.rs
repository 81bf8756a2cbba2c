use reqwest::Client;

use crate::config::SinkTarget;
use crate::domain::repository::EventSink;
use crate::domain::types::Envelope;
use crate::error::DeliveryError;

/// Header the automation endpoint authenticates deliveries with.
pub const DELIVERY_SECRET_HEADER: &str = "x-webhook-secret";

/// Upper bound on the response body copied into `last_error`.
const MAX_ERROR_BODY: usize = 512;

/// POSTs envelopes to `{base_url}/events`.
#[derive(Clone)]
pub struct HttpEventSink {
    client: Client,
    url: String,
    secret: String,
    timeout: std::time::Duration,
}

impl HttpEventSink {
    pub fn new(client: Client, target: &SinkTarget) -> Self {
        Self {
            client,
            url: format!("{}/events", target.base_url),
            secret: target.secret.clone(),
            timeout: target.timeout,
        }
    }
}

impl EventSink for HttpEventSink {
    async fn deliver(&self, envelope: &Envelope) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .header(DELIVERY_SECRET_HEADER, &self.secret)
            .timeout(self.timeout)
            .json(envelope)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body: truncate(body.trim(), MAX_ERROR_BODY),
        })
    }
}

fn classify(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        // Full cause chain, e.g. "... tcp connect error: Connection refused".
        DeliveryError::Transport(format!("{:#}", anyhow::Error::from(err.without_url())))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
