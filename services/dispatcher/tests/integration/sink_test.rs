use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::Value;

use leadops_dispatcher::config::SinkTarget;
use leadops_dispatcher::domain::repository::EventSink;
use leadops_dispatcher::domain::types::Envelope;
use leadops_dispatcher::error::DeliveryError;
use leadops_dispatcher::infra::sink::{DELIVERY_SECRET_HEADER, HttpEventSink};

use crate::helpers::event_created;

#[derive(Clone)]
struct Endpoint {
    received: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    status: StatusCode,
    delay: Duration,
}

async fn receive(
    State(endpoint): State<Endpoint>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    tokio::time::sleep(endpoint.delay).await;
    let secret = headers
        .get(DELIVERY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    endpoint.received.lock().unwrap().push((secret, body));
    (endpoint.status, "upstream down")
}

/// Serves `POST /hooks/events` on an ephemeral loopback port; returns the base URL.
async fn spawn_endpoint(endpoint: Endpoint) -> String {
    let app = Router::new()
        .route("/hooks/events", post(receive))
        .with_state(endpoint);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/hooks")
}

fn endpoint(status: StatusCode, delay: Duration) -> Endpoint {
    Endpoint {
        received: Arc::new(Mutex::new(vec![])),
        status,
        delay,
    }
}

fn sink(base_url: String, timeout: Duration) -> HttpEventSink {
    HttpEventSink::new(
        reqwest::Client::new(),
        &SinkTarget {
            base_url,
            secret: "outbound-secret".to_owned(),
            app_name: "leadops".to_owned(),
            timeout,
        },
    )
}

fn envelope() -> Envelope {
    Envelope::for_event(&event_created("lead.created", 1), "leadops")
}

#[tokio::test]
async fn should_post_envelope_with_secret_header() {
    let ep = endpoint(StatusCode::OK, Duration::ZERO);
    let received = Arc::clone(&ep.received);
    let base = spawn_endpoint(ep).await;
    let envelope = envelope();

    sink(base, Duration::from_secs(5))
        .deliver(&envelope)
        .await
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (secret, body) = &received[0];
    assert_eq!(secret.as_deref(), Some("outbound-secret"));
    assert_eq!(body["event_id"], envelope.event_id.to_string());
    assert_eq!(body["app_name"], "leadops");
    assert_eq!(body["event_type"], "lead.created");
    assert_eq!(body["tenant_id"], envelope.tenant_id.to_string());
    assert!(body["project_id"].is_null());
    assert!(body["created_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(body["payload"], envelope.payload);
}

#[tokio::test]
async fn should_report_non_success_status_with_body() {
    let base = spawn_endpoint(endpoint(StatusCode::BAD_GATEWAY, Duration::ZERO)).await;

    let err = sink(base, Duration::from_secs(5))
        .deliver(&envelope())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DeliveryError::Status {
            status: 502,
            body: "upstream down".to_owned(),
        }
    );
}

#[tokio::test]
async fn should_time_out_slow_endpoint() {
    let base = spawn_endpoint(endpoint(StatusCode::OK, Duration::from_secs(5))).await;

    let err = sink(base, Duration::from_millis(200))
        .deliver(&envelope())
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::Timeout);
}

#[tokio::test]
async fn should_report_transport_error_when_unreachable() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = sink(format!("http://{addr}"), Duration::from_secs(5))
        .deliver(&envelope())
        .await
        .unwrap_err();

    match &err {
        DeliveryError::Transport(message) => {
            assert!(
                message.to_lowercase().contains("refused"),
                "cause missing from {message}"
            );
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}
