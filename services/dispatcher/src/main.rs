use std::sync::Arc;
use std::time::Duration;

use sea_orm::Database;
use tracing::{info, warn};

use leadops_core::config::Config as _;
use leadops_core::tracing::init_tracing;
use leadops_dispatcher::config::DispatcherConfig;
use leadops_dispatcher::router::build_router;
use leadops_dispatcher::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = DispatcherConfig::from_env();
    if config.webhook_secret().is_none() {
        warn!("WEBHOOK_SECRET is not set; every authenticated route will answer 401");
    }
    if let Err(e) = config.sink_target() {
        warn!(error = %e, "automation endpoint not configured; /dispatch will fail");
    }

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build HTTP client");

    let addr = format!("0.0.0.0:{}", config.dispatcher_port);
    let state = AppState {
        db,
        http,
        config: Arc::new(config),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("dispatcher listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
