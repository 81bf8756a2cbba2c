use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::DispatcherConfig;
use crate::infra::clock::SystemClock;
use crate::infra::db::{DbAgentRunRepository, DbEventRepository, DbSideEffects};

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub http: reqwest::Client,
    pub config: Arc<DispatcherConfig>,
}

impl AppState {
    pub fn event_repo(&self) -> DbEventRepository {
        DbEventRepository {
            db: self.db.clone(),
        }
    }

    pub fn agent_run_repo(&self) -> DbAgentRunRepository {
        DbAgentRunRepository {
            db: self.db.clone(),
        }
    }

    pub fn side_effects(&self) -> DbSideEffects {
        DbSideEffects {
            db: self.db.clone(),
        }
    }

    pub fn clock(&self) -> SystemClock {
        SystemClock
    }
}
