use leadops_domain::id::EventId;
use leadops_domain::pagination::PageRequest;

use crate::domain::repository::EventRepository;
use crate::domain::types::{Event, EventFilter};
use crate::error::DispatcherError;

// ── GetEvent ─────────────────────────────────────────────────────────────────

pub struct GetEventUseCase<R: EventRepository> {
    pub repo: R,
}

impl<R: EventRepository> GetEventUseCase<R> {
    pub async fn execute(&self, id: EventId) -> Result<Event, DispatcherError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DispatcherError::EventNotFound)
    }
}

// ── ListEvents ───────────────────────────────────────────────────────────────

pub struct ListEventsUseCase<R: EventRepository> {
    pub repo: R,
    pub max_retries: i32,
}

impl<R: EventRepository> ListEventsUseCase<R> {
    pub async fn execute(
        &self,
        filter: EventFilter,
        page: PageRequest,
    ) -> Result<Vec<Event>, DispatcherError> {
        self.repo
            .list(filter, self.max_retries, page.clamped())
            .await
    }
}
