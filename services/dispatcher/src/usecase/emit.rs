use tracing::info;

use crate::domain::repository::{Clock, EventRepository};
use crate::domain::types::{Event, NewEvent};
use crate::error::DispatcherError;

/// Records a new outbox event on behalf of an internal producer.
pub struct EmitEventUseCase<R: EventRepository, C: Clock> {
    pub events: R,
    pub clock: C,
}

impl<R: EventRepository, C: Clock> EmitEventUseCase<R, C> {
    pub async fn execute(&self, draft: NewEvent) -> Result<Event, DispatcherError> {
        if draft.event_type.trim().is_empty() {
            return Err(DispatcherError::InvalidRequest(
                "event_type must not be empty".to_owned(),
            ));
        }
        let event = Event::create(draft, self.clock.now());
        self.events.insert(&event).await?;
        info!(event_id = %event.id, event_type = %event.event_type, "event recorded");
        Ok(event)
    }
}
