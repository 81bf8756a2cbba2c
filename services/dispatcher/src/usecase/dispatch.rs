use tracing::{debug, info, warn};

use leadops_domain::event::EventStatus;

use crate::config::DispatchSettings;
use crate::domain::repository::{Clock, EventRepository, EventSink};
use crate::domain::types::{
    DispatchOutcome, DispatchReport, DispatchResult, Envelope, Event, SkipReason,
};
use crate::error::DispatcherError;

/// One dispatcher batch: select deliverable events oldest-first and POST them
/// one at a time. A failing event never aborts the rest of the batch.
pub struct DispatchUseCase<R, S, C>
where
    R: EventRepository,
    S: EventSink,
    C: Clock,
{
    pub events: R,
    pub sink: S,
    pub clock: C,
    pub settings: DispatchSettings,
    pub app_name: String,
}

impl<R, S, C> DispatchUseCase<R, S, C>
where
    R: EventRepository,
    S: EventSink,
    C: Clock,
{
    pub async fn execute(&self) -> Result<DispatchReport, DispatcherError> {
        let batch = self
            .events
            .list_dispatchable(self.settings.batch_size, self.settings.max_retries)
            .await?;

        let mut report = DispatchReport {
            processed: batch.len(),
            results: Vec::with_capacity(batch.len()),
        };
        for event in &batch {
            let outcome = self.dispatch_one(event).await;
            report.results.push(DispatchResult {
                id: event.id,
                outcome,
            });
        }

        info!(
            processed = report.processed,
            sent = report.count(|o| matches!(o, DispatchOutcome::Sent)),
            skipped = report.count(|o| matches!(o, DispatchOutcome::Skipped { .. })),
            errors = report.count(|o| matches!(o, DispatchOutcome::Error { .. })),
            "dispatch batch finished"
        );
        Ok(report)
    }

    async fn dispatch_one(&self, event: &Event) -> DispatchOutcome {
        if let Some(reason) = self.skip_reason(event) {
            debug!(event_id = %event.id, ?reason, "skipping event");
            return DispatchOutcome::Skipped { reason };
        }

        let envelope = Envelope::for_event(event, &self.app_name);
        let delivery = self.sink.deliver(&envelope).await;
        let attempted_at = self.clock.now();

        match delivery {
            Ok(()) => match self.events.mark_sent(event.id, attempted_at).await {
                Ok(()) => {
                    info!(event_id = %event.id, event_type = %event.event_type, "event sent");
                    DispatchOutcome::Sent
                }
                Err(e) => record_error(event, "mark sent", e),
            },
            Err(delivery_err) => {
                let message = delivery_err.to_string();
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    retry_count = event.retry_count + 1,
                    error = %message,
                    "event delivery failed"
                );
                match self
                    .events
                    .mark_failed(event.id, &message, attempted_at)
                    .await
                {
                    Ok(()) => DispatchOutcome::Error { error: message },
                    Err(e) => record_error(event, "mark failed", e),
                }
            }
        }
    }

    fn skip_reason(&self, event: &Event) -> Option<SkipReason> {
        if event.is_exhausted(self.settings.max_retries) {
            return Some(SkipReason::MaxRetriesReached);
        }
        if event.status == EventStatus::Failed {
            // A failed event without sent_at has never been attempted; let it through.
            if let Some(last_attempt) = event.sent_at {
                let now = self.clock.now();
                if self
                    .settings
                    .backoff
                    .in_window(event.retry_count, last_attempt, now)
                {
                    return Some(SkipReason::Backoff);
                }
            }
        }
        None
    }
}

fn record_error(event: &Event, step: &str, err: DispatcherError) -> DispatchOutcome {
    let message = match &err {
        DispatcherError::Internal(e) => format!("{step}: {e:#}"),
        other => format!("{step}: {other}"),
    };
    tracing::error!(event_id = %event.id, error = %message, "failed to record delivery outcome");
    DispatchOutcome::Error { error: message }
}
