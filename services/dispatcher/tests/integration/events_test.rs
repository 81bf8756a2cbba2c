use serde_json::json;
use uuid::Uuid;

use leadops_dispatcher::domain::types::{EventFilter, NewEvent};
use leadops_dispatcher::error::DispatcherError;
use leadops_dispatcher::usecase::emit::EmitEventUseCase;
use leadops_dispatcher::usecase::events::{GetEventUseCase, ListEventsUseCase};
use leadops_domain::event::EventStatus;
use leadops_domain::id::{EventId, TenantId};
use leadops_domain::pagination::PageRequest;

use crate::helpers::{InMemoryEvents, MAX_RETRIES, TestClock, event_created, t0, tenant};

fn lister(events: &InMemoryEvents) -> ListEventsUseCase<InMemoryEvents> {
    ListEventsUseCase {
        repo: events.clone(),
        max_retries: MAX_RETRIES,
    }
}

#[tokio::test]
async fn should_emit_event_visible_to_lookup() {
    let events = InMemoryEvents::default();
    let emit = EmitEventUseCase {
        events: events.clone(),
        clock: TestClock::at(t0()),
    };

    let created = emit
        .execute(NewEvent {
            tenant_id: tenant(),
            project_id: None,
            event_type: "lead.created".to_owned(),
            payload: json!({ "lead_id": 42 }),
        })
        .await
        .unwrap();

    let found = GetEventUseCase {
        repo: events.clone(),
    }
    .execute(created.id)
    .await
    .unwrap();
    assert_eq!(found, created);
    assert_eq!(found.status, EventStatus::New);
    assert_eq!(found.created_at, t0());
}

#[tokio::test]
async fn should_return_not_found_for_unknown_event() {
    let result = GetEventUseCase {
        repo: InMemoryEvents::default(),
    }
    .execute(EventId(Uuid::from_u128(1)))
    .await;

    assert!(
        matches!(result, Err(DispatcherError::EventNotFound)),
        "got {result:?}"
    );
}

#[tokio::test]
async fn should_list_newest_first() {
    let old = event_created("lead.created", 30);
    let new = event_created("lead.created", 1);
    let events = InMemoryEvents::with(vec![old.clone(), new.clone()]);

    let listed = lister(&events)
        .execute(EventFilter::default(), PageRequest::default())
        .await
        .unwrap();

    let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![new.id, old.id]);
}

#[tokio::test]
async fn should_list_only_exhausted_events() {
    let mut stuck = event_created("lead.created", 30);
    stuck.status = EventStatus::Failed;
    stuck.retry_count = MAX_RETRIES;
    let mut retrying = event_created("lead.created", 20);
    retrying.status = EventStatus::Failed;
    retrying.retry_count = 2;
    let fresh = event_created("lead.created", 10);
    let events = InMemoryEvents::with(vec![stuck.clone(), retrying.clone(), fresh]);

    let exhausted = lister(&events)
        .execute(
            EventFilter {
                exhausted: Some(true),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(exhausted.iter().map(|e| e.id).collect::<Vec<_>>(), vec![stuck.id]);

    let failed_but_retrying = lister(&events)
        .execute(
            EventFilter {
                status: Some(EventStatus::Failed),
                exhausted: Some(false),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        failed_but_retrying.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![retrying.id]
    );
}

#[tokio::test]
async fn should_filter_by_tenant_and_paginate() {
    let other = TenantId(Uuid::from_u128(0xbeef));
    let mut batch: Vec<_> = (0..5).map(|i| event_created("lead.created", 50 - i)).collect();
    batch[4].tenant_id = other;
    let events = InMemoryEvents::with(batch.clone());

    let second_page = lister(&events)
        .execute(
            EventFilter {
                tenant_id: Some(tenant()),
                ..Default::default()
            },
            PageRequest {
                per_page: 2,
                page: 2,
            },
        )
        .await
        .unwrap();

    // Tenant rows newest first: batch[3], batch[2], batch[1], batch[0].
    assert_eq!(
        second_page.iter().map(|e| e.id).collect::<Vec<_>>(),
        vec![batch[1].id, batch[0].id]
    );
}

#[tokio::test]
async fn should_clamp_page_request() {
    let events = InMemoryEvents::with(vec![event_created("lead.created", 1)]);

    let listed = lister(&events)
        .execute(
            EventFilter::default(),
            PageRequest {
                per_page: 0,
                page: 0,
            },
        )
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
}
