use std::collections::HashSet;

use chrono::Duration;
use serde_json::{Value, json};
use uuid::Uuid;

use leadops_dispatcher::domain::types::{
    DispatchOutcome, EmitRequest, MutationOp, RpcCall, RunReport, TableMutation,
};
use leadops_dispatcher::error::DispatcherError;
use leadops_dispatcher::usecase::callback::CallbackInput;
use leadops_domain::event::EventStatus;
use leadops_domain::id::{EventId, ProjectId, TenantId};

use crate::helpers::{
    InMemoryEvents, InMemoryRuns, RecordingEffects, ScriptedSink, TestClock, dispatcher,
    event_created, receiver, t0, tenant,
};

fn completed_run() -> RunReport {
    RunReport {
        agent_id: Some("qualifier".to_owned()),
        status: "completed".to_owned(),
        input: json!({ "lead_id": 42 }),
        output: json!({ "score": 87 }),
        started_at: Some(t0()),
        finished_at: Some(t0() + Duration::seconds(3)),
        error: None,
    }
}

fn callback_for(event_id: EventId) -> CallbackInput {
    CallbackInput {
        event_id,
        tenant_id: None,
        project_id: None,
        run: completed_run(),
        rpc: vec![],
        updates: vec![],
        emit: vec![],
    }
}

fn rpc(function: &str) -> RpcCall {
    serde_json::from_value(json!({ "fn": function, "args": { "lead_id": 42 } })).unwrap()
}

fn emit(event_type: &str) -> EmitRequest {
    EmitRequest {
        tenant_id: None,
        project_id: None,
        event_type: event_type.to_owned(),
        payload: json!({ "from": "callback" }),
    }
}

fn update_lead(stage: &str) -> TableMutation {
    TableMutation {
        table: "leads".to_owned(),
        op: MutationOp::Update,
        match_on: json!({ "id": 42 }).as_object().cloned().unwrap(),
        data: json!({ "stage": stage }).as_object().cloned().unwrap(),
    }
}

#[tokio::test]
async fn should_ack_event_and_record_agent_run() {
    let mut event = event_created("lead.created", 5);
    event.status = EventStatus::Sent;
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());

    let outcome = receiver(&events, &runs, &effects, &clock)
        .execute(callback_for(event.id))
        .await
        .unwrap();

    let acked = events.get(event.id);
    assert_eq!(acked.status, EventStatus::Acked);
    assert_eq!(acked.acked_at, Some(t0()));

    let stored = runs.all();
    assert_eq!(stored.len(), 1);
    let run = &stored[0];
    assert_eq!(run.id, outcome.run_id);
    assert_eq!(run.event_id, event.id);
    assert_eq!(run.event_type, "lead.created");
    assert_eq!(run.tenant_id, event.tenant_id);
    assert_eq!(run.agent_id.as_deref(), Some("qualifier"));
    assert_eq!(run.status, "completed");
    assert_eq!(run.output, json!({ "score": 87 }));
    assert!(outcome.rpc_results.is_empty());
    assert!(outcome.emitted.is_empty());
}

#[tokio::test]
async fn should_ack_idempotently_and_append_runs() {
    let event = event_created("lead.created", 5);
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());
    let uc = receiver(&events, &runs, &effects, &clock);

    uc.execute(callback_for(event.id)).await.unwrap();
    clock.advance(Duration::minutes(2));
    uc.execute(callback_for(event.id)).await.unwrap();

    let acked = events.get(event.id);
    assert_eq!(acked.status, EventStatus::Acked);
    assert_eq!(acked.acked_at, Some(t0() + Duration::minutes(2)));
    assert_eq!(acked.retry_count, event.retry_count);
    assert_eq!(runs.all().len(), 2);
}

#[tokio::test]
async fn should_emit_new_events_in_parent_scope() {
    let mut event = event_created("lead.created", 5);
    event.project_id = Some(ProjectId(Uuid::from_u128(0x9)));
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());

    let other_tenant = TenantId(Uuid::from_u128(0xbeef));
    let mut input = callback_for(event.id);
    input.emit = vec![
        emit("lead.qualified"),
        emit("task.created"),
        EmitRequest {
            tenant_id: Some(other_tenant),
            ..emit("audit.logged")
        },
    ];

    let outcome = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await
        .unwrap();

    assert_eq!(outcome.emitted.len(), 3);
    let distinct: HashSet<_> = outcome.emitted.iter().copied().collect();
    assert_eq!(distinct.len(), 3);
    assert!(!distinct.contains(&event.id));

    let emitted: Vec<_> = outcome.emitted.iter().map(|id| events.get(*id)).collect();
    for child in &emitted {
        assert_eq!(child.status, EventStatus::New);
        assert_eq!(child.retry_count, 0);
        assert_eq!(child.project_id, event.project_id);
        assert_eq!(child.created_at, t0());
    }
    assert_eq!(emitted[0].event_type, "lead.qualified");
    assert_eq!(emitted[0].tenant_id, tenant());
    assert_eq!(emitted[1].event_type, "task.created");
    assert_eq!(emitted[2].tenant_id, other_tenant);
}

#[tokio::test]
async fn should_collect_rpc_results_in_order() {
    let event = event_created("lead.created", 5);
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());

    let mut input = callback_for(event.id);
    input.rpc = vec![rpc("bump_score"), rpc("assign_owner")];
    input.updates = vec![update_lead("qualified")];

    let outcome = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await
        .unwrap();

    assert_eq!(effects.calls(), vec!["bump_score", "assign_owner"]);
    assert_eq!(outcome.rpc_results.len(), 2);
    assert_eq!(outcome.rpc_results[0][0]["fn"], "bump_score");
    assert_eq!(outcome.rpc_results[1][0]["fn"], "assign_owner");
    assert_eq!(effects.mutations(), vec![update_lead("qualified")]);
}

#[tokio::test]
async fn should_reject_unknown_event_without_side_effects() {
    let events = InMemoryEvents::default();
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());
    let missing = EventId(Uuid::from_u128(0xdead));

    let mut input = callback_for(missing);
    input.rpc = vec![rpc("bump_score")];
    input.emit = vec![emit("lead.qualified")];

    let result = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await;

    assert!(
        matches!(result, Err(DispatcherError::MissingReference(id)) if id == missing),
        "expected MissingReference, got {result:?}"
    );
    assert!(runs.all().is_empty());
    assert!(effects.calls().is_empty());
    assert!(events.all().is_empty());
}

#[tokio::test]
async fn should_abort_at_failing_rpc_and_keep_earlier_steps() {
    let event = event_created("lead.created", 5);
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::failing_on("notify_owner");
    let clock = TestClock::at(t0());

    let mut input = callback_for(event.id);
    input.rpc = vec![rpc("bump_score"), rpc("notify_owner"), rpc("assign_owner")];
    input.updates = vec![update_lead("contacted")];
    input.emit = vec![emit("lead.qualified")];

    let result = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await;

    match result {
        Err(DispatcherError::CallbackStep { step, message }) => {
            assert_eq!(step, "rpc[1] notify_owner");
            assert_eq!(message, "call notify_owner: function raised an exception");
        }
        other => panic!("expected CallbackStep, got {other:?}"),
    }
    // Steps before the failure stay applied.
    assert_eq!(events.get(event.id).status, EventStatus::Acked);
    assert_eq!(runs.all().len(), 1);
    // Nothing after it runs.
    assert_eq!(effects.calls(), vec!["bump_score", "notify_owner"]);
    assert!(effects.mutations().is_empty());
    assert_eq!(events.all().len(), 1);
}

#[tokio::test]
async fn should_fail_callback_when_agent_run_cannot_be_written() {
    let event = event_created("lead.created", 5);
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::failing();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());

    let mut input = callback_for(event.id);
    input.rpc = vec![rpc("bump_score")];

    let result = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await;

    assert!(
        matches!(&result, Err(DispatcherError::CallbackStep { step, .. }) if step == "agent_run"),
        "expected agent_run step failure, got {result:?}"
    );
    assert!(effects.calls().is_empty());
}

#[tokio::test]
async fn should_validate_whole_body_before_acking() {
    let mut event = event_created("lead.created", 5);
    event.status = EventStatus::Sent;
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let clock = TestClock::at(t0());

    let mut input = callback_for(event.id);
    input.rpc = vec![rpc("bump_score")];
    input.updates = vec![TableMutation {
        table: "events".to_owned(),
        ..update_lead("won")
    }];

    let result = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await;

    assert!(
        matches!(&result, Err(DispatcherError::SideEffectRejected(msg)) if msg == "updates[0]: table not allowed: events"),
        "got {result:?}"
    );
    assert_eq!(events.get(event.id).status, EventStatus::Sent);
    assert!(runs.all().is_empty());
    assert!(effects.calls().is_empty());
}

#[tokio::test]
async fn should_close_the_loop_from_dispatch_to_follow_up_dispatch() {
    let event = event_created("strategy.approved", 5);
    let events = InMemoryEvents::with(vec![event.clone()]);
    let runs = InMemoryRuns::default();
    let effects = RecordingEffects::default();
    let sink = ScriptedSink::default();
    let clock = TestClock::at(t0());

    // 1. Deliver the original event.
    let report = dispatcher(&events, &sink, &clock).execute().await.unwrap();
    assert_eq!(report.results[0].outcome, DispatchOutcome::Sent);

    // 2. The automation system calls back and asks for two follow-ups.
    clock.advance(Duration::seconds(30));
    let mut input = callback_for(event.id);
    input.emit = vec![emit("campaign.created"), emit("task.created")];
    let outcome = receiver(&events, &runs, &effects, &clock)
        .execute(input)
        .await
        .unwrap();
    assert_eq!(events.get(event.id).status, EventStatus::Acked);

    // 3. The next batch delivers exactly the follow-ups.
    clock.advance(Duration::minutes(1));
    let report = dispatcher(&events, &sink, &clock).execute().await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(sink.delivered_ids()[1..], outcome.emitted[..]);
    let payloads: Vec<Value> = sink
        .delivered
        .lock()
        .unwrap()
        .iter()
        .skip(1)
        .map(|e| e.payload.clone())
        .collect();
    assert_eq!(payloads, vec![json!({ "from": "callback" }); 2]);
}
