use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use leadops_domain::id::{EventId, ProjectId, TenantId};

use crate::config::SideEffectAllowList;
use crate::domain::repository::{AgentRunRepository, Clock, EventRepository, SideEffectPort};
use crate::domain::types::{
    AgentRun, EmitRequest, Event, MutationOp, NewEvent, RpcCall, RunReport, TableMutation,
    is_sql_identifier,
};
use crate::error::DispatcherError;

pub struct CallbackInput {
    pub event_id: EventId,
    pub tenant_id: Option<TenantId>,
    pub project_id: Option<ProjectId>,
    pub run: RunReport,
    pub rpc: Vec<RpcCall>,
    pub updates: Vec<TableMutation>,
    pub emit: Vec<EmitRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackOutcome {
    pub run_id: Uuid,
    pub rpc_results: Vec<Value>,
    pub emitted: Vec<EventId>,
}

/// Acknowledges a dispatched event and applies the follow-up work the
/// automation system reported: audit run, rpc calls, table mutations and
/// newly emitted events, strictly in that order.
///
/// Nothing is rolled back when a later step fails. Re-sending the whole
/// callback is safe as long as each rpc/update entry is re-appliable.
pub struct CallbackUseCase<E, A, X, C>
where
    E: EventRepository,
    A: AgentRunRepository,
    X: SideEffectPort,
    C: Clock,
{
    pub events: E,
    pub runs: A,
    pub effects: X,
    pub clock: C,
    pub allow_list: SideEffectAllowList,
}

impl<E, A, X, C> CallbackUseCase<E, A, X, C>
where
    E: EventRepository,
    A: AgentRunRepository,
    X: SideEffectPort,
    C: Clock,
{
    pub async fn execute(&self, input: CallbackInput) -> Result<CallbackOutcome, DispatcherError> {
        // Reject malformed side effects before anything is written.
        validate(&input, &self.allow_list)?;

        // 1. Resolve the referenced event (its scope is needed below)
        let event = self
            .events
            .find_by_id(input.event_id)
            .await
            .map_err(|e| DispatcherError::at_step("lookup", e))?
            .ok_or(DispatcherError::MissingReference(input.event_id))?;

        // 2. Ack (idempotent overwrite)
        let now = self.clock.now();
        self.events
            .mark_acked(event.id, now)
            .await
            .map_err(|e| DispatcherError::at_step("ack", e))?;

        // 3. Audit record; losing it fails the callback
        let run = build_run(&event, &input, now);
        self.runs
            .create(&run)
            .await
            .map_err(|e| DispatcherError::at_step("agent_run", e))?;

        // 4. RPC calls, in order, abort on first failure
        let mut rpc_results = Vec::with_capacity(input.rpc.len());
        for (i, call) in input.rpc.iter().enumerate() {
            let result = self
                .effects
                .call_rpc(call)
                .await
                .map_err(|e| DispatcherError::at_step(format!("rpc[{i}] {}", call.function), e))?;
            rpc_results.push(result);
        }

        // 5. Table mutations, same semantics
        for (i, mutation) in input.updates.iter().enumerate() {
            let affected = self.effects.apply_mutation(mutation).await.map_err(|e| {
                DispatcherError::at_step(format!("updates[{i}] {}", mutation.table), e)
            })?;
            debug!(table = %mutation.table, op = ?mutation.op, affected, "mutation applied");
        }

        // 6. Emit follow-up events
        let mut emitted = Vec::with_capacity(input.emit.len());
        for (i, request) in input.emit.into_iter().enumerate() {
            let step = format!("emit[{i}] {}", request.event_type);
            let follow_up = Event::create(
                NewEvent {
                    tenant_id: request.tenant_id.unwrap_or(event.tenant_id),
                    project_id: request.project_id.or(event.project_id),
                    event_type: request.event_type,
                    payload: request.payload,
                },
                self.clock.now(),
            );
            self.events
                .insert(&follow_up)
                .await
                .map_err(|e| DispatcherError::at_step(step, e))?;
            emitted.push(follow_up.id);
        }

        info!(
            event_id = %event.id,
            run_id = %run.id,
            rpc = rpc_results.len(),
            updates = input.updates.len(),
            emitted = emitted.len(),
            "callback processed"
        );
        Ok(CallbackOutcome {
            run_id: run.id,
            rpc_results,
            emitted,
        })
    }
}

fn build_run(event: &Event, input: &CallbackInput, now: chrono::DateTime<chrono::Utc>) -> AgentRun {
    let report = &input.run;
    AgentRun {
        id: Uuid::now_v7(),
        tenant_id: input.tenant_id.unwrap_or(event.tenant_id),
        project_id: input.project_id.or(event.project_id),
        agent_id: report.agent_id.clone(),
        event_id: event.id,
        event_type: event.event_type.clone(),
        input: report.input.clone(),
        output: report.output.clone(),
        status: report.status.clone(),
        started_at: report.started_at,
        finished_at: report.finished_at,
        error: report.error.clone(),
        created_at: now,
    }
}

/// Checks every rpc/update/emit entry against the allow-list and shape rules.
pub fn validate(input: &CallbackInput, allow: &SideEffectAllowList) -> Result<(), DispatcherError> {
    let reject = |msg: String| Err(DispatcherError::SideEffectRejected(msg));

    if input.run.status.trim().is_empty() {
        return Err(DispatcherError::InvalidRequest(
            "run.status must not be empty".to_owned(),
        ));
    }

    for (i, call) in input.rpc.iter().enumerate() {
        if !is_sql_identifier(&call.function) || !allow.allows_function(&call.function) {
            return reject(format!("rpc[{i}]: function not allowed: {}", call.function));
        }
        if let Some(arg) = call.args.keys().find(|k| !is_sql_identifier(k)) {
            return reject(format!("rpc[{i}]: invalid argument name: {arg}"));
        }
    }

    for (i, m) in input.updates.iter().enumerate() {
        if !is_sql_identifier(&m.table) || !allow.allows_table(&m.table) {
            return reject(format!("updates[{i}]: table not allowed: {}", m.table));
        }
        if let Some(col) = m
            .match_on
            .keys()
            .chain(m.data.keys())
            .find(|k| !is_sql_identifier(k))
        {
            return reject(format!("updates[{i}]: invalid column name: {col}"));
        }
        match m.op {
            MutationOp::Insert if m.match_on.is_empty() && m.data.is_empty() => {
                return reject(format!("updates[{i}]: insert needs data"));
            }
            MutationOp::Update if m.match_on.is_empty() => {
                return reject(format!("updates[{i}]: update needs a non-empty match"));
            }
            MutationOp::Update if m.data.is_empty() => {
                return reject(format!("updates[{i}]: update needs data"));
            }
            MutationOp::Upsert if m.match_on.is_empty() => {
                return reject(format!("updates[{i}]: upsert needs a non-empty match"));
            }
            _ => {}
        }
    }

    for (i, e) in input.emit.iter().enumerate() {
        if e.event_type.trim().is_empty() {
            return Err(DispatcherError::InvalidRequest(format!(
                "emit[{i}]: event_type must not be empty"
            )));
        }
    }
    Ok(())
}
