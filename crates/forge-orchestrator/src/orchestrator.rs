//! The turn loop
//!
//! Drives one session end to end: resume or create the persisted record,
//! invoke the reasoning collaborator, dispatch its tool calls in order,
//! persist after every call, derive phase events from the outcomes, and
//! stop at a terminal phase or an exhausted budget.

use std::sync::Arc;

use uuid::Uuid;

use forge_core::{
    ForgeError, HistoryEntry, Phase, Result, RetryPolicy, SessionRecord, TaskConfig,
};
use forge_session::Stores;
use forge_tools::{descriptors, Dispatcher, SessionState};

use crate::state_machine::{transition, PhaseEvent};
use crate::turn::{Reasoner, ReviewDecision, TurnContext, TurnDirective, UserGateway};

const DEFAULT_MAX_TURNS: u32 = 100;
/// History tail handed to the collaborator each turn
const RECENT_HISTORY: usize = 10;

/// Final outcome of a session run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Done {
        summary: String,
        /// Present when the session submitted a change
        commit_message: Option<String>,
    },
    Failed {
        reason: String,
    },
}

pub struct Orchestrator {
    dispatcher: Dispatcher,
    stores: Stores,
    reasoner: Arc<dyn Reasoner>,
    gateway: Arc<dyn UserGateway>,
    retry: RetryPolicy,
    max_turns: u32,
}

impl Orchestrator {
    pub fn new(
        dispatcher: Dispatcher,
        stores: Stores,
        reasoner: Arc<dyn Reasoner>,
        gateway: Arc<dyn UserGateway>,
    ) -> Self {
        Self {
            dispatcher,
            stores,
            reasoner,
            gateway,
            retry: RetryPolicy::default(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Run the session to a terminal phase
    pub async fn run(&self, task: &TaskConfig) -> Result<RunOutcome> {
        let mut record = match self.load_session(&task.session_id).await? {
            Some(existing) => {
                if existing.phase.is_terminal() {
                    return Err(ForgeError::Other(format!(
                        "Session '{}' already ended in {}",
                        existing.session_id, existing.phase
                    )));
                }
                tracing::info!(
                    session_id = %existing.session_id,
                    phase = %existing.phase,
                    "Resuming session"
                );
                existing
            }
            None => {
                tracing::info!(session_id = %task.session_id, "Starting new session");
                SessionRecord::new(&task.session_id, &task.user_id)
            }
        };
        let mut state = SessionState::restore(
            task.automation_mode,
            record.phase,
            record.plan.clone(),
            record.approval,
        );
        if let Err(err) = self.persist(&record).await {
            return self.fail(&mut record, &mut state, err.to_string()).await;
        }

        let mut last_results = Vec::new();
        let mut user_input: Option<String> = None;
        let mut submitted: Option<String> = None;
        let mut done_summary: Option<String> = None;

        for turn_number in 1..=self.max_turns {
            let ctx = self.build_context(
                task,
                &record,
                &state,
                std::mem::take(&mut last_results),
                user_input.take(),
            );
            let turn = match self.invoke_reasoner(&ctx).await {
                Ok(turn) => turn,
                Err(err) => {
                    return self
                        .fail(&mut record, &mut state, format!("Retry budget exhausted: {}", err))
                        .await;
                }
            };
            tracing::info!(
                turn = turn_number,
                turn_id = %Uuid::new_v4(),
                phase = %state.phase,
                calls = turn.calls.len(),
                "Turn received"
            );

            // Dispatch the batch in order, persisting after every call
            for call in &turn.calls {
                if state.phase.is_terminal() {
                    break;
                }
                let result = self.dispatcher.dispatch(&mut state, call).await;
                record.push_history(HistoryEntry::tool_call(state.phase, &result));
                sync_record(&mut record, &state);
                if let Err(err) = self.persist(&record).await {
                    return self.fail(&mut record, &mut state, err.to_string()).await;
                }
                last_results.push(result);
            }

            let signals = state.signals.take();
            for message in &signals.user_messages {
                if let Err(err) = self.gateway.notify(message).await {
                    tracing::warn!(error = %err, "User notification failed");
                }
            }

            let mut events = Vec::new();
            if signals.plan_proposed {
                events.push(PhaseEvent::PlanProposed);
            }

            let mut approved = signals.approval_recorded;
            if signals.review_requested && !approved {
                match self.review_plan(&state).await {
                    Ok(ReviewDecision::Approved) => {
                        state.gate.approve();
                        record.push_history(HistoryEntry::note(state.phase, "Plan approved in review"));
                        approved = true;
                    }
                    Ok(ReviewDecision::Rejected(reason)) => {
                        state.gate.reject(&reason);
                        record.push_history(HistoryEntry::note(
                            state.phase,
                            format!("Plan rejected: {}", reason),
                        ));
                        events.push(PhaseEvent::PlanRejected);
                    }
                    Err(err) => {
                        return self.fail(&mut record, &mut state, err.to_string()).await;
                    }
                }
                sync_record(&mut record, &state);
            }
            if approved {
                events.push(PhaseEvent::PlanApproved);
            }

            let all_complete = state.gate.plan().is_some_and(|p| p.all_complete());
            if signals.step_completed && all_complete {
                events.push(PhaseEvent::VerificationRequested);
            }

            match turn.directive {
                Some(TurnDirective::RequestVerification) if state.phase == Phase::Execute => {
                    if !events.contains(&PhaseEvent::VerificationRequested) {
                        events.push(PhaseEvent::VerificationRequested);
                    }
                }
                Some(TurnDirective::VerificationPassed) if state.phase == Phase::Verify => {
                    events.push(PhaseEvent::VerificationPassed);
                }
                Some(TurnDirective::VerificationFailed) if state.phase == Phase::Verify => {
                    if let Some(plan) = state.gate.plan_mut() {
                        plan.reopen_last_complete();
                    }
                    sync_record(&mut record, &state);
                    events.push(PhaseEvent::VerificationFailed);
                }
                Some(directive) => {
                    tracing::warn!(?directive, phase = %state.phase, "Directive ignored out of phase");
                }
                None => {}
            }

            if let Some(message) = signals.submitted {
                submitted = Some(message);
                events.push(PhaseEvent::Submitted);
            }
            if let Some(summary) = signals.done {
                done_summary = Some(summary);
                events.push(PhaseEvent::Finished);
            }

            if let Some(prompt) = signals.awaiting_user_input {
                match self.gateway.provide_input(&prompt).await {
                    Ok(answer) => {
                        record.push_history(HistoryEntry::note(
                            state.phase,
                            format!("User input received for: {}", prompt),
                        ));
                        user_input = Some(answer);
                    }
                    Err(err) => {
                        return self.fail(&mut record, &mut state, err.to_string()).await;
                    }
                }
            }

            for event in events {
                if state.phase.is_terminal() {
                    break;
                }
                match transition(state.phase, event) {
                    Ok(next) if next != state.phase => {
                        tracing::info!(from = %state.phase, to = %next, ?event, "Phase transition");
                        state.phase = next;
                        record.phase = next;
                        record.push_history(
                            HistoryEntry::note(next, format!("Entered phase {}", next)),
                        );
                        if let Err(err) = self.persist(&record).await {
                            return self.fail(&mut record, &mut state, err.to_string()).await;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        return self.fail(&mut record, &mut state, err.to_string()).await;
                    }
                }
            }

            if state.phase == Phase::Done {
                let summary = done_summary
                    .or_else(|| submitted.clone())
                    .unwrap_or_else(|| "Task complete".to_string());
                self.archive(&record).await;
                tracing::info!(session_id = %record.session_id, "Session done");
                return Ok(RunOutcome::Done {
                    summary,
                    commit_message: submitted,
                });
            }
            if state.phase == Phase::Failed {
                self.archive(&record).await;
                return Ok(RunOutcome::Failed {
                    reason: last_fault(&record),
                });
            }
        }

        let reason = format!("Turn budget of {} exhausted", self.max_turns);
        self.fail(&mut record, &mut state, reason).await
    }

    fn build_context(
        &self,
        task: &TaskConfig,
        record: &SessionRecord,
        state: &SessionState,
        last_results: Vec<forge_core::ToolResult>,
        user_input: Option<String>,
    ) -> TurnContext {
        let allowed_tools = descriptors()
            .iter()
            .filter(|d| d.phases.contains(&state.phase))
            .map(|d| d.name.as_str())
            .collect();
        let start = record.history.len().saturating_sub(RECENT_HISTORY);
        TurnContext {
            session_id: record.session_id.clone(),
            task: task.task.clone(),
            phase: state.phase,
            approval: state.gate.approval(),
            plan: state.gate.plan().cloned(),
            allowed_tools,
            recent_history: record.history[start..].to_vec(),
            last_results,
            user_input,
        }
    }

    async fn review_plan(&self, state: &SessionState) -> Result<ReviewDecision> {
        let plan = state
            .gate
            .plan()
            .cloned()
            .ok_or_else(|| ForgeError::Other("Review requested without a plan".to_string()))?;
        self.gateway.review_plan(&plan).await
    }

    async fn invoke_reasoner(&self, ctx: &TurnContext) -> Result<crate::turn::ReasonerTurn> {
        let mut attempts = 0u32;
        loop {
            match self.reasoner.next_turn(ctx).await {
                Ok(turn) => return Ok(turn),
                Err(err) if err.is_transient() && self.retry.allows_retry(attempts + 1) => {
                    attempts += 1;
                    let backoff = self.retry.backoff_for(attempts);
                    tracing::warn!(
                        attempt = attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "Reasoner unavailable, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut attempts = 0u32;
        loop {
            match self.stores.sessions.load(session_id).await {
                Ok(record) => return Ok(record),
                Err(err) if err.is_transient() && self.retry.allows_retry(attempts + 1) => {
                    attempts += 1;
                    tokio::time::sleep(self.retry.backoff_for(attempts)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn persist(&self, record: &SessionRecord) -> Result<()> {
        let mut attempts = 0u32;
        loop {
            match self.stores.sessions.save(record).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && self.retry.allows_retry(attempts + 1) => {
                    attempts += 1;
                    let backoff = self.retry.backoff_for(attempts);
                    tracing::warn!(
                        attempt = attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %err,
                        "Persistence unavailable, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn archive(&self, record: &SessionRecord) {
        if let Err(err) = self.stores.sessions.archive(&record.session_id).await {
            tracing::warn!(error = %err, session_id = %record.session_id, "Archive failed");
        }
    }

    /// Force the session into the failed phase, persist best-effort, archive
    async fn fail(
        &self,
        record: &mut SessionRecord,
        state: &mut SessionState,
        reason: String,
    ) -> Result<RunOutcome> {
        tracing::error!(reason = %reason, session_id = %record.session_id, "Session failed");
        state.phase = transition(state.phase, PhaseEvent::Fatal).unwrap_or(Phase::Failed);
        record.phase = Phase::Failed;
        record.push_history(HistoryEntry::note(Phase::Failed, reason.clone()));
        if let Err(err) = self.persist(record).await {
            tracing::error!(error = %err, "Could not persist failure record");
        }
        self.archive(record).await;
        Ok(RunOutcome::Failed { reason })
    }
}

/// Mirror gate-owned state into the persisted record
fn sync_record(record: &mut SessionRecord, state: &SessionState) {
    record.plan = state.gate.plan().cloned();
    record.approval = state.gate.approval();
}

/// Most recent failure detail from the audit history
fn last_fault(record: &SessionRecord) -> String {
    record
        .history
        .iter()
        .rev()
        .find(|entry| !entry.ok)
        .map(|entry| entry.detail.clone())
        .unwrap_or_else(|| "Unrecoverable error".to_string())
}
