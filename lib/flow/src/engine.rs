//! The flow engine: loads flow definitions and moves leads through them.
//!
//! Interpretation starts at one of the entry points ([`FlowEngine::create_lead`],
//! [`FlowEngine::on_reply`], [`FlowEngine::on_external_status_change`]) and
//! recurses through `goto` and `change_status` within the same call. Each
//! interpretation runs under the lead's lock and is capped at
//! [`EngineConfig::max_hops`] step transitions.
//!
//! Lookup misses are logged and treated as no-ops. Storage failures are
//! logged; the in-memory lead keeps advancing regardless.

use crate::config::EngineConfig;
use crate::definition::FlowDefinition;
use crate::error::{FlowError, InterpretError};
use crate::instruction::Instruction;
use crate::locks::LeadLocks;
use chatflow_conversation::event::{AWAIT_REPLY, SEND_OPTIONS, SEND_TEXT};
use chatflow_conversation::{
    AppEvent, AwaitReply, ExternalUser, FlowId, Lead, LeadCreated, LeadRepository, LeadReplied,
    LeadStatusChanged, SendOptions, SendText, StepId, StepKind, User, UserRepository,
};
use chatflow_mediator::{Dispatcher, EventName};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

type Interpretation<'a> = BoxFuture<'a, Result<(), InterpretError>>;

/// Step transitions taken by one interpretation.
struct Hops {
    taken: usize,
    limit: usize,
}

impl Hops {
    fn new(limit: usize) -> Self {
        Self { taken: 0, limit }
    }

    fn advance(&mut self, lead: &Lead) -> Result<(), InterpretError> {
        self.taken += 1;
        if self.taken > self.limit {
            return Err(InterpretError::HopLimitExceeded {
                lead: lead.id,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Interprets flow definitions for leads.
pub struct FlowEngine<R> {
    config: EngineConfig,
    flows: RwLock<HashMap<FlowId, Arc<FlowDefinition>>>,
    repository: Arc<R>,
    dispatcher: Arc<Dispatcher<AppEvent>>,
    locks: LeadLocks,
}

impl<R> FlowEngine<R>
where
    R: UserRepository + LeadRepository,
{
    /// Creates an engine with no flows loaded.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        repository: Arc<R>,
        dispatcher: Arc<Dispatcher<AppEvent>>,
    ) -> Self {
        Self {
            config,
            flows: RwLock::new(HashMap::new()),
            repository,
            dispatcher,
            locks: LeadLocks::new(),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses `raw` and installs it as the definition of `flow`.
    ///
    /// The previous definition stays in place unless parsing succeeds.
    /// Interpretations already running keep the definition they started with.
    ///
    /// # Errors
    ///
    /// Returns `EmptyConfig` or `ConfigParse` if `raw` is not a flow document.
    pub fn load_flow(&self, flow: FlowId, raw: &str) -> chatflow_core::Result<(), FlowError> {
        let definition = FlowDefinition::parse(&flow, raw)?;
        info!(flow = %flow, steps = definition.len(), "flow loaded");
        self.write_flows().insert(flow, Arc::new(definition));
        Ok(())
    }

    /// Loads an uploaded flow configuration, logging instead of failing.
    pub fn add_config(&self, flow: FlowId, raw: &str) {
        if raw.trim().is_empty() {
            error!(flow = %flow, "flow configuration is empty");
            return;
        }
        if let Err(report) = self.load_flow(flow.clone(), raw) {
            warn!(flow = %flow, error = %report, "flow configuration rejected");
        }
    }

    /// Returns the current definition of `flow`.
    #[must_use]
    pub fn flow(&self, flow: &FlowId) -> Option<Arc<FlowDefinition>> {
        self.read_flows().get(flow).cloned()
    }

    /// Returns the ids of all loaded flows.
    #[must_use]
    pub fn flow_ids(&self) -> Vec<FlowId> {
        let mut ids: Vec<_> = self.read_flows().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Starts a conversation: resolves the user, creates a lead at the entry
    /// step of the default flow and enters it.
    #[instrument(skip_all, fields(user = event.user.id))]
    pub async fn create_lead(&self, event: LeadCreated) {
        let channel = event
            .channel
            .unwrap_or_else(|| self.config.channel.clone());
        let _guard = self.locks.lock(&channel, event.user.id).await;

        let user = self.resolve_user(event.user).await;
        let lead = Lead::new(user, event.source, channel, self.config.default_flow.clone());
        let mut lead = match self.repository.add_lead(lead.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(lead = %lead.id, error = %e, "failed to store new lead");
                lead
            }
        };
        info!(
            lead = %lead.id,
            user = %lead.user.external.display_name(),
            source = %lead.source,
            flow = %lead.flow,
            "lead created"
        );

        let result = self.enter(StepId::entry(), &mut lead).await;
        report(&lead, result);
    }

    /// Handles a reply from a lead's user.
    ///
    /// An armed wait marker is consumed and decides where the conversation
    /// resumes; otherwise the reply is evaluated at the lead's current step.
    #[instrument(skip_all, fields(user = event.user.id))]
    pub async fn on_reply(&self, event: LeadReplied) {
        let channel = event
            .channel
            .unwrap_or_else(|| self.config.channel.clone());
        let _guard = self.locks.lock(&channel, event.user.id).await;

        let Some(mut lead) = self.find_lead(event.user.id, &channel).await else {
            return;
        };

        let result = match lead.take_wait() {
            Some(wait) => {
                debug!(lead = %lead.id, step = %wait.step, kind = %wait.kind, "resuming at awaited step");
                lead.move_to(wait.step.clone());
                self.persist(&lead).await;
                match wait.kind {
                    StepKind::Question => self.enter(wait.step, &mut lead).await,
                    StepKind::Answer => self.evaluate(&event.message, &mut lead).await,
                }
            }
            None => self.evaluate(&event.message, &mut lead).await,
        };
        report(&lead, result);
    }

    /// Moves each reported lead to its new flow and enters that flow's
    /// entry step.
    #[instrument(skip_all, fields(entries = event.statuses.len()))]
    pub async fn on_external_status_change(&self, event: LeadStatusChanged) {
        let channel = event
            .channel
            .unwrap_or_else(|| self.config.channel.clone());

        for status in event.statuses {
            let _guard = self.locks.lock(&channel, status.external_id).await;
            let Some(mut lead) = self.find_lead(status.external_id, &channel).await else {
                continue;
            };

            info!(lead = %lead.id, from = %lead.flow, to = %status.flow, "lead moved by external status");
            lead.rebind(status.flow);
            self.persist(&lead).await;

            let result = self.enter(StepId::entry(), &mut lead).await;
            report(&lead, result);
        }
    }

    /// Runs the question instructions of `step` in the lead's flow.
    ///
    /// # Errors
    ///
    /// Returns `HopLimitExceeded` if the instructions keep transitioning
    /// past the configured limit.
    pub async fn enter(&self, step: StepId, lead: &mut Lead) -> Result<(), InterpretError> {
        let mut hops = Hops::new(self.config.max_hops);
        self.enter_step(step, lead, &mut hops).await
    }

    /// Evaluates `message` against the answer instructions of the lead's
    /// current step.
    ///
    /// # Errors
    ///
    /// Returns `HopLimitExceeded` if the selected option keeps transitioning
    /// past the configured limit.
    pub async fn evaluate(&self, message: &str, lead: &mut Lead) -> Result<(), InterpretError> {
        let mut hops = Hops::new(self.config.max_hops);
        self.evaluate_step(message, lead, &mut hops).await
    }

    fn enter_step<'a>(
        &'a self,
        step: StepId,
        lead: &'a mut Lead,
        hops: &'a mut Hops,
    ) -> Interpretation<'a> {
        Box::pin(async move {
            hops.advance(lead)?;
            let Some(definition) = self.definition_for(lead) else {
                return Ok(());
            };
            let Some(block) = definition.block(&step) else {
                debug!(lead = %lead.id, flow = %lead.flow, step = %step, "no block for step");
                return Ok(());
            };

            debug!(lead = %lead.id, flow = %lead.flow, step = %step, "entering step");
            for instruction in &block.question {
                self.execute(instruction, lead, hops).await?;
            }
            Ok(())
        })
    }

    fn evaluate_step<'a>(
        &'a self,
        message: &'a str,
        lead: &'a mut Lead,
        hops: &'a mut Hops,
    ) -> Interpretation<'a> {
        Box::pin(async move {
            hops.advance(lead)?;
            let Some(definition) = self.definition_for(lead) else {
                return Ok(());
            };
            let step = lead.step.clone();
            let Some(block) = definition.block(&step) else {
                debug!(lead = %lead.id, flow = %lead.flow, step = %step, "no block for step");
                return Ok(());
            };

            debug!(lead = %lead.id, flow = %lead.flow, step = %step, "evaluating reply");
            for instruction in &block.answer {
                let Instruction::Buttons { options } = instruction else {
                    debug!(lead = %lead.id, handler = instruction.handler(), "answer handler ignored");
                    continue;
                };
                let Some(option) = options.iter().find(|option| option.label == message) else {
                    debug!(lead = %lead.id, step = %step, "reply matched no option");
                    continue;
                };
                for nested in &option.instructions {
                    self.execute(nested, lead, hops).await?;
                }
            }
            Ok(())
        })
    }

    /// Runs one instruction. A `goto` into an answer evaluates an empty
    /// reply; the reply that triggered it is never matched twice.
    async fn execute(
        &self,
        instruction: &Instruction,
        lead: &mut Lead,
        hops: &mut Hops,
    ) -> Result<(), InterpretError> {
        match instruction {
            Instruction::ShowText { text } => {
                let payload = SendText {
                    chat_id: lead.external_id(),
                    text: text.clone(),
                };
                self.emit(SEND_TEXT, payload.into()).await;
            }
            Instruction::ShowButtons { text, labels } => {
                let payload = SendOptions {
                    chat_id: lead.external_id(),
                    text: text.clone(),
                    labels: labels.clone(),
                };
                self.emit(SEND_OPTIONS, payload.into()).await;
            }
            Instruction::Goto { step, kind } => {
                debug!(lead = %lead.id, step = %step, kind = %kind, "goto");
                lead.move_to(step.clone());
                self.persist(lead).await;
                return match kind {
                    StepKind::Question => self.enter_step(step.clone(), lead, hops).await,
                    StepKind::Answer => self.evaluate_step("", lead, hops).await,
                };
            }
            Instruction::ChangeStatus { flow } => {
                info!(lead = %lead.id, from = %lead.flow, to = %flow, "changing flow");
                lead.rebind(flow.clone());
                self.persist(lead).await;
                return self.enter_step(StepId::entry(), lead, hops).await;
            }
            Instruction::WaitAnswer { step, kind } => {
                debug!(lead = %lead.id, step = %step, kind = %kind, "waiting for reply");
                lead.arm_wait(step.clone(), *kind);
                self.persist(lead).await;
                let payload = AwaitReply {
                    user_id: lead.external_id(),
                };
                self.emit(AWAIT_REPLY, payload.into()).await;
            }
            Instruction::Buttons { .. } => {
                debug!(lead = %lead.id, "reply options outside an answer ignored");
            }
            Instruction::Unknown { handler } => {
                info!(lead = %lead.id, handler = %handler, "unsupported handler skipped");
            }
            Instruction::Invalid { handler, reason } => {
                warn!(lead = %lead.id, handler = %handler, reason = %reason, "invalid instruction skipped");
            }
        }
        Ok(())
    }

    async fn resolve_user(&self, external: ExternalUser) -> User {
        match self.repository.user_by_external_id(external.id).await {
            Ok(user) => return user,
            Err(e) if !e.is_not_found() => {
                warn!(user = external.id, error = %e, "user lookup failed");
            }
            Err(_) => {}
        }

        let user = User::new(external);
        match self.repository.add_user(user.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(user = user.external.id, error = %e, "failed to store user");
                user
            }
        }
    }

    async fn find_lead(&self, external_id: i64, channel: &str) -> Option<Lead> {
        match self
            .repository
            .lead_by_external_id(external_id, channel)
            .await
        {
            Ok(lead) => Some(lead),
            Err(e) if e.is_not_found() => {
                info!(user = external_id, channel, "no lead for user");
                None
            }
            Err(e) => {
                warn!(user = external_id, channel, error = %e, "lead lookup failed");
                None
            }
        }
    }

    fn definition_for(&self, lead: &Lead) -> Option<Arc<FlowDefinition>> {
        let definition = self.flow(&lead.flow);
        if definition.is_none() {
            debug!(lead = %lead.id, flow = %lead.flow, "flow not loaded");
        }
        definition
    }

    async fn persist(&self, lead: &Lead) {
        if let Err(e) = self.repository.update_lead(lead.id, lead).await {
            warn!(lead = %lead.id, error = %e, "failed to persist lead");
        }
    }

    async fn emit(&self, name: EventName, payload: AppEvent) {
        if let Err(e) = self.dispatcher.dispatch(name.clone(), payload).await {
            warn!(event = %name, error = %e, "failed to emit event");
        }
    }

    fn read_flows(&self) -> RwLockReadGuard<'_, HashMap<FlowId, Arc<FlowDefinition>>> {
        self.flows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_flows(&self) -> RwLockWriteGuard<'_, HashMap<FlowId, Arc<FlowDefinition>>> {
        self.flows.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn report(lead: &Lead, result: Result<(), InterpretError>) {
    if let Err(e) = result {
        error!(lead = %lead.id, error = %e, "interpretation aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Delivery, Harness, buttons, goto, text};
    use chatflow_conversation::event::{AWAIT_REPLY, SEND_OPTIONS, SEND_TEXT};
    use chatflow_conversation::{StatusChange, WaitAnswer};
    use serde_json::{Value as JsonValue, json};

    fn created(user: i64) -> LeadCreated {
        LeadCreated {
            user: ExternalUser::new(user),
            source: "ad".to_string(),
            channel: None,
        }
    }

    fn replied(user: i64, message: &str) -> LeadReplied {
        LeadReplied {
            user: ExternalUser::new(user),
            channel: None,
            message: message.to_string(),
        }
    }

    fn sent_text(delivery: &Delivery) -> (i64, &str) {
        match delivery {
            (name, AppEvent::SendText(SendText { chat_id, text })) if *name == SEND_TEXT => {
                (*chat_id, text.as_str())
            }
            other => panic!("expected a text send, got {other:?}"),
        }
    }

    async fn stored_lead(harness: &Harness, user: i64) -> Lead {
        harness
            .repository
            .lead_by_external_id(user, "telegram")
            .await
            .expect("lead stored")
    }

    fn greeting_flow() -> JsonValue {
        json!({
            "0": {
                "question": [text("Welcome")],
                "answer": [buttons(&[("yes", json!([goto("1", "question")]))])]
            },
            "1": {"question": [text("Step one")]}
        })
    }

    #[tokio::test]
    async fn create_lead_enters_entry_step_and_reply_follows_goto() {
        let mut harness = Harness::new(&[("main", greeting_flow())]);

        harness.engine.create_lead(created(42)).await;
        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (42, "Welcome"));
        harness.outbox.assert_quiet().await;

        let lead = stored_lead(&harness, 42).await;
        assert_eq!(lead.flow, FlowId::new("main"));
        assert!(lead.step.is_entry());
        assert_eq!(lead.source, "ad");

        harness.engine.on_reply(replied(42, "yes")).await;
        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (42, "Step one"));
        harness.outbox.assert_quiet().await;
        assert_eq!(stored_lead(&harness, 42).await.step, StepId::new("1"));
    }

    #[tokio::test]
    async fn unmatched_reply_changes_nothing() {
        let mut harness = Harness::new(&[("main", greeting_flow())]);
        harness.engine.create_lead(created(1)).await;
        harness.outbox.take(1).await;

        harness.engine.on_reply(replied(1, "Yes")).await;

        harness.outbox.assert_quiet().await;
        assert!(stored_lead(&harness, 1).await.step.is_entry());
    }

    #[tokio::test]
    async fn returning_user_is_reused() {
        let mut harness = Harness::new(&[("main", greeting_flow())]);
        harness.engine.create_lead(created(5)).await;
        harness.engine.create_lead(created(5)).await;
        harness.outbox.take(2).await;

        assert_eq!(harness.repository.user_count(), 1);
        let leads = harness.repository.leads();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].user.id, leads[1].user.id);
    }

    #[tokio::test]
    async fn wait_answer_redirects_next_reply() {
        let flow = json!({
            "0": {
                "question": [
                    text("Choose"),
                    {"handler": "wait_answer", "params": {"step": 5, "type": "answer"}}
                ],
                "answer": [buttons(&[("b", json!([text("wrong step")]))])]
            },
            "5": {"answer": [buttons(&[("b", json!([goto("6", "question")]))])]},
            "6": {"question": [text("six")]}
        });
        let mut harness = Harness::new(&[("main", flow)]);

        harness.engine.create_lead(created(9)).await;
        let mut sent = harness.outbox.take(2).await;
        sent.sort_by_key(|(name, _)| name.clone());
        assert_eq!(sent[0].0, AWAIT_REPLY);
        assert_eq!(sent[0].1, AppEvent::from(AwaitReply { user_id: 9 }));
        assert_eq!(sent_text(&sent[1]), (9, "Choose"));

        let lead = stored_lead(&harness, 9).await;
        assert_eq!(
            lead.wait_answer,
            WaitAnswer {
                step: StepId::new("5"),
                kind: StepKind::Answer,
                enabled: true,
            }
        );

        harness.engine.on_reply(replied(9, "b")).await;
        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (9, "six"));
        harness.outbox.assert_quiet().await;

        let lead = stored_lead(&harness, 9).await;
        assert!(!lead.wait_answer.enabled);
        assert_eq!(lead.step, StepId::new("6"));
    }

    #[tokio::test]
    async fn wait_answer_question_kind_enters_step() {
        let flow = json!({
            "0": {"question": [{"handler": "wait_answer", "params": {"step": "2", "type": "question"}}]},
            "2": {"question": [text("asked again")]}
        });
        let mut harness = Harness::new(&[("main", flow)]);
        harness.engine.create_lead(created(3)).await;
        harness.outbox.take(1).await;

        harness.engine.on_reply(replied(3, "anything")).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (3, "asked again"));
        assert_eq!(stored_lead(&harness, 3).await.step, StepId::new("2"));
    }

    #[tokio::test]
    async fn unknown_handler_is_skipped_without_state_change() {
        let flow = json!({
            "0": {"question": [
                {"handler": "teleport", "params": {"to": "mars"}},
                {"handler": "goto", "params": {"type": "question"}},
                text("still here")
            ]}
        });
        let mut harness = Harness::new(&[("main", flow)]);

        harness.engine.create_lead(created(4)).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (4, "still here"));
        harness.outbox.assert_quiet().await;
        let lead = stored_lead(&harness, 4).await;
        assert!(lead.step.is_entry());
        assert!(!lead.wait_answer.enabled);
    }

    #[tokio::test]
    async fn show_buttons_sends_options() {
        let flow = json!({
            "0": {"question": [
                {"handler": "show", "params": {"type": "buttons", "value": "Pick", "buttons": ["a", "b"]}}
            ]}
        });
        let mut harness = Harness::new(&[("main", flow)]);

        harness.engine.create_lead(created(8)).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent[0].0, SEND_OPTIONS);
        assert_eq!(
            sent[0].1,
            AppEvent::from(SendOptions {
                chat_id: 8,
                text: "Pick".to_string(),
                labels: vec!["a".to_string(), "b".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn change_status_enters_new_flow_from_any_step() {
        let main = json!({
            "3": {"answer": [buttons(&[("switch", json!([
                {"handler": "action", "params": {"name": "change_status", "params": {"value": "F"}}}
            ]))])]}
        });
        let target = json!({"0": {"question": [text("in F")]}});
        let mut harness = Harness::new(&[("main", main), ("F", target)]);

        harness.engine.create_lead(created(6)).await;
        harness.outbox.assert_quiet().await;
        let mut lead = stored_lead(&harness, 6).await;
        lead.move_to(StepId::new("3"));
        harness
            .repository
            .update_lead(lead.id, &lead)
            .await
            .expect("update");

        harness.engine.on_reply(replied(6, "switch")).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (6, "in F"));
        let lead = stored_lead(&harness, 6).await;
        assert_eq!(lead.flow, FlowId::new("F"));
        assert!(lead.step.is_entry());
    }

    #[tokio::test]
    async fn external_status_change_moves_each_lead() {
        let mut harness = Harness::new(&[
            ("main", json!({})),
            ("F1", json!({"0": {"question": [text("one")]}})),
            ("F2", json!({"0": {"question": [text("two")]}})),
        ]);
        harness.engine.create_lead(created(1)).await;
        harness.engine.create_lead(created(2)).await;

        harness
            .engine
            .on_external_status_change(LeadStatusChanged {
                channel: None,
                statuses: vec![
                    StatusChange {
                        external_id: 1,
                        flow: FlowId::new("F1"),
                    },
                    StatusChange {
                        external_id: 2,
                        flow: FlowId::new("F2"),
                    },
                    StatusChange {
                        external_id: 404,
                        flow: FlowId::new("F1"),
                    },
                ],
            })
            .await;

        let mut sent: Vec<_> = harness
            .outbox
            .take(2)
            .await
            .iter()
            .map(|delivery| {
                let (chat, text) = sent_text(delivery);
                (chat, text.to_string())
            })
            .collect();
        sent.sort();
        assert_eq!(sent, vec![(1, "one".to_string()), (2, "two".to_string())]);
        harness.outbox.assert_quiet().await;

        assert_eq!(stored_lead(&harness, 1).await.flow, FlowId::new("F1"));
        assert_eq!(stored_lead(&harness, 2).await.flow, FlowId::new("F2"));
    }

    #[tokio::test]
    async fn goto_cycle_hits_hop_limit() {
        let flow = json!({
            "0": {"question": [goto("1", "question")]},
            "1": {"question": [goto("0", "question")]}
        });
        let harness = Harness::new(&[("main", flow)]);
        let mut lead = Lead::new(
            User::new(ExternalUser::new(7)),
            "",
            "telegram",
            FlowId::new("main"),
        );

        let err = harness
            .engine
            .enter(StepId::entry(), &mut lead)
            .await
            .expect_err("cycle");

        assert_eq!(
            err,
            InterpretError::HopLimitExceeded {
                lead: lead.id,
                limit: 16,
            }
        );
    }

    #[tokio::test]
    async fn goto_answer_from_entry_evaluates_empty_reply() {
        let flow = json!({
            "0": {"question": [goto("1", "answer")]},
            "1": {"answer": [buttons(&[("", json!([text("blank matched")]))])]}
        });
        let mut harness = Harness::new(&[("main", flow)]);

        harness.engine.create_lead(created(12)).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (12, "blank matched"));
        assert_eq!(stored_lead(&harness, 12).await.step, StepId::new("1"));
    }

    #[tokio::test]
    async fn goto_answer_does_not_reuse_the_reply() {
        let flow = json!({
            "0": {"answer": [buttons(&[("yes", json!([goto("1", "answer")]))])]},
            "1": {"answer": [buttons(&[("yes", json!([text("matched twice")]))])]}
        });
        let mut harness = Harness::new(&[("main", flow)]);
        harness.engine.create_lead(created(1)).await;

        harness.engine.on_reply(replied(1, "yes")).await;

        harness.outbox.assert_quiet().await;
        assert_eq!(stored_lead(&harness, 1).await.step, StepId::new("1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_replies_for_one_lead_are_serialized() {
        let flow = json!({
            "0": {"question": [{"handler": "wait_answer", "params": {"step": 5, "type": "answer"}}]},
            "5": {"answer": [buttons(&[
                ("a", json!([text("a at 5"), goto("6", "question")])),
                ("b", json!([text("b at 5"), goto("6", "question")]))
            ])]},
            "6": {"answer": [buttons(&[
                ("a", json!([text("a at 6")])),
                ("b", json!([text("b at 6")]))
            ])]}
        });
        let mut harness = Harness::new(&[("main", flow)]);
        harness.engine.create_lead(created(3)).await;
        harness.outbox.take(1).await;

        let first = {
            let engine = Arc::clone(&harness.engine);
            tokio::spawn(async move { engine.on_reply(replied(3, "a")).await })
        };
        let second = {
            let engine = Arc::clone(&harness.engine);
            tokio::spawn(async move { engine.on_reply(replied(3, "b")).await })
        };
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let mut texts: Vec<_> = harness
            .outbox
            .take(2)
            .await
            .iter()
            .map(|delivery| sent_text(delivery).1.to_string())
            .collect();
        texts.sort();
        harness.outbox.assert_quiet().await;

        // One reply resumed at the awaited step, the other saw the step it moved to.
        assert!(
            texts == ["a at 5", "b at 6"] || texts == ["a at 6", "b at 5"],
            "replies interleaved: {texts:?}"
        );
        let lead = stored_lead(&harness, 3).await;
        assert!(!lead.wait_answer.enabled);
        assert_eq!(lead.step, StepId::new("6"));
    }

    #[tokio::test]
    async fn storage_failure_does_not_stop_progress() {
        let mut harness = Harness::new(&[("main", greeting_flow())]);
        harness.engine.create_lead(created(2)).await;
        harness.outbox.take(1).await;
        harness.repository.set_fail_writes(true);

        harness.engine.on_reply(replied(2, "yes")).await;

        let sent = harness.outbox.take(1).await;
        assert_eq!(sent_text(&sent[0]), (2, "Step one"));
        assert!(stored_lead(&harness, 2).await.step.is_entry());
    }

    #[tokio::test]
    async fn reply_without_lead_or_flow_is_a_no_op() {
        let mut harness = Harness::new(&[]);

        harness.engine.on_reply(replied(77, "hello")).await;
        harness.engine.create_lead(created(77)).await;

        harness.outbox.assert_quiet().await;
        assert!(stored_lead(&harness, 77).await.step.is_entry());
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_definition() {
        let harness = Harness::new(&[("main", greeting_flow())]);
        let before = harness.engine.flow(&FlowId::new("main")).expect("loaded");

        assert!(harness
            .engine
            .load_flow(FlowId::new("main"), "[\"not\", \"blocks\"]")
            .is_err());
        assert!(harness.engine.load_flow(FlowId::new("main"), "").is_err());
        harness.engine.add_config(FlowId::new("main"), "{broken");

        let after = harness.engine.flow(&FlowId::new("main")).expect("still loaded");
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn reload_replaces_definition_wholesale() {
        let harness = Harness::new(&[("main", greeting_flow())]);

        harness
            .engine
            .add_config(FlowId::new("main"), &json!({"7": {}}).to_string());
        harness.engine.add_config(FlowId::new("other"), "{}");

        let main = harness.engine.flow(&FlowId::new("main")).expect("loaded");
        assert_eq!(main.len(), 1);
        assert!(main.block(&StepId::entry()).is_none());
        assert_eq!(
            harness.engine.flow_ids(),
            vec![FlowId::new("main"), FlowId::new("other")]
        );
    }
}
