//! Leads: one ongoing scripted conversation each.

use crate::step::{FlowId, StepId, StepKind};
use crate::user::User;
use chatflow_core::LeadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pending-resume marker that redirects the next reply to a specific step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitAnswer {
    /// Step to resume at.
    pub step: StepId,
    /// Whether to enter the step or evaluate the reply against it.
    pub kind: StepKind,
    /// Only an enabled marker redirects the next reply.
    pub enabled: bool,
}

impl Default for WaitAnswer {
    fn default() -> Self {
        Self {
            step: StepId::entry(),
            kind: StepKind::Question,
            enabled: false,
        }
    }
}

/// A conversation between the platform and one user, scripted by a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    /// The user the conversation is held with.
    pub user: User,
    /// Originating source tag (e.g. the `/start` payload of a campaign link).
    pub source: String,
    /// Messenger channel the lead talks through (e.g. "telegram").
    pub channel: String,
    /// Flow currently scripting the conversation.
    pub flow: FlowId,
    /// Step whose answers the next reply is evaluated against.
    pub step: StepId,
    #[serde(default)]
    pub wait_answer: WaitAnswer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Creates a lead at the entry step of `flow`.
    #[must_use]
    pub fn new(
        user: User,
        source: impl Into<String>,
        channel: impl Into<String>,
        flow: FlowId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LeadId::new(),
            user,
            source: source.into(),
            channel: channel.into(),
            flow,
            step: StepId::entry(),
            wait_answer: WaitAnswer::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Platform id of the lead's user, which is also their private chat id.
    #[must_use]
    pub fn external_id(&self) -> i64 {
        self.user.external.id
    }

    /// Moves the lead to `step` within its current flow.
    pub fn move_to(&mut self, step: StepId) {
        self.step = step;
        self.updated_at = Utc::now();
    }

    /// Binds the lead to `flow`, back at its entry step.
    pub fn rebind(&mut self, flow: FlowId) {
        self.flow = flow;
        self.step = StepId::entry();
        self.updated_at = Utc::now();
    }

    /// Arms the wait marker, replacing any pending one.
    pub fn arm_wait(&mut self, step: StepId, kind: StepKind) {
        self.wait_answer = WaitAnswer {
            step,
            kind,
            enabled: true,
        };
        self.updated_at = Utc::now();
    }

    /// Disarms the wait marker and returns it, if it was enabled.
    pub fn take_wait(&mut self) -> Option<WaitAnswer> {
        if !self.wait_answer.enabled {
            return None;
        }
        self.wait_answer.enabled = false;
        self.updated_at = Utc::now();
        Some(self.wait_answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::ExternalUser;

    fn lead() -> Lead {
        Lead::new(
            User::new(ExternalUser::new(99)),
            "promo",
            "telegram",
            FlowId::new("main"),
        )
    }

    #[test]
    fn new_lead_starts_at_entry() {
        let lead = lead();
        assert!(lead.step.is_entry());
        assert!(!lead.wait_answer.enabled);
        assert_eq!(lead.external_id(), 99);
    }

    #[test]
    fn arming_overwrites_previous_wait() {
        let mut lead = lead();
        lead.arm_wait(StepId::new("3"), StepKind::Question);
        lead.arm_wait(StepId::new("5"), StepKind::Answer);

        assert_eq!(
            lead.wait_answer,
            WaitAnswer {
                step: StepId::new("5"),
                kind: StepKind::Answer,
                enabled: true,
            }
        );
    }

    #[test]
    fn take_wait_disarms_once() {
        let mut lead = lead();
        lead.arm_wait(StepId::new("5"), StepKind::Answer);

        let wait = lead.take_wait().expect("armed");
        assert_eq!(wait.step, StepId::new("5"));
        assert!(!lead.wait_answer.enabled);
        assert!(lead.take_wait().is_none());
    }

    #[test]
    fn rebind_resets_step() {
        let mut lead = lead();
        lead.move_to(StepId::new("4"));
        lead.rebind(FlowId::new("other"));

        assert_eq!(lead.flow, FlowId::new("other"));
        assert!(lead.step.is_entry());
    }
}
