//! The state owned by one in-flight refresh.
//!
//! [`RefreshContext`] holds a private working copy of the latest snapshot.
//! Planning reads it, applying mutates it, and only [`RefreshContext::commit`]
//! touches the chat. Dropping the context discards everything.

use crate::action::EditAction;
use crate::apply::{ApplyPolicy, ApplyReport, apply_actions};
use crate::chat::Chat;
use crate::dedup::dedup_and_order;
use crate::extract::extract_action_payload;
use crate::repair::{RegexRepair, RepairError, RepairStrategy, parse_with};
use crate::table::TableSnapshot;
use crate::validate::{SchemaError, validate_actions};
use tracing::{debug, info};

/// Batch-fatal failure while turning a completion into actions.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error(transparent)]
    Repair(#[from] RepairError),
    #[error("invalid action list: {0}")]
    Schema(#[from] SchemaError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommitError {
    #[error("chat has no turns to attach tables to")]
    NoTurns,
}

#[derive(Debug, Clone)]
pub struct RefreshContext {
    working: TableSnapshot,
    policy: ApplyPolicy,
}

impl RefreshContext {
    /// Start a refresh from the chat's latest snapshot.
    pub fn begin(chat: &Chat, policy: ApplyPolicy) -> Self {
        Self {
            working: chat.latest_snapshot().clone(),
            policy,
        }
    }

    pub fn working(&self) -> &TableSnapshot {
        &self.working
    }

    pub fn policy(&self) -> &ApplyPolicy {
        &self.policy
    }

    /// Turn a raw completion into an ordered, deduplicated action list.
    pub fn plan(&self, completion: &str) -> Result<Vec<EditAction>, PlanError> {
        self.plan_with(&RegexRepair, completion)
    }

    pub fn plan_with(
        &self,
        strategy: &dyn RepairStrategy,
        completion: &str,
    ) -> Result<Vec<EditAction>, PlanError> {
        let payload = extract_action_payload(completion);
        if payload.is_empty() {
            debug!("completion carried no action list");
            return Ok(Vec::new());
        }

        let value = parse_with(strategy, &payload)?;
        let actions = validate_actions(&value)?;
        let parsed = actions.len();
        let ordered = dedup_and_order(actions, &self.working);
        debug!(parsed, kept = ordered.len(), "planned actions");
        Ok(ordered)
    }

    /// Apply the planned actions to the working copy.
    pub fn apply(&mut self, actions: &[EditAction]) -> ApplyReport {
        apply_actions(&mut self.working, actions, &self.policy)
    }

    /// Attach the working copy to the newest turn of `chat`.
    pub fn commit(self, chat: &mut Chat) -> Result<(), CommitError> {
        let rows = self.working.row_count();
        if !chat.attach_snapshot(self.working) {
            return Err(CommitError::NoTurns);
        }
        info!(chat_id = %chat.chat_id, rows, "committed table snapshot");
        Ok(())
    }
}
