use crate::table::TableSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One message in a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Stable identity, assigned lazily by [`crate::window::ensure_initialized`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub is_user: bool,
    /// Raw message text.
    #[serde(default)]
    pub mes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_date: Option<DateTime<Utc>>,
    /// Uids of the triggering turns whose two-step summary already consumed
    /// this turn.
    #[serde(
        default,
        alias = "uidReferencesStepUpdate",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub summarized_by: BTreeSet<String>,
    /// Set on a trigger turn once its two-step summary has been committed.
    #[serde(default)]
    pub executed_two_step_forward: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tables: Option<TableSnapshot>,
}

impl ConversationTurn {
    pub fn user(mes: impl Into<String>) -> Self {
        Self {
            is_user: true,
            mes: mes.into(),
            send_date: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn assistant(mes: impl Into<String>) -> Self {
        Self {
            is_user: false,
            mes: mes.into(),
            send_date: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn is_summarized_by(&self, trigger_uid: &str) -> bool {
        self.summarized_by.contains(trigger_uid)
    }
}

/// A conversation together with the table templates it tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub chat_id: String,
    /// Base snapshot used until some turn carries tables of its own.
    #[serde(default)]
    pub templates: TableSnapshot,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
}

impl Chat {
    pub fn new(chat_id: impl Into<String>, templates: TableSnapshot) -> Self {
        Self {
            chat_id: chat_id.into(),
            templates,
            turns: Vec::new(),
        }
    }

    /// The most recent attached snapshot, falling back to the templates.
    pub fn latest_snapshot(&self) -> &TableSnapshot {
        self.turns
            .iter()
            .rev()
            .find_map(|turn| turn.tables.as_ref())
            .unwrap_or(&self.templates)
    }

    /// Index of the newest turn, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.turns.len().checked_sub(1)
    }

    /// Index of the newest assistant turn, if any.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.turns.iter().rposition(|turn| !turn.is_user)
    }

    /// Attach `snapshot` to the newest turn. Returns `false` when the chat has
    /// no turns.
    pub fn attach_snapshot(&mut self, snapshot: TableSnapshot) -> bool {
        match self.turns.last_mut() {
            Some(turn) => {
                turn.tables = Some(snapshot);
                true
            }
            None => false,
        }
    }
}
