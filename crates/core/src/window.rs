//! Two-step summary window: which slice of recent assistant output still
//! needs to be folded into the tables.
//!
//! Selection is a pure scan over the history; marking the consumed turns is a
//! separate [`commit_window`] step the caller runs only after the refresh
//! succeeded.

use crate::chat::ConversationTurn;
use crate::extract::strip_embedded_blocks;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum WindowError {
    #[error("trigger turn {index} is out of range (history has {len} turns)")]
    TriggerOutOfRange { index: usize, len: usize },
    #[error("turn {0} has no uid; call ensure_initialized first")]
    Uninitialized(usize),
    #[error("trigger turn {0} is a user turn; two-step windows are triggered by assistant turns")]
    TriggerIsUser(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowOptions {
    /// Accumulation stops once the window grows past this many chars.
    pub threshold_chars: usize,
    /// Windows shorter than this are deferred to a later turn.
    pub min_window_chars: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            threshold_chars: 4000,
            min_window_chars: 0,
        }
    }
}

/// A selected window, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoStepWindow {
    pub trigger: usize,
    pub trigger_uid: String,
    /// Chronological concatenation of the consumed assistant turns.
    pub text: String,
    /// Indices of the consumed turns, oldest first.
    pub consumed: Vec<usize>,
}

impl TwoStepWindow {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Give every turn a uid. Returns how many were assigned.
pub fn ensure_initialized(turns: &mut [ConversationTurn]) -> usize {
    let mut assigned = 0;
    for turn in turns.iter_mut().filter(|t| t.uid.is_none()) {
        turn.uid = Some(Uuid::new_v4().to_string());
        assigned += 1;
    }
    if assigned > 0 {
        debug!(assigned, "initialized turn uids");
    }
    assigned
}

/// Select the window owed by the turn at `trigger`, scanning backward.
///
/// The trigger must be an assistant turn. User turns are skipped. The scan stops at the first assistant turn that
/// already forwarded a summary or was already consumed by this trigger; that
/// boundary turn contributes no text.
pub fn select_window(
    turns: &[ConversationTurn],
    trigger: usize,
    options: &WindowOptions,
) -> Result<Option<TwoStepWindow>, WindowError> {
    let trigger_turn = turns.get(trigger).ok_or(WindowError::TriggerOutOfRange {
        index: trigger,
        len: turns.len(),
    })?;
    if trigger_turn.is_user {
        return Err(WindowError::TriggerIsUser(trigger));
    }
    let trigger_uid = trigger_turn
        .uid
        .clone()
        .ok_or(WindowError::Uninitialized(trigger))?;

    let mut pieces: Vec<String> = Vec::new();
    let mut consumed: Vec<usize> = Vec::new();
    let mut len = 0usize;

    for index in (0..=trigger).rev() {
        let turn = &turns[index];
        if turn.is_user {
            continue;
        }
        if turn.executed_two_step_forward || turn.is_summarized_by(&trigger_uid) {
            debug!(index, "window boundary");
            break;
        }

        consumed.push(index);
        let text = strip_embedded_blocks(&turn.mes);
        if !text.is_empty() {
            len += text.chars().count();
            pieces.push(text);
        }
        if len > options.threshold_chars {
            debug!(index, len, "window threshold reached");
            break;
        }
    }

    pieces.reverse();
    consumed.reverse();
    let text = pieces.join("\n");

    if text.is_empty() || text.chars().count() < options.min_window_chars {
        return Ok(None);
    }

    Ok(Some(TwoStepWindow {
        trigger,
        trigger_uid,
        text,
        consumed,
    }))
}

/// Mark the window's turns as consumed by its trigger and flag the trigger as
/// forwarded.
pub fn commit_window(turns: &mut [ConversationTurn], window: &TwoStepWindow) {
    for &index in &window.consumed {
        if let Some(turn) = turns.get_mut(index) {
            turn.summarized_by.insert(window.trigger_uid.clone());
        }
    }
    if let Some(turn) = turns.get_mut(window.trigger) {
        turn.executed_two_step_forward = true;
    }
    debug!(
        trigger = window.trigger,
        consumed = window.consumed.len(),
        "committed two-step window"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(script: &[(bool, &str)]) -> Vec<ConversationTurn> {
        let mut turns: Vec<ConversationTurn> = script
            .iter()
            .map(|(is_user, mes)| {
                if *is_user {
                    ConversationTurn::user(*mes)
                } else {
                    ConversationTurn::assistant(*mes)
                }
            })
            .collect();
        ensure_initialized(&mut turns);
        turns
    }

    #[test]
    fn test_scan_stops_at_forwarded_turn() {
        let mut turns = history(&[
            (true, "A"),
            (false, "B"),
            (false, "C"),
            (false, "D"),
        ]);
        turns[2].executed_two_step_forward = true;

        let window = select_window(&turns, 3, &WindowOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.text, "D");
        assert_eq!(window.consumed, vec![3]);
    }

    #[test]
    fn test_user_turns_are_skipped_not_boundaries() {
        let turns = history(&[
            (false, "first"),
            (true, "question"),
            (false, "second"),
        ]);
        let window = select_window(&turns, 2, &WindowOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.text, "first\nsecond");
        assert_eq!(window.consumed, vec![0, 2]);
    }

    #[test]
    fn test_embedded_blocks_are_stripped() {
        let turns = history(&[(false, "<think>hmm</think>Alice enters.<tableEdit>[]</tableEdit>")]);
        let window = select_window(&turns, 0, &WindowOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(window.text, "Alice enters.");
    }

    #[test]
    fn test_threshold_bounds_accumulation() {
        let turns = history(&[
            (false, "oldest"),
            (false, "middle-text"),
            (false, "newest-text"),
        ]);
        let options = WindowOptions {
            threshold_chars: 15,
            min_window_chars: 0,
        };
        let window = select_window(&turns, 2, &options).unwrap().unwrap();
        assert_eq!(window.text, "middle-text\nnewest-text");
        assert_eq!(window.consumed, vec![1, 2]);
    }

    #[test]
    fn test_commit_prevents_reprocessing() {
        let mut turns = history(&[(false, "B"), (false, "D")]);
        let options = WindowOptions::default();
        let window = select_window(&turns, 1, &options).unwrap().unwrap();
        commit_window(&mut turns, &window);

        assert!(turns[1].executed_two_step_forward);
        assert!(turns[0].is_summarized_by(&window.trigger_uid));
        assert_eq!(select_window(&turns, 1, &options).unwrap(), None);

        turns.push(ConversationTurn::user("next"));
        turns.push(ConversationTurn::assistant("E"));
        ensure_initialized(&mut turns);
        let next = select_window(&turns, 3, &options).unwrap().unwrap();
        assert_eq!(next.text, "E");
    }

    #[test]
    fn test_user_trigger_is_rejected_and_marks_nothing() {
        let mut turns = history(&[(true, "hi"), (false, "Alice arrives."), (true, "and then?")]);
        let options = WindowOptions::default();
        assert_eq!(
            select_window(&turns, 2, &options),
            Err(WindowError::TriggerIsUser(2))
        );

        turns.push(ConversationTurn::assistant("Bob leaves."));
        ensure_initialized(&mut turns);
        let window = select_window(&turns, 3, &options).unwrap().unwrap();
        commit_window(&mut turns, &window);
        assert_eq!(window.text, "Alice arrives.\nBob leaves.");

        turns.push(ConversationTurn::user("more?"));
        turns.push(ConversationTurn::assistant("Carol waves."));
        ensure_initialized(&mut turns);
        let next = select_window(&turns, 5, &options).unwrap().unwrap();
        assert_eq!(next.text, "Carol waves.");
    }

    #[test]
    fn test_short_window_is_deferred() {
        let turns = history(&[(false, "tiny")]);
        let options = WindowOptions {
            threshold_chars: 4000,
            min_window_chars: 10,
        };
        assert_eq!(select_window(&turns, 0, &options).unwrap(), None);
    }

    #[test]
    fn test_empty_window_is_none() {
        let turns = history(&[(true, "question"), (false, "<think>only thoughts</think>")]);
        assert_eq!(
            select_window(&turns, 1, &WindowOptions::default()).unwrap(),
            None
        );
    }

    #[test]
    fn test_errors() {
        let mut turns = vec![ConversationTurn::assistant("x")];
        assert_eq!(
            select_window(&turns, 0, &WindowOptions::default()),
            Err(WindowError::Uninitialized(0))
        );
        assert_eq!(ensure_initialized(&mut turns), 1);
        assert_eq!(ensure_initialized(&mut turns), 0);
        assert_eq!(
            select_window(&turns, 4, &WindowOptions::default()),
            Err(WindowError::TriggerOutOfRange { index: 4, len: 1 })
        );
    }
}
