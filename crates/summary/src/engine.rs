use crate::settings::EngineConfig;
use tablesync_core::extract::strip_embedded_blocks;
use tablesync_core::prompt::render_prompt;
use tablesync_core::window::{commit_window, ensure_initialized, select_window};
use tablesync_core::{
    ApplyReport, Chat, ChatStore, CommitError, ConversationTurn, EditAction, PlanError,
    RefreshContext, StoreError, TableSnapshot, TwoStepWindow, WindowError,
};
use tablesync_provider::{CompletionProvider, CompletionRequest, ProviderError};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RefreshError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("completion failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("could not save chat: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("chat has no turns")]
    NoTurns,
}

impl From<CommitError> for RefreshError {
    fn from(_: CommitError) -> Self {
        Self::NoTurns
    }
}

/// Asked once per interactive refresh, before anything is applied.
pub trait Confirmer {
    fn confirm(&self, actions: &[EditAction], working: &TableSnapshot) -> bool;
}

/// Accepts every action list.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm(&self, _actions: &[EditAction], _working: &TableSnapshot) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Actions were applied and the snapshot attached to the newest turn.
    Committed {
        actions: Vec<EditAction>,
        report: ApplyReport,
    },
    /// The completion held no actions after dedup.
    NoChanges,
    /// The user declined; nothing was touched.
    Declined { actions: Vec<EditAction> },
}

impl RefreshOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwoStepOutcome {
    Disabled,
    /// No assistant turn, or everything up to it is already summarized.
    NothingToSummarize,
    Summarized {
        window: TwoStepWindow,
        outcome: RefreshOutcome,
    },
}

/// Recent conversation, newest last, bounded by `max_chars`.
pub fn recent_conversation(turns: &[ConversationTurn], max_chars: usize) -> String {
    let mut pieces = Vec::new();
    let mut len = 0usize;
    for turn in turns.iter().rev() {
        let text = strip_embedded_blocks(&turn.mes);
        if text.is_empty() {
            continue;
        }
        let speaker = if turn.is_user { "User" } else { "Assistant" };
        let piece = format!("{speaker}: {text}");
        len += piece.chars().count();
        pieces.push(piece);
        if len > max_chars {
            break;
        }
    }
    pieces.reverse();
    pieces.join("\n")
}

/// Full refresh against the recent conversation. Saves the chat once on
/// commit.
pub async fn refresh_tables<P, S>(
    chat: &mut Chat,
    provider: &P,
    store: &S,
    config: &EngineConfig,
    confirmer: &dyn Confirmer,
) -> Result<RefreshOutcome, RefreshError>
where
    P: CompletionProvider,
    S: ChatStore,
{
    if chat.turns.is_empty() {
        return Err(RefreshError::NoTurns);
    }
    ensure_initialized(&mut chat.turns);

    let text = recent_conversation(&chat.turns, config.window.threshold_chars);
    let outcome = run_pipeline(chat, &text, provider, config, confirmer).await?;
    if outcome.is_committed() {
        store.save(chat)?;
    }
    Ok(outcome)
}

/// Two-step summary for `trigger` (default: newest assistant turn).
///
/// Runs silently without confirmation. On success the consumed turns are
/// marked and the chat is saved once; on failure nothing is marked.
pub async fn two_step_refresh<P, S>(
    chat: &mut Chat,
    trigger: Option<usize>,
    provider: &P,
    store: &S,
    config: &EngineConfig,
) -> Result<TwoStepOutcome, RefreshError>
where
    P: CompletionProvider,
    S: ChatStore,
{
    if !config.two_step_enabled {
        return Ok(TwoStepOutcome::Disabled);
    }
    let Some(window) = preview_window(chat, trigger, config)? else {
        return Ok(TwoStepOutcome::NothingToSummarize);
    };
    info!(
        trigger = window.trigger,
        turns = window.consumed.len(),
        chars = window.char_len(),
        "running two-step summary"
    );

    let forced = config.forced();
    let outcome = run_pipeline(chat, &window.text, provider, &forced, &AutoConfirm).await?;
    commit_window(&mut chat.turns, &window);
    store.save(chat)?;

    Ok(TwoStepOutcome::Summarized { window, outcome })
}

/// Select the window a two-step pass would consume, without marking
/// anything. Assigns missing uids.
pub fn preview_window(
    chat: &mut Chat,
    trigger: Option<usize>,
    config: &EngineConfig,
) -> Result<Option<TwoStepWindow>, RefreshError> {
    ensure_initialized(&mut chat.turns);
    let Some(trigger) = trigger.or_else(|| chat.last_assistant_index()) else {
        return Ok(None);
    };
    Ok(select_window(&chat.turns, trigger, &config.window)?)
}

/// Run an already obtained completion through plan, confirm, apply and
/// commit. Saves the chat once on commit.
pub fn apply_completion<S: ChatStore>(
    chat: &mut Chat,
    completion: &str,
    store: &S,
    config: &EngineConfig,
    confirmer: &dyn Confirmer,
) -> Result<RefreshOutcome, RefreshError> {
    if chat.turns.is_empty() {
        return Err(RefreshError::NoTurns);
    }
    let ctx = RefreshContext::begin(chat, config.policy);
    let outcome = finish(ctx, chat, completion, config, confirmer)?;
    if outcome.is_committed() {
        store.save(chat)?;
    }
    Ok(outcome)
}

async fn run_pipeline<P: CompletionProvider>(
    chat: &mut Chat,
    text: &str,
    provider: &P,
    config: &EngineConfig,
    confirmer: &dyn Confirmer,
) -> Result<RefreshOutcome, RefreshError> {
    let ctx = RefreshContext::begin(chat, config.policy);
    let prompt = render_prompt(
        &config.system_prompt,
        &config.user_prompt,
        ctx.working(),
        text,
    );
    let request = CompletionRequest::from_settings(&config.provider, prompt.system, prompt.user);

    info!(provider = provider.name(), window_chars = text.chars().count(), "requesting table edits");
    let completion = provider.complete(&request).await?;
    finish(ctx, chat, &completion, config, confirmer)
}

fn finish(
    mut ctx: RefreshContext,
    chat: &mut Chat,
    completion: &str,
    config: &EngineConfig,
    confirmer: &dyn Confirmer,
) -> Result<RefreshOutcome, RefreshError> {
    let actions = ctx.plan(completion)?;
    if actions.is_empty() {
        info!("completion produced no table edits");
        return Ok(RefreshOutcome::NoChanges);
    }

    if config.needs_confirmation() && !confirmer.confirm(&actions, ctx.working()) {
        info!(actions = actions.len(), "table edits declined");
        return Ok(RefreshOutcome::Declined { actions });
    }

    let report = ctx.apply(&actions);
    if !report.is_clean() {
        warn!(
            skipped = report.warnings.len(),
            applied = report.applied.len(),
            "some table edits were skipped"
        );
    }
    ctx.commit(chat)?;
    Ok(RefreshOutcome::Committed { actions, report })
}
