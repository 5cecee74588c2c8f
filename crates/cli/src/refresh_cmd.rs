use anyhow::{Context, Result};
use dialoguer::Confirm;
use std::io::IsTerminal;
use std::path::Path;
use tablesync_core::{ApplyReport, Chat, ChatStore, EditAction, TableSnapshot};
use tablesync_local_store::JsonlChatStore;
use tablesync_provider::ConfiguredProvider;
use tablesync_runtime_config::TableSyncConfig;
use tablesync_summary::{
    AutoConfirm, Confirmer, EngineConfig, RefreshOutcome, TwoStepOutcome, apply_completion,
    preview_window, refresh_tables, two_step_refresh,
};

/// Lists the planned actions and asks on the terminal.
struct TerminalConfirm;

impl Confirmer for TerminalConfirm {
    fn confirm(&self, actions: &[EditAction], _working: &TableSnapshot) -> bool {
        println!("Planned table edits:");
        for action in actions {
            println!("  - {action}");
        }
        if !std::io::stdin().is_terminal() {
            eprintln!("Not a terminal; pass --yes to apply without confirmation.");
            return false;
        }
        Confirm::new()
            .with_prompt(format!("Apply {} edit(s)?", actions.len()))
            .default(true)
            .interact()
            .unwrap_or(false)
    }
}

fn confirmer(yes: bool) -> &'static dyn Confirmer {
    if yes { &AutoConfirm } else { &TerminalConfirm }
}

fn load_chat(store: &JsonlChatStore, chat_id: &str) -> Result<Chat> {
    store
        .load(chat_id)
        .with_context(|| format!("Failed to load chat `{chat_id}` from {}", store.root().display()))
}

fn build_provider(config: &TableSyncConfig) -> Result<ConfiguredProvider> {
    let api_key = config
        .provider
        .resolve_api_key(|key| std::env::var(key).ok());
    ConfiguredProvider::from_settings(&config.provider, api_key)
        .context("Failed to set up completion provider")
}

fn print_report(report: &ApplyReport) {
    println!("Applied {} edit(s).", report.applied.len());
    if !report.warnings.is_empty() {
        println!("Skipped {}:", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}

fn print_outcome(outcome: &RefreshOutcome, silent: bool) {
    match outcome {
        RefreshOutcome::Committed { report, .. } => {
            if silent {
                if !report.is_clean() {
                    print_report(report);
                }
            } else {
                print_report(report);
            }
        }
        RefreshOutcome::NoChanges => {
            if !silent {
                println!("No table changes.");
            }
        }
        RefreshOutcome::Declined { .. } => println!("Declined; tables left unchanged."),
    }
}

pub async fn run_refresh(
    config: &TableSyncConfig,
    store_dir: &Path,
    chat_id: &str,
    yes: bool,
) -> Result<()> {
    let store = JsonlChatStore::new(store_dir);
    let mut chat = load_chat(&store, chat_id)?;
    let provider = build_provider(config)?;
    let engine = EngineConfig::from(config);

    let outcome = refresh_tables(&mut chat, &provider, &store, &engine, confirmer(yes))
        .await
        .context("Table refresh failed")?;
    print_outcome(&outcome, engine.silent);
    Ok(())
}

pub async fn run_two_step(
    config: &TableSyncConfig,
    store_dir: &Path,
    chat_id: &str,
    trigger: Option<usize>,
) -> Result<()> {
    let store = JsonlChatStore::new(store_dir);
    let mut chat = load_chat(&store, chat_id)?;
    let provider = build_provider(config)?;
    let engine = EngineConfig::from(config);

    let outcome = two_step_refresh(&mut chat, trigger, &provider, &store, &engine)
        .await
        .context("Two-step summary failed")?;
    match outcome {
        TwoStepOutcome::Disabled => println!("Two-step summary is disabled in config."),
        TwoStepOutcome::NothingToSummarize => println!("Nothing new to summarize."),
        TwoStepOutcome::Summarized { window, outcome } => {
            println!(
                "Summarized {} turn(s), {} chars.",
                window.consumed.len(),
                window.char_len()
            );
            print_outcome(&outcome, false);
        }
    }
    Ok(())
}

pub fn run_window(
    config: &TableSyncConfig,
    store_dir: &Path,
    chat_id: &str,
    trigger: Option<usize>,
) -> Result<()> {
    let store = JsonlChatStore::new(store_dir);
    let mut chat = load_chat(&store, chat_id)?;
    let engine = EngineConfig::from(config);

    match preview_window(&mut chat, trigger, &engine).context("Window selection failed")? {
        None => println!("Nothing new to summarize."),
        Some(window) => {
            let consumed: Vec<String> = window.consumed.iter().map(ToString::to_string).collect();
            println!("Trigger turn: {}", window.trigger);
            println!("Turns:        {}", consumed.join(", "));
            println!("Chars:        {}", window.char_len());
            println!();
            println!("{}", window.text);
        }
    }
    Ok(())
}

pub fn run_apply(
    config: &TableSyncConfig,
    store_dir: &Path,
    chat_id: &str,
    actions_file: &Path,
    yes: bool,
) -> Result<()> {
    let store = JsonlChatStore::new(store_dir);
    let mut chat = load_chat(&store, chat_id)?;
    let completion = std::fs::read_to_string(actions_file)
        .with_context(|| format!("Failed to read actions from {}", actions_file.display()))?;
    let engine = EngineConfig::from(config);

    let outcome = apply_completion(&mut chat, &completion, &store, &engine, confirmer(yes))
        .context("Applying actions failed")?;
    print_outcome(&outcome, false);
    Ok(())
}
