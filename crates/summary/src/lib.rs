//! Refresh engine shared by the CLI commands.

mod engine;
mod settings;

pub use engine::{
    AutoConfirm, Confirmer, RefreshError, RefreshOutcome, TwoStepOutcome, apply_completion,
    preview_window, recent_conversation, refresh_tables, two_step_refresh,
};
pub use settings::EngineConfig;
