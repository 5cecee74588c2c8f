use tablesync_core::{ApplyPolicy, WindowOptions};
use tablesync_runtime_config::{ProviderSettings, TableSyncConfig};

/// Everything a refresh needs from configuration, in pipeline types.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub policy: ApplyPolicy,
    pub confirm: bool,
    pub silent: bool,
    pub two_step_enabled: bool,
    pub window: WindowOptions,
    pub system_prompt: String,
    pub user_prompt: String,
    pub provider: ProviderSettings,
}

impl EngineConfig {
    /// Whether a planned action list must be confirmed before applying.
    pub fn needs_confirmation(&self) -> bool {
        self.confirm && !self.silent
    }

    /// Silent, unconfirmed copy used for two-step passes.
    pub fn forced(&self) -> Self {
        Self {
            confirm: false,
            silent: true,
            ..self.clone()
        }
    }
}

impl From<&TableSyncConfig> for EngineConfig {
    fn from(config: &TableSyncConfig) -> Self {
        Self {
            policy: ApplyPolicy {
                ignore_delete: config.refresh.ignore_delete,
            },
            confirm: config.refresh.confirm,
            silent: config.refresh.silent,
            two_step_enabled: config.two_step.enabled,
            window: WindowOptions {
                threshold_chars: config.two_step.threshold_chars,
                min_window_chars: config.two_step.min_window_chars,
            },
            system_prompt: config.prompt.system.clone(),
            user_prompt: config.prompt.user.clone(),
            provider: config.provider.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&TableSyncConfig::default())
    }
}
