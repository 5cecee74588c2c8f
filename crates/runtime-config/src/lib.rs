//! Configuration types for tablesync.
//!
//! The CLI reads and writes `tablesync.toml` using these types. Mapping onto
//! the pipeline's own option structs happens in `tablesync-summary`.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "tablesync.toml";

pub const ENV_MODEL: &str = "TABLESYNC_MODEL";
pub const ENV_BASE_URL: &str = "TABLESYNC_BASE_URL";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You maintain a set of tables that track the state of a story.\n\
Reply only with a <tableEdit> block holding a JSON array of edit actions.\n\
Each action is {\"action\": \"insert\"|\"update\"|\"delete\", \"tableIndex\": n, \"rowIndex\": n, \"data\": {\"<column index>\": \"<value>\"}}.\n\
Omit rowIndex for inserts. An insert must fill every column. Return [] when nothing changed.";

pub const DEFAULT_USER_PROMPT: &str = "Current tables:\n$0\n\nRecent conversation:\n$1\n\n\
Update the tables so they reflect the recent conversation.";

/// Top-level configuration (persisted as `tablesync.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TableSyncConfig {
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub two_step: TwoStepSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Suppress deletes outside table 0.
    #[serde(default = "default_false")]
    pub ignore_delete: bool,
    /// Ask before applying a planned action list.
    #[serde(default = "default_true")]
    pub confirm: bool,
    /// Skip the confirmation and keep output to a minimum.
    #[serde(default = "default_false")]
    pub silent: bool,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            ignore_delete: false,
            confirm: true,
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TwoStepSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold_chars")]
    pub threshold_chars: usize,
    #[serde(default)]
    pub min_window_chars: usize,
}

impl Default for TwoStepSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_chars: default_threshold_chars(),
            min_window_chars: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Run a local command, prompt on stdin, completion on stdout.
    #[default]
    #[serde(alias = "cli", alias = "main")]
    Command,
    /// OpenAI-compatible chat-completions endpoint.
    #[serde(alias = "http", alias = "openai")]
    Custom,
    /// Unknown/invalid values are normalized by compatibility fallbacks.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    #[serde(default)]
    pub mode: ProviderMode,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Inline key; prefer `api_key_env`.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            mode: ProviderMode::Command,
            command: default_command(),
            args: Vec::new(),
            base_url: default_base_url(),
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    /// Inline key first, then the configured environment variable.
    pub fn resolve_api_key(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        if self.api_key_env.trim().is_empty() {
            return None;
        }
        env(self.api_key_env.trim()).filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptSettings {
    /// `$0` is replaced with the rendered tables, `$1` with the conversation
    /// window.
    #[serde(default = "default_system_prompt")]
    pub system: String,
    #[serde(default = "default_user_prompt")]
    pub user: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system: default_system_prompt(),
            user: default_user_prompt(),
        }
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_threshold_chars() -> usize {
    4000
}
fn default_command() -> String {
    "claude".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "TABLESYNC_API_KEY".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}
fn default_user_prompt() -> String {
    DEFAULT_USER_PROMPT.to_string()
}

/// Apply compatibility fallbacks after loading raw TOML.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut TableSyncConfig, root: Option<&toml::Value>) -> bool {
    let mut changed = false;

    if config.provider.mode == ProviderMode::Unknown {
        // An endpoint without a command is the only unambiguous signal.
        let has_base_url = root
            .and_then(|r| r.get("provider"))
            .and_then(|p| p.get("base_url"))
            .is_some();
        let has_command = root
            .and_then(|r| r.get("provider"))
            .and_then(|p| p.get("command"))
            .is_some();
        config.provider.mode = if has_base_url && !has_command {
            ProviderMode::Custom
        } else {
            ProviderMode::Command
        };
        changed = true;
    }

    if config.prompt.system.trim().is_empty() {
        config.prompt.system = default_system_prompt();
        changed = true;
    }
    if config.prompt.user.trim().is_empty() {
        config.prompt.user = default_user_prompt();
        changed = true;
    }

    if config.provider.timeout_secs == 0 {
        config.provider.timeout_secs = default_timeout_secs();
        changed = true;
    }

    changed
}

/// Apply `TABLESYNC_MODEL` / `TABLESYNC_BASE_URL` overrides.
/// Returns true when any field was updated.
pub fn apply_env_overrides(
    config: &mut TableSyncConfig,
    env: impl Fn(&str) -> Option<String>,
) -> bool {
    let mut changed = false;
    if let Some(model) = env(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
        config.provider.model = model.trim().to_string();
        changed = true;
    }
    if let Some(base_url) = env(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
        config.provider.base_url = base_url.trim().to_string();
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg: TableSyncConfig = toml::from_str("").expect("parse toml");
        assert_eq!(cfg, TableSyncConfig::default());
        assert!(cfg.refresh.confirm);
        assert!(!cfg.refresh.ignore_delete);
        assert_eq!(cfg.two_step.threshold_chars, 4000);
        assert_eq!(cfg.provider.mode, ProviderMode::Command);
        assert_eq!(cfg.provider.api_key_env, "TABLESYNC_API_KEY");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: TableSyncConfig = toml::from_str(
            r#"
[refresh]
ignore_delete = true

[two_step]
threshold_chars = 1200
"#,
        )
        .expect("parse toml");

        assert!(cfg.refresh.ignore_delete);
        assert!(cfg.refresh.confirm);
        assert_eq!(cfg.two_step.threshold_chars, 1200);
        assert!(cfg.two_step.enabled);
    }

    #[test]
    fn provider_mode_aliases_are_accepted() {
        let cfg: TableSyncConfig = toml::from_str(
            r#"
[provider]
mode = "openai"
"#,
        )
        .expect("parse toml");
        assert_eq!(cfg.provider.mode, ProviderMode::Custom);
    }

    #[test]
    fn apply_compat_fallbacks_normalizes_unknown_mode_and_blank_prompts() {
        let raw = r#"
[provider]
mode = "carrier-pigeon"
base_url = "http://localhost:8080/v1"

[prompt]
system = "  "
"#;
        let mut cfg: TableSyncConfig = toml::from_str(raw).expect("parse toml");
        let root: toml::Value = toml::from_str(raw).expect("parse toml");
        assert_eq!(cfg.provider.mode, ProviderMode::Unknown);

        let changed = apply_compat_fallbacks(&mut cfg, Some(&root));
        assert!(changed);
        assert_eq!(cfg.provider.mode, ProviderMode::Custom);
        assert_eq!(cfg.prompt.system, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn apply_compat_fallbacks_is_noop_for_modern_values() {
        let mut cfg = TableSyncConfig::default();
        let before = cfg.clone();
        assert!(!apply_compat_fallbacks(&mut cfg, None));
        assert_eq!(cfg, before);
    }

    #[test]
    fn env_overrides_replace_model_and_base_url() {
        let mut cfg = TableSyncConfig::default();
        let changed = apply_env_overrides(&mut cfg, |key| match key {
            ENV_MODEL => Some("local-model".to_string()),
            ENV_BASE_URL => Some(" ".to_string()),
            _ => None,
        });
        assert!(changed);
        assert_eq!(cfg.provider.model, "local-model");
        assert_eq!(cfg.provider.base_url, default_base_url());
    }

    #[test]
    fn api_key_prefers_inline_value() {
        let mut settings = ProviderSettings::default();
        let env = |key: &str| (key == "TABLESYNC_API_KEY").then(|| "from-env".to_string());
        assert_eq!(settings.resolve_api_key(env), Some("from-env".to_string()));

        settings.api_key = "inline".to_string();
        assert_eq!(settings.resolve_api_key(env), Some("inline".to_string()));
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let cfg = TableSyncConfig::default();
        let encoded = toml::to_string_pretty(&cfg).expect("serialize config");
        assert!(encoded.contains("[two_step]"));
        let decoded: TableSyncConfig = toml::from_str(&encoded).expect("parse toml");
        assert_eq!(decoded, cfg);
    }
}
