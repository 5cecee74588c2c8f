use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tablesync_runtime_config::{
    CONFIG_FILE_NAME, TableSyncConfig, apply_compat_fallbacks, apply_env_overrides,
};

/// Get the config directory path (~/.config/tablesync/)
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("tablesync"))
}

/// Canonical config file path, unless overridden on the command line.
pub fn config_path(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config_dir()?.join(CONFIG_FILE_NAME)),
    }
}

/// Default chat store directory (~/.config/tablesync/chats/).
pub fn default_store_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("chats"))
}

fn read_config_doc(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let doc = toml::from_str::<toml::Value>(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    Ok(doc)
}

fn load_config_from_doc(doc: &toml::Value, path: &Path) -> Result<TableSyncConfig> {
    let mut config = doc
        .clone()
        .try_into::<TableSyncConfig>()
        .with_context(|| format!("Invalid config at {}", path.display()))?;
    apply_compat_fallbacks(&mut config, Some(doc));
    Ok(config)
}

/// Load config from disk (defaults when the file is absent), then apply
/// environment overrides.
pub fn load_config(override_path: Option<&Path>) -> Result<TableSyncConfig> {
    let path = config_path(override_path)?;
    let mut config = if path.exists() {
        let doc = read_config_doc(&path)?;
        load_config_from_doc(&doc, &path)?
    } else if override_path.is_some() {
        bail!("Config file not found: {}", path.display());
    } else {
        TableSyncConfig::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Write the default config. Refuses to overwrite an existing file.
pub fn init_config(override_path: Option<&Path>) -> Result<PathBuf> {
    let path = config_path(override_path)?;
    if path.exists() {
        bail!(
            "Config already exists at {} (edit it or remove it first)",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(&TableSyncConfig::default())
        .context("Failed to serialize config")?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(path)
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else {
        let visible: String = secret.chars().take(4).collect();
        format!("{visible}...")
    }
}

/// Print current config.
pub fn show_config(override_path: Option<&Path>) -> Result<()> {
    let path = config_path(override_path)?;
    let config = load_config(override_path)?;

    println!("Config file: {}", path.display());
    if !path.exists() {
        println!("  (not found, showing defaults)");
    }
    println!();
    println!("[refresh]");
    println!("  ignore_delete = {}", config.refresh.ignore_delete);
    println!("  confirm       = {}", config.refresh.confirm);
    println!("  silent        = {}", config.refresh.silent);
    println!();
    println!("[two_step]");
    println!("  enabled          = {}", config.two_step.enabled);
    println!("  threshold_chars  = {}", config.two_step.threshold_chars);
    println!("  min_window_chars = {}", config.two_step.min_window_chars);
    println!();
    println!("[provider]");
    println!("  mode     = {:?}", config.provider.mode);
    println!("  command  = {}", config.provider.command);
    println!("  base_url = {}", config.provider.base_url);
    println!("  model    = {}", config.provider.model);
    println!("  api_key  = {}", mask_secret(&config.provider.api_key));
    println!("  api_key_env = {}", config.provider.api_key_env);
    Ok(())
}
