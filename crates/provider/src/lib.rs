//! Completion providers.
//!
//! A provider takes a rendered system/user prompt pair and returns the raw
//! completion text. Everything after that (extraction, repair, validation) is
//! the pipeline's job, so providers never interpret the text.

mod chat_completions;
mod command;

pub use chat_completions::ChatCompletionsProvider;
pub use command::CommandProvider;

use std::future::Future;
use tablesync_runtime_config::{ProviderMode, ProviderSettings};

/// Longest response body excerpt kept in an error.
const BODY_EXCERPT_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: String::new(),
            temperature: 0.0,
            max_tokens: 0,
        }
    }

    pub fn from_settings(
        settings: &ProviderSettings,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    /// System and user prompt joined for providers that take a single text.
    pub fn combined_prompt(&self) -> String {
        if self.system.trim().is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("provider is not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider response had no message content")]
    MissingContent,
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: String,
        stderr: String,
    },
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
}

pub trait CompletionProvider {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// The provider selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredProvider {
    Command(CommandProvider),
    ChatCompletions(ChatCompletionsProvider),
}

impl ConfiguredProvider {
    /// Build the provider named by `settings.mode`. `api_key` is the already
    /// resolved key for the HTTP mode.
    pub fn from_settings(
        settings: &ProviderSettings,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        match settings.mode {
            ProviderMode::Command | ProviderMode::Unknown => {
                Ok(Self::Command(CommandProvider::from_settings(settings)?))
            }
            ProviderMode::Custom => Ok(Self::ChatCompletions(
                ChatCompletionsProvider::from_settings(settings, api_key)?,
            )),
        }
    }
}

impl CompletionProvider for ConfiguredProvider {
    fn name(&self) -> &str {
        match self {
            Self::Command(p) => p.name(),
            Self::ChatCompletions(p) => p.name(),
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        match self {
            Self::Command(p) => p.complete(request).await,
            Self::ChatCompletions(p) => p.complete(request).await,
        }
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LEN;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
