use crate::{CompletionProvider, CompletionRequest, ProviderError, excerpt};
use std::process::Stdio;
use std::time::Duration;
use tablesync_runtime_config::ProviderSettings;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs a local command with the prompt on stdin and takes stdout as the
/// completion.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        let program = settings.command.trim();
        if program.is_empty() {
            return Err(ProviderError::NotConfigured(
                "provider.command is empty".to_string(),
            ));
        }
        Ok(Self::new(
            program,
            settings.args.clone(),
            Duration::from_secs(settings.timeout_secs.max(1)),
        ))
    }

    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    async fn run(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                command: self.display(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|source| ProviderError::Spawn {
                    command: self.display(),
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ProviderError::Spawn {
                command: self.display(),
                source,
            })?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(ProviderError::CommandFailed {
                command: self.display(),
                code,
                stderr: excerpt(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::MissingContent);
        }
        Ok(text)
    }
}

impl CompletionProvider for CommandProvider {
    fn name(&self) -> &str {
        "command"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let prompt = request.combined_prompt();
        debug!(command = %self.display(), prompt_len = prompt.len(), "running completion command");

        match tokio::time::timeout(self.timeout, self.run(&prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                command: self.display(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}
