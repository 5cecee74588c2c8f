use crate::{CompletionProvider, CompletionRequest, ProviderError, excerpt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tablesync_runtime_config::ProviderSettings;
use tracing::debug;

/// OpenAI-compatible `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_settings(
        settings: &ProviderSettings,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        if settings.base_url.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "provider.base_url is empty".to_string(),
            ));
        }
        Self::new(
            settings.base_url.trim(),
            api_key,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn build_request(request: &CompletionRequest) -> ChatRequest<'_> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.trim().is_empty() {
        messages.push(Message {
            role: "system",
            content: &request.system,
        });
    }
    messages.push(Message {
        role: "user",
        content: &request.user,
    });
    ChatRequest {
        model: &request.model,
        messages,
        max_tokens: (request.max_tokens > 0).then_some(request.max_tokens),
        temperature: request.temperature,
    }
}

/// `choices[0].message.content`, if non-blank.
fn first_content(response: ChatResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ProviderError::MissingContent)
}

impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let url = self.endpoint();
        debug!(%url, model = %request.model, "requesting chat completion");

        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&build_request(request));
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status,
                body: excerpt(&body),
            });
        }

        let body: ChatResponse = resp.json().await?;
        first_content(body)
    }
}
