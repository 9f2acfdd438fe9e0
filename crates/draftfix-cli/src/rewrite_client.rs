//! OpenAI-compatible chat-completions client backing the rewrite capability.

use std::collections::BTreeMap;

use async_trait::async_trait;
use draftfix_core::config::RewriteConfig;
use draftfix_core::rewrite::system_prompt;
use draftfix_core::{ModelTier, PromptStrictness, RewriteCapability, RewriteError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// Rewrite backend that sends each chunk to a chat-completions endpoint.
///
/// No retries happen here: a rate limit or upstream failure fails the
/// attempt and the orchestrator escalates to the next table row.
pub struct HttpRewriter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    models: BTreeMap<String, String>,
    max_tokens: u32,
}

impl HttpRewriter {
    pub fn from_config(config: &RewriteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            models: config.models.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model name for a tier. Unmapped tiers are sent as-is.
    fn model_for<'a>(&'a self, tier: &'a ModelTier) -> &'a str {
        self.models
            .get(tier.as_str())
            .map(String::as_str)
            .unwrap_or(tier.as_str())
    }

    fn build_request(
        &self,
        tier: &ModelTier,
        strictness: PromptStrictness,
        chunk: &str,
    ) -> ChatRequest {
        ChatRequest {
            model: self.model_for(tier).to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt(strictness).to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: chunk.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

/// Map an HTTP status and body to rewritten text.
fn parse_response(status: u16, body: &str) -> Result<String, RewriteError> {
    match status {
        200..=299 => {}
        429 => return Err(RewriteError::RateLimited(truncate(body))),
        _ => return Err(RewriteError::Upstream(format!("HTTP {status}: {}", truncate(body)))),
    }

    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| RewriteError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| RewriteError::Malformed("response carried no choices".to_string()))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

#[async_trait]
impl RewriteCapability for HttpRewriter {
    async fn rewrite(
        &self,
        tier: &ModelTier,
        strictness: PromptStrictness,
        chunk: &str,
    ) -> Result<String, RewriteError> {
        let request = self.build_request(tier, strictness, chunk);
        debug!(model = %request.model, chars = chunk.chars().count(), "rewrite request");

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RewriteError::Upstream(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RewriteError::Upstream(e.to_string()))?;

        parse_response(status, &body)
    }
}
