use std::time::Duration;

use anyhow::Context as _;

use crate::config::LlmConfig;
use crate::confirm::CompletionService;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

/// OpenAI-compatible chat completion client.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    retries: usize,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            endpoint: chat_completions_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retries: config.retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl CompletionService for OpenAiChat {
    async fn complete(&self, instructions: &str, input: &str) -> anyhow::Result<String> {
        let attempts = self.retries.saturating_add(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF * attempt as u32).await;
            }
            match chat_completion_text(
                &self.client,
                &self.endpoint,
                self.api_key.as_deref(),
                &self.model,
                instructions,
                input,
            )
            .await
            {
                Ok(text) => return Ok(text),
                Err(err) => {
                    tracing::debug!(
                        attempt = attempt + 1,
                        attempts = attempts,
                        error = %format!("{err:#}"),
                        "chat completion failed"
                    );
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow::anyhow!("no attempts made"))
            .context(format!("chat completion failed after {attempts} attempt(s)")))
    }
}

pub async fn chat_completion_text(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    model: &str,
    instructions: &str,
    input: &str,
) -> anyhow::Result<String> {
    let body = serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": instructions },
            { "role": "user", "content": input },
        ],
        "temperature": 0.0,
    });

    let mut request = client.post(endpoint).json(&body);
    if let Some(api_key) = api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("POST {endpoint}"))?;

    let status = response.status();
    let raw = response.text().await.context("read chat completion body")?;
    if !status.is_success() {
        let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
        anyhow::bail!("LLM API error ({status}): {message}");
    }

    let value: serde_json::Value =
        serde_json::from_str(&raw).context("parse chat completion response")?;
    extract_message_content(&value).context("extract message content")
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_message_content(value: &serde_json::Value) -> anyhow::Result<String> {
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing `choices[0].message.content` in response"))?;
    Ok(content.to_owned())
}
