use std::time::Duration;

use anyhow::Context as _;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";
pub const DEFAULT_MODEL: &str = "qwen3";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRIES: usize = 2;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub retries: usize,
}

impl LlmConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url =
            non_empty("NOVEL_SPLITTER_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let api_key = non_empty("NOVEL_SPLITTER_LLM_API_KEY");
        let model =
            non_empty("NOVEL_SPLITTER_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned());

        let timeout_secs = match non_empty("NOVEL_SPLITTER_LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid NOVEL_SPLITTER_LLM_TIMEOUT_SECS={raw:?}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let retries = match non_empty("NOVEL_SPLITTER_LLM_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("invalid NOVEL_SPLITTER_LLM_RETRIES={raw:?}"))?,
            None => DEFAULT_RETRIES,
        };

        Ok(Self {
            base_url,
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
            retries,
        })
    }

    pub fn with_overrides(
        mut self,
        base_url: Option<&str>,
        model: Option<&str>,
        retries: Option<usize>,
    ) -> Self {
        if let Some(base_url) = base_url {
            self.base_url = base_url.to_owned();
        }
        if let Some(model) = model {
            self.model = model.to_owned();
        }
        if let Some(retries) = retries {
            self.retries = retries;
        }
        self
    }
}
