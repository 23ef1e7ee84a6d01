use std::time::Duration;

use anyhow::Context as _;

use crate::app::scheduler;
use crate::gemini::{self, RetryPolicy};
use crate::pubs;
use crate::tagging;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub gemini_base_url: String,
    pub tag_model: String,
    pub chat_model: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub retry: RetryPolicy,
    /// Cron expression for the daily cache refresh, in local time.
    pub refresh_cron: String,
    pub http_timeout: Duration,
    pub pmc_base_url: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;

        let batch_size = parse_var(&var, "KNOWLEDGE_STATION_BATCH_SIZE")?
            .unwrap_or(tagging::DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            anyhow::bail!("KNOWLEDGE_STATION_BATCH_SIZE must be at least 1");
        }

        let default_retry = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: parse_var(&var, "KNOWLEDGE_STATION_MAX_RETRIES")?
                .unwrap_or(default_retry.max_retries),
            initial_backoff: parse_var(&var, "KNOWLEDGE_STATION_RETRY_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(default_retry.initial_backoff),
        };

        let refresh_cron = var("KNOWLEDGE_STATION_REFRESH_CRON")
            .unwrap_or_else(|| scheduler::DEFAULT_REFRESH_CRON.to_owned());
        scheduler::parse_schedule(&refresh_cron)
            .context("invalid KNOWLEDGE_STATION_REFRESH_CRON")?;

        Ok(Self {
            api_key,
            gemini_base_url: var("GEMINI_BASE_URL")
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_owned()),
            tag_model: var("KNOWLEDGE_STATION_TAG_MODEL")
                .unwrap_or_else(|| tagging::DEFAULT_TAG_MODEL.to_owned()),
            chat_model: var("KNOWLEDGE_STATION_CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
            batch_size,
            batch_delay: parse_var(&var, "KNOWLEDGE_STATION_BATCH_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(tagging::DEFAULT_BATCH_DELAY),
            retry,
            refresh_cron,
            http_timeout: parse_var(&var, "KNOWLEDGE_STATION_HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
            pmc_base_url: var("KNOWLEDGE_STATION_PMC_BASE_URL")
                .unwrap_or_else(|| pubs::DEFAULT_BIOC_BASE_URL.to_owned()),
        })
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("build http client")
    }

    pub fn gemini_client(&self) -> anyhow::Result<gemini::GeminiClient> {
        Ok(
            gemini::GeminiClient::new(self.http_client()?, &self.gemini_base_url, &self.api_key)
                .with_retry_policy(self.retry),
        )
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid {key}: {raw:?}"))
        })
        .transpose()
}
