//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. `DIGEST_*` environment variables (`__` separates sections, so
//!    `DIGEST_LLM__API_KEY` maps to `llm.api_key`)
//! 2. the TOML file passed with `--config`
//! 3. built-in defaults

use crate::pipeline::{default_languages, DEFAULT_TOP_N, DEFAULT_WINDOW_MINUTES};
use crate::types::{DigestError, Result};
use crate::utils::url::is_valid_http_url;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "DIGEST_";

/// One week. Also keeps the span inside chrono's `TimeDelta` range.
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;
/// One week. Also keeps the interval in seconds inside `u64`.
pub const MAX_SCHEDULE_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
pub const DEFAULT_SCHEDULE_INTERVAL_MINUTES: u64 = 120;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub window_minutes: i64,
    pub top_n: usize,
    pub allowed_languages: Vec<String>,
    pub schedule_interval_minutes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            top_n: DEFAULT_TOP_N,
            allowed_languages: default_languages(),
            schedule_interval_minutes: DEFAULT_SCHEDULE_INTERVAL_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sample,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub endpoint: Option<String>,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Sample,
            endpoint: None,
            timeout_seconds: 30,
            max_retries: 2,
            user_agent: "timeline-digest/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.moonshot.cn/v1".to_string(),
            model: "kimi-k2".to_string(),
            timeout_ms: 30_000,
            max_retries: 2,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Log,
    Webhook,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub webhook_url: Option<String>,
    pub max_message_chars: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Log,
            webhook_url: None,
            max_message_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointKind {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointConfig {
    pub kind: CheckpointKind,
    pub database_url: String,
    pub key: String,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            kind: CheckpointKind::Memory,
            database_url: "sqlite://digest_state.db".to_string(),
            key: "timeline".to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the optional TOML file, then the environment.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extracts and validates. A named file that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(DigestError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
        }
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.top_n == 0 {
            return Err(DigestError::Config("pipeline.top_n must be at least 1".to_string()));
        }
        if !(0..=MAX_WINDOW_MINUTES).contains(&self.pipeline.window_minutes) {
            return Err(DigestError::Config(format!(
                "pipeline.window_minutes must be between 0 and {}",
                MAX_WINDOW_MINUTES
            )));
        }
        let interval = self.pipeline.schedule_interval_minutes;
        if !(1..=MAX_SCHEDULE_INTERVAL_MINUTES).contains(&interval) {
            return Err(DigestError::Config(format!(
                "pipeline.schedule_interval_minutes must be between 1 and {}",
                MAX_SCHEDULE_INTERVAL_MINUTES
            )));
        }

        if self.source.kind == SourceKind::Http {
            match self.source.endpoint.as_deref() {
                Some(endpoint) if is_valid_http_url(endpoint) => {}
                Some(endpoint) => {
                    return Err(DigestError::Config(format!(
                        "source.endpoint is not an http(s) URL: {}",
                        endpoint
                    )))
                }
                None => {
                    return Err(DigestError::Config(
                        "source.kind = \"http\" requires source.endpoint".to_string(),
                    ))
                }
            }
        }

        if self.sink.kind == SinkKind::Webhook {
            match self.sink.webhook_url.as_deref() {
                Some(url) if is_valid_http_url(url) => {}
                Some(url) => {
                    return Err(DigestError::Config(format!(
                        "sink.webhook_url is not an http(s) URL: {}",
                        url
                    )))
                }
                None => {
                    return Err(DigestError::Config(
                        "sink.kind = \"webhook\" requires sink.webhook_url".to_string(),
                    ))
                }
            }
        }
        if self.sink.max_message_chars == 0 {
            return Err(DigestError::Config(
                "sink.max_message_chars must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Interval between scheduled runs.
    pub fn schedule_interval(&self) -> Result<Duration> {
        self.pipeline
            .schedule_interval_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                DigestError::Config("pipeline.schedule_interval_minutes is too large".to_string())
            })
    }

    /// Copy that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.is_configured() {
            copy.llm.api_key = "***".to_string();
        }
        copy
    }
}
