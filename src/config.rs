//! Application configuration.
//!
//! Configuration is assembled once at startup from two layers: an optional
//! YAML file and the command line (each flag also reads an environment
//! variable, see [`crate::cli::Cli`]). The command line wins. Construction
//! fails fast when either API key is missing, so no component has to check
//! for keys per call.
//!
//! # YAML file
//!
//! ```yaml
//! llm_api_key: sk-...
//! news_api_key: ...
//! llm_base_url: https://api.moonshot.cn/v1
//! llm_model: moonshot-v1-32k
//! report_style: template
//! target: 10
//! ```

use crate::error::{DigestError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const DEFAULT_LLM_MODEL: &str = "moonshot-v1-32k";
pub const DEFAULT_NEWS_API_BASE_URL: &str = "https://newsapi.org/v2";
pub const DEFAULT_TARGET: usize = 10;
pub const DEFAULT_RECENCY_DAYS: i64 = 3;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Which report formatter is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    /// Fixed Markdown skeleton rendered locally.
    Template,
    /// Strict-format prompt sent to the chat model.
    #[default]
    Llm,
}

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub llm_api_key: Option<String>,
    pub news_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub news_api_base_url: Option<String>,
    pub report_style: Option<ReportStyle>,
    pub target: Option<usize>,
    pub recency_days: Option<i64>,
    pub page_size: Option<u32>,
    pub llm_retries: Option<usize>,
    pub request_timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Read a layer from a YAML file.
    #[instrument(level = "info")]
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(Path::new(path))?;
        let layer: ConfigLayer = serde_yaml::from_str(&raw)
            .map_err(|e| DigestError::Config(format!("invalid config file {path}: {e}")))?;
        info!(path, "Loaded configuration file");
        Ok(layer)
    }

    /// Fill every unset field of `self` from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            llm_api_key: self.llm_api_key.or(lower.llm_api_key),
            news_api_key: self.news_api_key.or(lower.news_api_key),
            llm_base_url: self.llm_base_url.or(lower.llm_base_url),
            llm_model: self.llm_model.or(lower.llm_model),
            news_api_base_url: self.news_api_base_url.or(lower.news_api_base_url),
            report_style: self.report_style.or(lower.report_style),
            target: self.target.or(lower.target),
            recency_days: self.recency_days.or(lower.recency_days),
            page_size: self.page_size.or(lower.page_size),
            llm_retries: self.llm_retries.or(lower.llm_retries),
            request_timeout_secs: self.request_timeout_secs.or(lower.request_timeout_secs),
        }
    }
}

/// Fully resolved configuration, passed to every component at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub llm_api_key: String,
    pub news_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub news_api_base_url: String,
    pub report_style: ReportStyle,
    /// Total number of news items a digest aims for.
    pub target: usize,
    pub recency_days: i64,
    pub page_size: u32,
    /// Extra attempts for failed chat calls. Zero disables retrying.
    pub llm_retries: usize,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm_api_key", &"<redacted>")
            .field("news_api_key", &"<redacted>")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("news_api_base_url", &self.news_api_base_url)
            .field("report_style", &self.report_style)
            .field("target", &self.target)
            .field("recency_days", &self.recency_days)
            .field("page_size", &self.page_size)
            .field("llm_retries", &self.llm_retries)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DigestError::Config(format!("{name} is not configured"))),
    }
}

impl AppConfig {
    /// Resolve a merged layer into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Config`] if an API key is absent or blank, or if
    /// `target` is zero.
    pub fn from_layer(layer: ConfigLayer) -> Result<Self> {
        let target = layer.target.unwrap_or(DEFAULT_TARGET);
        if target == 0 {
            return Err(DigestError::Config("target must be at least 1".to_string()));
        }
        Ok(Self {
            llm_api_key: required(layer.llm_api_key, "LLM_API_KEY")?,
            news_api_key: required(layer.news_api_key, "NEWS_API_KEY")?,
            llm_base_url: layer
                .llm_base_url
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            llm_model: layer.llm_model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            news_api_base_url: layer
                .news_api_base_url
                .unwrap_or_else(|| DEFAULT_NEWS_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            report_style: layer.report_style.unwrap_or_default(),
            target,
            recency_days: layer.recency_days.unwrap_or(DEFAULT_RECENCY_DAYS),
            page_size: layer.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            llm_retries: layer.llm_retries.unwrap_or(0),
            request_timeout: layer.request_timeout_secs.map(Duration::from_secs),
        })
    }

    /// Load the optional YAML file, overlay `overrides`, and resolve.
    pub fn load(config_path: Option<&str>, overrides: ConfigLayer) -> Result<Self> {
        let file = match config_path {
            Some(path) => ConfigLayer::from_yaml_file(path)?,
            None => ConfigLayer::default(),
        };
        Self::from_layer(overrides.or(file))
    }

    /// Build the shared HTTP client.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("news_digest/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_layer(ConfigLayer {
        llm_api_key: Some("llm-key".to_string()),
        news_api_key: Some("news-key".to_string()),
        ..Default::default()
    })
    .unwrap()
}
