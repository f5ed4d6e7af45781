//! Command-line interface definitions for News Digest.
//!
//! Global options configure the backends; each can also come from an
//! environment variable or from the YAML file given with `--config`.
//! Flags and environment variables override the file.

use crate::config::{ConfigLayer, ReportStyle};
use crate::models::Language;
use clap::{Parser, Subcommand};

/// Command-line arguments for the News Digest application.
///
/// # Examples
///
/// ```sh
/// # Serve the web UI
/// news_digest serve --bind 0.0.0.0:3000
///
/// # One-shot report for two keywords, archived to disk
/// news_digest generate -k AI -k Rust --language en -m ./markdown -j ./json
///
/// # Keys from a YAML file instead of the environment
/// news_digest --config config.yaml serve
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// API key of the OpenAI-compatible chat endpoint
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true, global = true)]
    pub llm_api_key: Option<String>,

    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true, global = true)]
    pub news_api_key: Option<String>,

    /// Base URL of the chat endpoint
    #[arg(long, env = "LLM_BASE_URL", global = true)]
    pub llm_base_url: Option<String>,

    /// Chat model name
    #[arg(long, env = "LLM_MODEL", global = true)]
    pub llm_model: Option<String>,

    /// Base URL of the NewsAPI service
    #[arg(long, env = "NEWS_API_BASE_URL", global = true)]
    pub news_api_base_url: Option<String>,

    /// Report formatter
    #[arg(long, env = "REPORT_STYLE", value_enum, global = true)]
    pub report_style: Option<ReportStyle>,

    /// Number of news items per report
    #[arg(long, global = true)]
    pub target: Option<usize>,

    /// Only keep news published within this many days
    #[arg(long, global = true)]
    pub recency_days: Option<i64>,

    /// Articles requested per NewsAPI query
    #[arg(long, global = true)]
    pub page_size: Option<u32>,

    /// Retries for failed chat calls (0 disables retrying)
    #[arg(long, global = true)]
    pub llm_retries: Option<usize>,

    /// Timeout for each outbound HTTP request, in seconds
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the web UI and JSON API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "BIND_ADDR", default_value = "127.0.0.1:3000")]
        bind: String,
    },
    /// Generate one report and print it
    Generate {
        /// Keyword to search for (repeatable)
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,

        /// Output language (zh or en)
        #[arg(short, long, default_value = "zh")]
        language: Language,

        /// Output directory for the JSON digest
        #[arg(short, long)]
        json_output_dir: Option<String>,

        /// Output directory for the Markdown report
        #[arg(short, long)]
        markdown_output_dir: Option<String>,
    },
}

impl Cli {
    /// The configuration layer given on the command line or in the environment.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            llm_api_key: self.llm_api_key.clone(),
            news_api_key: self.news_api_key.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_model: self.llm_model.clone(),
            news_api_base_url: self.news_api_base_url.clone(),
            report_style: self.report_style,
            target: self.target,
            recency_days: self.recency_days,
            page_size: self.page_size,
            llm_retries: self.llm_retries,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}
