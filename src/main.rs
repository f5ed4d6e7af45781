//! # News Digest
//!
//! A keyword-driven daily news digest. Each keyword is searched in Chinese
//! and English, results are filtered for recency, balanced across the two
//! languages, translated into the reader's language and formatted into a
//! Markdown report.
//!
//! ## Features
//!
//! - Searches NewsAPI `/everything` restricted to curated per-language domains
//! - Falls back to a web-search-augmented chat model when NewsAPI has nothing
//! - Translates keywords and foreign-language results through the chat model
//! - Formats the report from a fixed template or through the chat model
//! - Serves a single-page UI with a small JSON API, or runs once from the CLI
//!
//! ## Usage
//!
//! ```sh
//! news_digest serve --bind 127.0.0.1:3000
//! news_digest generate -k AI -k Rust --language en -m ./markdown
//! ```
//!
//! ## Architecture
//!
//! 1. **Localize**: translate each keyword into the other language
//! 2. **Search**: query both languages concurrently (NewsAPI, then model fallback)
//! 3. **Balance**: recency-filter, merge and translate the foreign picks
//! 4. **Format**: render the report and optionally archive it as JSON/Markdown

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod balance;
mod cli;
mod config;
mod controller;
mod error;
mod models;
mod outputs;
mod search;
mod shaping;
mod translate;
mod utils;
mod web;

use api::build_chat_backend;
use cli::{Cli, Command};
use config::AppConfig;
use controller::Controller;
use models::Language;
use outputs::report::ReportFormatter;
use outputs::{json, markdown};
use search::NewsSearcher;
use search::newsapi::{NewsApiClient, NewsBackend};
use utils::ensure_writable_dir;
use web::{AppState, create_app};

/// The components shared by both run modes.
struct Services {
    news: Arc<dyn NewsBackend>,
    searcher: NewsSearcher,
    formatter: ReportFormatter,
}

impl Services {
    fn build(config: &AppConfig) -> Result<Self, Box<dyn Error>> {
        let http = config.http_client()?;
        let chat = build_chat_backend(http.clone(), config);
        let news: Arc<dyn NewsBackend> = Arc::new(NewsApiClient::new(http, config));
        let searcher = NewsSearcher::new(chat.clone(), news.clone(), config);
        let formatter = ReportFormatter::new(config.report_style, chat);
        Ok(Self {
            news,
            searcher,
            formatter,
        })
    }

    fn controller(&self, config: &AppConfig) -> Arc<Controller> {
        Arc::new(Controller::new(
            self.searcher.clone(),
            self.formatter.clone(),
            config.target,
        ))
    }
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("news_digest starting up");

    let args = Cli::parse();
    debug!(command = ?args.command, "Parsed CLI arguments");

    // Missing keys stop the process here, before anything is served.
    let config = match AppConfig::load(args.config.as_deref(), args.overrides()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(?config, "Configuration loaded");

    let services = Services::build(&config)?;

    match args.command {
        Command::Serve { bind } => serve(&config, services, &bind).await,
        Command::Generate {
            keywords,
            language,
            json_output_dir,
            markdown_output_dir,
        } => {
            generate_once(
                &config,
                services,
                &keywords,
                language,
                json_output_dir.as_deref(),
                markdown_output_dir.as_deref(),
            )
            .await
        }
    }
}

#[instrument(level = "info", skip(config, services))]
async fn serve(config: &AppConfig, services: Services, bind: &str) -> Result<(), Box<dyn Error>> {
    let state = AppState {
        controller: services.controller(config),
        news: services.news,
        searcher: services.searcher,
        formatter: services.formatter,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[instrument(level = "info", skip(config, services))]
async fn generate_once(
    config: &AppConfig,
    services: Services,
    keywords: &[String],
    language: Language,
    json_output_dir: Option<&str>,
    markdown_output_dir: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();

    // Early check: fail before spending any API calls on an unwritable target.
    for dir in json_output_dir.iter().chain(markdown_output_dir.iter()) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let controller = services.controller(config);
    controller.set_language(language).await;
    for keyword in keywords {
        if let Err(e) = controller.add_keyword(keyword).await {
            error!(%keyword, error = %e, "Skipping keyword");
        }
    }

    let digest = controller.generate().await?;
    let snapshot = controller.snapshot().await;
    if let Some(notice) = &snapshot.notice {
        eprintln!("{notice}");
    }

    let Some(digest) = digest else {
        // Upstream trouble is reported, not turned into a failing exit status.
        let message = snapshot.error.unwrap_or_default();
        eprintln!("{message}");
        info!(elapsed = ?start_time.elapsed(), "Finished without a report");
        return Ok(());
    };

    println!("{}", digest.report);

    if let Some(dir) = json_output_dir {
        match json::write_digest(&digest, dir).await {
            Ok(path) => info!(path = %path.display(), "Archived JSON digest"),
            Err(e) => error!(error = %e, "Failed writing JSON digest"),
        }
    }
    if let Some(dir) = markdown_output_dir {
        match markdown::write_report(&digest, dir).await {
            Ok(path) => info!(path = %path.display(), "Archived Markdown report"),
            Err(e) => error!(error = %e, "Failed writing Markdown report"),
        }
    }

    info!(
        count = digest.news.len(),
        elapsed = ?start_time.elapsed(),
        "Run complete"
    );
    Ok(())
}
