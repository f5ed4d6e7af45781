//! NewsAPI-style `/everything` search backend.
//!
//! The backend trait exposes the raw response (status code and JSON body) so
//! the diagnostic endpoint can report exactly what came back; [`everything`]
//! interprets that response for the search pipeline.

use crate::config::AppConfig;
use crate::error::{DigestError, Result};
use crate::models::{Language, NewsItem};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Placeholder text NewsAPI puts in articles that were taken down.
const REMOVED: &str = "[Removed]";

/// Query parameters for one `/everything` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub q: String,
    pub language: Language,
    /// Comma-joined into the `domains` parameter; empty means unrestricted.
    pub domains: Vec<String>,
    pub sort_by: String,
    pub page_size: u32,
}

impl NewsQuery {
    /// A query restricted to the curated domains of `language`.
    pub fn localized(keyword: &str, language: Language, page_size: u32) -> Self {
        Self {
            q: keyword.to_string(),
            language,
            domains: language.domains().iter().map(|d| d.to_string()).collect(),
            sort_by: "publishedAt".to_string(),
            page_size,
        }
    }

    /// The canned query used by the diagnostic endpoint.
    pub fn sample() -> Self {
        Self {
            q: "technology".to_string(),
            language: Language::En,
            domains: Vec::new(),
            sort_by: "publishedAt".to_string(),
            page_size: 5,
        }
    }

    /// Query-string pairs, without the API key.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", self.q.clone()),
            ("language", self.language.tag().to_string()),
        ];
        if !self.domains.is_empty() {
            params.push(("domains", self.domains.join(",")));
        }
        params.push(("sortBy", self.sort_by.clone()));
        params.push(("pageSize", self.page_size.to_string()));
        params
    }
}

/// Status code and decoded body of one backend response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

#[async_trait]
pub trait NewsBackend: Send + Sync {
    async fn fetch(&self, query: &NewsQuery) -> Result<RawResponse>;
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsApiArticle {
    #[serde(default)]
    pub source: Option<NewsApiSource>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsApiSource {
    #[serde(default)]
    pub name: Option<String>,
}

fn usable(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != REMOVED)
}

impl NewsApiArticle {
    /// Convert to a [`NewsItem`], or `None` if title, description or url is
    /// missing or a removed placeholder.
    pub fn into_news_item(self) -> Option<NewsItem> {
        let title = usable(&self.title)?.to_string();
        let summary = usable(&self.description)?.to_string();
        let url = usable(&self.url)?.to_string();
        Some(NewsItem {
            title,
            summary,
            url,
            date: self.published_at.unwrap_or_default(),
            source: self.source.and_then(|s| s.name).unwrap_or_default(),
        })
    }
}

/// Run a search and decode its articles.
///
/// # Errors
///
/// [`DigestError::Upstream`] for non-success status codes or an `"error"`
/// status in the body; [`DigestError::Parse`] for an unexpected body shape.
#[instrument(level = "info", skip(backend), fields(q = %query.q, language = %query.language))]
pub async fn everything(backend: &dyn NewsBackend, query: &NewsQuery) -> Result<Vec<NewsApiArticle>> {
    let raw = backend.fetch(query).await?;
    let parsed: NewsApiResponse = serde_json::from_value(raw.body)?;
    if !(200..300).contains(&raw.status) || parsed.status == "error" {
        let message = parsed.message.unwrap_or_else(|| "Unknown error".to_string());
        warn!(status = raw.status, %message, "News search failed");
        return Err(DigestError::upstream(raw.status, message));
    }
    debug!(count = parsed.articles.len(), "News search returned articles");
    Ok(parsed.articles)
}

/// reqwest client for the news-search API.
#[derive(Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            http,
            base_url: config.news_api_base_url.clone(),
            api_key: config.news_api_key.clone(),
        }
    }
}

#[async_trait]
impl NewsBackend for NewsApiClient {
    #[instrument(level = "debug", skip_all, fields(q = %query.q))]
    async fn fetch(&self, query: &NewsQuery) -> Result<RawResponse> {
        let url = format!("{}/everything", self.base_url);
        let mut params = query.params();
        params.push(("apiKey", self.api_key.clone()));

        let response = self.http.get(&url).query(&params).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "status": "error", "message": text }));
        Ok(RawResponse { status, body })
    }
}
