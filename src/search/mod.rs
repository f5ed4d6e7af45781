//! Keyword search across the two supported languages.
//!
//! For every keyword the pipeline runs in three phases:
//!
//! 1. **Localize**: translate the keyword into the other language
//! 2. **Search**: query both languages concurrently, each through the news
//!    backend with a model web-search fallback ([`NewsSearcher::search_localized`])
//! 3. **Balance**: recency-filter and merge both lists, then translate the
//!    foreign-language picks into the user's language
//!
//! # Submodules
//!
//! - [`newsapi`]: `/everything` backend and its response types
//! - [`llm`]: web-search-augmented chat fallback

pub mod llm;
pub mod newsapi;

use crate::api::ChatBackend;
use crate::balance::balance_split;
use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{Language, NewsItem};
use crate::shaping::normalize;
use crate::translate::{translate_news, translate_text};
use chrono::{Local, Utc};
use newsapi::{NewsBackend, NewsQuery, everything};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Runs keyword searches against both backends.
#[derive(Clone)]
pub struct NewsSearcher {
    chat: Arc<dyn ChatBackend>,
    news: Arc<dyn NewsBackend>,
    page_size: u32,
    recency_days: i64,
}

impl NewsSearcher {
    pub fn new(chat: Arc<dyn ChatBackend>, news: Arc<dyn NewsBackend>, config: &AppConfig) -> Self {
        Self {
            chat,
            news,
            page_size: config.page_size,
            recency_days: config.recency_days,
        }
    }

    /// Search one keyword in one language.
    ///
    /// Tries the news backend first (restricted to the language's curated
    /// domains). An empty or failed result falls back to a model web search.
    ///
    /// # Returns
    ///
    /// `Ok(vec![])` when the backends answered but nothing usable came back.
    ///
    /// # Errors
    ///
    /// Only when both backends failed outright; the news backend's error is
    /// returned.
    #[instrument(level = "info", skip(self))]
    pub async fn search_localized(&self, keyword: &str, language: Language) -> Result<Vec<NewsItem>> {
        let query = NewsQuery::localized(keyword, language, self.page_size);
        let primary_error = match everything(self.news.as_ref(), &query).await {
            Ok(articles) => {
                let now = Utc::now();
                let items: Vec<NewsItem> = articles
                    .into_iter()
                    .filter_map(|a| a.into_news_item())
                    .map(|item| normalize(item, now))
                    .collect();
                if !items.is_empty() {
                    info!(count = items.len(), "News backend returned news");
                    return Ok(items);
                }
                info!("News backend returned nothing; falling back to model search");
                None
            }
            Err(e) => {
                warn!(error = %e, "News backend failed; falling back to model search");
                Some(e)
            }
        };

        let today = Local::now().date_naive();
        match llm::search_with_llm(self.chat.as_ref(), keyword, language, today).await {
            Ok(items) => Ok(items),
            Err(e) => match primary_error {
                Some(primary) => {
                    error!(error = %e, primary = %primary, "Both search backends failed");
                    Err(primary)
                }
                None => {
                    warn!(error = %e, "Model search failed; no news for this keyword");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Search one keyword in both languages and balance the results.
    ///
    /// The keyword is used as typed for `language` and translated for the
    /// other language. At most `quota` items come back, all in `language`.
    ///
    /// # Errors
    ///
    /// Only when both language searches failed.
    #[instrument(level = "info", skip(self))]
    pub async fn search_keyword(
        &self,
        keyword: &str,
        language: Language,
        quota: usize,
    ) -> Result<Vec<NewsItem>> {
        let foreign = language.other();
        let foreign_keyword = translate_text(self.chat.as_ref(), keyword, foreign).await;

        let (native, translated) = tokio::join!(
            self.search_localized(keyword, language),
            self.search_localized(&foreign_keyword, foreign),
        );

        let (native, translated) = match (native, translated) {
            (Err(e), Err(other)) => {
                error!(error = %e, other = %other, "Searches failed in both languages");
                return Err(e);
            }
            (native, translated) => (native.unwrap_or_default(), translated.unwrap_or_default()),
        };

        let (native, foreign_picks) =
            balance_split(native, translated, quota, Utc::now(), self.recency_days);
        info!(
            native = native.len(),
            foreign = foreign_picks.len(),
            quota,
            "Balanced keyword results"
        );

        let foreign_picks = translate_news(self.chat.as_ref(), foreign_picks, language).await;
        Ok(native.into_iter().chain(foreign_picks).collect())
    }
}
