//! Presentation controller.
//!
//! Owns the user-facing state (keyword set, output language, generation
//! phase, progress, results) and drives one generation cycle at a time.
//!
//! # Phases
//!
//! ```text
//! Idle ──generate──▶ Generating ──▶ Success
//!   ▲                     │
//!   └──────reset──────────┴───────▶ Error
//! ```
//!
//! Starting a new generation clears the previous news, report and messages.
//! Progress is derived from completed keyword fetches:
//!
//! | Stage       | Progress                        |
//! |-------------|---------------------------------|
//! | idle, error | 0                               |
//! | started     | 5                               |
//! | fetching    | `5 + 80 * completed / total`    |
//! | formatting  | 90                              |
//! | success     | 100                             |

use crate::balance::sort_newest_first;
use crate::error::{DigestError, Result};
use crate::models::{Digest, Keyword, KeywordError, KeywordSet, Language, NewsItem};
use crate::outputs::report::{ReportFormatter, render_html};
use crate::search::NewsSearcher;
use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Generating,
    Success,
    Error,
}

/// Everything a client needs to render the current state.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub progress: u8,
    pub language: Language,
    pub keywords: KeywordSet,
    pub active_keywords: Vec<String>,
    pub news: Vec<NewsItem>,
    pub report: Option<String>,
    /// The report rendered as HTML.
    pub report_html: Option<String>,
    /// Fatal message of the last cycle.
    pub error: Option<String>,
    /// Non-fatal advisory, e.g. fewer news items than requested.
    pub notice: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    progress: u8,
    language: Language,
    keywords: KeywordSet,
    news: Vec<NewsItem>,
    report: Option<String>,
    error: Option<String>,
    notice: Option<String>,
}

impl State {
    fn clear_results(&mut self) {
        self.news.clear();
        self.report = None;
        self.error = None;
        self.notice = None;
    }

    fn fail(&mut self, message: &str) {
        self.phase = Phase::Error;
        self.progress = 0;
        self.error = Some(message.to_string());
    }
}

/// Progress while `completed` of `total` keyword fetches are done.
fn fetch_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 5;
    }
    (5 + 80 * completed.min(total) / total) as u8
}

/// Per-keyword share of the overall target; never zero.
pub fn keyword_quota(target: usize, keywords: usize) -> usize {
    (target / keywords.max(1)).max(1)
}

pub struct Controller {
    state: RwLock<State>,
    searcher: NewsSearcher,
    formatter: ReportFormatter,
    target: usize,
}

impl Controller {
    pub fn new(searcher: NewsSearcher, formatter: ReportFormatter, target: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            searcher,
            formatter,
            target,
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let s = self.state.read().await;
        Snapshot {
            phase: s.phase,
            progress: s.progress,
            language: s.language,
            keywords: s.keywords.clone(),
            active_keywords: s.keywords.selected(),
            news: s.news.clone(),
            report: s.report.clone(),
            report_html: s.report.as_deref().map(render_html),
            error: s.error.clone(),
            notice: s.notice.clone(),
        }
    }

    pub async fn add_keyword(&self, text: &str) -> std::result::Result<Keyword, KeywordError> {
        let mut s = self.state.write().await;
        s.keywords.add(text).cloned()
    }

    pub async fn remove_keyword(&self, text: &str) -> bool {
        self.state.write().await.keywords.remove(text)
    }

    pub async fn remove_last_keyword(&self) -> Option<Keyword> {
        self.state.write().await.keywords.remove_last()
    }

    /// Flip a keyword's selection; `None` if it does not exist.
    pub async fn toggle_keyword(&self, text: &str) -> Option<bool> {
        self.state.write().await.keywords.toggle(text)
    }

    pub async fn language(&self) -> Language {
        self.state.read().await.language
    }

    pub async fn set_language(&self, language: Language) {
        self.state.write().await.language = language;
    }

    /// Enter the generating phase.
    ///
    /// # Returns
    ///
    /// The selected keywords and the output language for [`Controller::run`].
    ///
    /// # Errors
    ///
    /// [`DigestError::Busy`] while a cycle is running,
    /// [`DigestError::NoKeywords`] when nothing is selected.
    pub async fn begin(&self) -> Result<(Vec<String>, Language)> {
        let mut s = self.state.write().await;
        if s.phase == Phase::Generating {
            return Err(DigestError::Busy);
        }
        let keywords = s.keywords.selected();
        if keywords.is_empty() {
            return Err(DigestError::NoKeywords);
        }
        s.clear_results();
        s.phase = Phase::Generating;
        s.progress = 5;
        Ok((keywords, s.language))
    }

    async fn set_progress(&self, progress: u8) {
        let mut s = self.state.write().await;
        if s.phase == Phase::Generating && progress > s.progress {
            s.progress = progress;
        }
    }

    async fn fail(&self, message: &str) {
        self.state.write().await.fail(message);
    }

    /// Run one generation cycle started by [`Controller::begin`].
    ///
    /// Never fails: outcomes land in the controller state. Returns the digest
    /// on success.
    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, keywords: Vec<String>, language: Language) -> Option<Digest> {
        let total = keywords.len();
        let quota = keyword_quota(self.target, total);
        info!(total, quota, target = self.target, "Starting generation");

        let completed = AtomicUsize::new(0);
        let fetches = keywords.iter().map(|keyword| {
            let completed = &completed;
            async move {
                let items = self.searcher.search_keyword(keyword, language, quota).await?;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                self.set_progress(fetch_progress(done, total)).await;
                Ok::<_, DigestError>(items.into_iter().take(quota).collect::<Vec<_>>())
            }
        });

        let per_keyword = match try_join_all(fetches).await {
            Ok(lists) => lists,
            Err(e) => {
                error!(error = %e, "Keyword search failed");
                self.fail(language.fetch_failed()).await;
                return None;
            }
        };

        let mut news: Vec<NewsItem> = per_keyword.into_iter().flatten().collect();
        sort_newest_first(&mut news);
        news.truncate(self.target);

        if news.is_empty() {
            warn!("No news found for any keyword");
            self.fail(language.no_news_found()).await;
            return None;
        }

        {
            let mut s = self.state.write().await;
            if news.len() < self.target {
                s.notice = Some(language.too_few_news(news.len(), self.target));
            }
            s.news = news.clone();
            s.progress = 90;
        }

        let report = self.formatter.format(&news, &keywords, language).await;

        let mut s = self.state.write().await;
        s.report = Some(report.clone());
        s.phase = Phase::Success;
        s.progress = 100;
        info!(count = news.len(), "Generation finished");

        Some(Digest {
            generated_at: Utc::now(),
            language,
            keywords,
            news,
            report,
        })
    }

    /// [`Controller::begin`] followed by [`Controller::run`].
    pub async fn generate(&self) -> Result<Option<Digest>> {
        let (keywords, language) = self.begin().await?;
        Ok(self.run(keywords, language).await)
    }

    /// Return to idle, dropping results. Keywords and language are kept.
    ///
    /// # Errors
    ///
    /// [`DigestError::Busy`] while a cycle is running.
    pub async fn reset(&self) -> Result<()> {
        let mut s = self.state.write().await;
        if s.phase == Phase::Generating {
            return Err(DigestError::Busy);
        }
        s.clear_results();
        s.phase = Phase::Idle;
        s.progress = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fakes::ScriptedChat;
    use crate::config::{ReportStyle, test_config};
    use crate::search::newsapi::fakes::FixedNews;
    use chrono::{Duration, SecondsFormat};
    use serde_json::json;
    use std::sync::Arc;

    fn controller(chat: Arc<ScriptedChat>, news: Arc<FixedNews>) -> Controller {
        let config = test_config();
        let searcher = NewsSearcher::new(chat.clone(), news, &config);
        let formatter = ReportFormatter::new(ReportStyle::Template, chat);
        Controller::new(searcher, formatter, config.target)
    }

    fn recent_articles(n: usize) -> serde_json::Value {
        let articles: Vec<_> = (0..n)
            .map(|i| {
                json!({
                    "title": format!("t{i}"),
                    "description": "d",
                    "url": format!("https://n.example/{i}"),
                    "publishedAt": (Utc::now() - Duration::hours(i as i64 + 1))
                        .to_rfc3339_opts(SecondsFormat::Secs, true),
                    "source": {"name": "S"},
                })
            })
            .collect();
        json!(articles)
    }

    #[test]
    fn test_fetch_progress() {
        assert_eq!(fetch_progress(0, 4), 5);
        assert_eq!(fetch_progress(2, 4), 45);
        assert_eq!(fetch_progress(4, 4), 85);
    }

    #[test]
    fn test_keyword_quota() {
        assert_eq!(keyword_quota(10, 3), 3);
        assert_eq!(keyword_quota(10, 1), 10);
        assert_eq!(keyword_quota(10, 20), 1);
    }

    #[tokio::test]
    async fn test_begin_refuses_without_keywords() {
        let c = controller(Arc::new(ScriptedChat::ok(&[])), Arc::new(FixedNews::articles(json!([]))));
        assert!(matches!(c.begin().await, Err(DigestError::NoKeywords)));

        c.add_keyword("AI").await.unwrap();
        c.toggle_keyword("ai").await;
        assert!(matches!(c.generate().await, Err(DigestError::NoKeywords)));
    }

    #[tokio::test]
    async fn test_busy_refusal() {
        let c = controller(Arc::new(ScriptedChat::ok(&[])), Arc::new(FixedNews::articles(json!([]))));
        c.add_keyword("AI").await.unwrap();
        c.begin().await.unwrap();
        assert!(matches!(c.generate().await, Err(DigestError::Busy)));
        assert!(matches!(c.reset().await, Err(DigestError::Busy)));
        assert_eq!(c.snapshot().await.progress, 5);
    }

    #[tokio::test]
    async fn test_no_news_found() {
        let chat = Arc::new(ScriptedChat::ok(&[
            "artificial intelligence",
            r#"{"news": []}"#,
            r#"{"news": []}"#,
        ]));
        let c = controller(chat, Arc::new(FixedNews::articles(json!([]))));
        c.add_keyword("AI").await.unwrap();

        assert!(c.generate().await.unwrap().is_none());
        let snap = c.snapshot().await;
        assert_eq!(snap.phase, Phase::Error);
        assert_eq!(snap.progress, 0);
        assert!(snap.news.is_empty());
        assert!(snap.report.is_none());
        assert_eq!(snap.error.as_deref(), Some("未找到相关新闻"));
    }

    #[tokio::test]
    async fn test_short_result_adds_notice_and_still_formats() {
        // Translation calls fail, so the keyword and the foreign picks stay as-is.
        let chat = Arc::new(ScriptedChat::ok(&[]));
        let c = controller(chat, Arc::new(FixedNews::articles(recent_articles(2))));
        c.set_language(Language::En).await;
        c.add_keyword("AI").await.unwrap();

        let digest = c.generate().await.unwrap().unwrap();
        assert_eq!(digest.news.len(), 4);
        assert_eq!(digest.keywords, vec!["AI"]);

        let snap = c.snapshot().await;
        assert_eq!(snap.phase, Phase::Success);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.notice.as_deref(), Some("Only 4 news items found (target 10)"));
        assert!(snap.error.is_none());
        let report = snap.report.unwrap();
        assert!(report.contains("**t0**"));
        assert!(report.contains("(https://n.example/0)"));
        let html = snap.report_html.unwrap();
        assert!(html.contains("<strong>t0</strong>"));
        assert!(html.contains("<a href=\"https://n.example/0\">"));
    }

    #[tokio::test]
    async fn test_results_are_newest_first_and_capped() {
        let chat = Arc::new(ScriptedChat::ok(&[]));
        let c = controller(chat, Arc::new(FixedNews::articles(recent_articles(10))));
        c.add_keyword("AI").await.unwrap();
        c.add_keyword("Rust").await.unwrap();

        let digest = c.generate().await.unwrap().unwrap();
        assert_eq!(digest.news.len(), 10);
        let snap = c.snapshot().await;
        assert!(snap.notice.is_none());
        assert_eq!(snap.news[0].title, "t0");
    }

    #[tokio::test]
    async fn test_fetch_failure_sets_generic_error() {
        let c = controller(Arc::new(ScriptedChat::ok(&[])), Arc::new(FixedNews::failing("down")));
        c.add_keyword("AI").await.unwrap();

        assert!(c.generate().await.unwrap().is_none());
        let snap = c.snapshot().await;
        assert_eq!(snap.phase, Phase::Error);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.error.as_deref(), Some(Language::Zh.fetch_failed()));
    }

    #[tokio::test]
    async fn test_reset_clears_results_but_keeps_keywords() {
        let c = controller(
            Arc::new(ScriptedChat::ok(&[])),
            Arc::new(FixedNews::articles(recent_articles(3))),
        );
        c.add_keyword("AI").await.unwrap();
        c.generate().await.unwrap();

        c.reset().await.unwrap();
        let snap = c.snapshot().await;
        assert_eq!(snap.phase, Phase::Idle);
        assert_eq!(snap.progress, 0);
        assert!(snap.news.is_empty());
        assert!(snap.report.is_none());
        assert_eq!(snap.active_keywords, vec!["AI"]);
    }

    #[tokio::test]
    async fn test_keyword_editing() {
        let c = controller(Arc::new(ScriptedChat::ok(&[])), Arc::new(FixedNews::articles(json!([]))));
        c.add_keyword("AI").await.unwrap();
        c.add_keyword("Rust,").await.unwrap();
        assert_eq!(
            c.add_keyword("ai").await,
            Err(KeywordError::Duplicate("ai".to_string()))
        );
        assert_eq!(c.toggle_keyword("AI").await, Some(false));
        assert_eq!(c.snapshot().await.active_keywords, vec!["Rust"]);
        assert_eq!(c.remove_last_keyword().await.map(|k| k.text), Some("Rust".to_string()));
        assert!(c.remove_keyword("AI").await);
        assert_eq!(serde_json::to_value(&c.snapshot().await.keywords).unwrap(), json!([]));
    }
}
