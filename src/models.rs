//! Data models for news items, keywords and finished digests.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`]: A normalized article record returned by either search backend
//! - [`Language`]: The two supported locales and their localized strings
//! - [`Keyword`] / [`KeywordSet`]: The user's search terms and selection flags
//! - [`Digest`]: One finished generation cycle, as written by the output layer

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of keywords a [`KeywordSet`] accepts.
pub const MAX_KEYWORDS: usize = 10;

/// A normalized news article.
///
/// Every field is a plain string so that loosely structured LLM output can be
/// coerced into this shape without losing items. `date` is ISO-ish; see
/// [`crate::balance::parse_date`] for the accepted formats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub source: String,
}

/// Supported content languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Zh,
    En,
}

const ZH_DOMAINS: &[&str] = &[
    "xinhuanet.com",
    "people.com.cn",
    "chinadaily.com.cn",
    "thepaper.cn",
    "caixin.com",
    "36kr.com",
    "sina.com.cn",
    "163.com",
];

const EN_DOMAINS: &[&str] = &[
    "reuters.com",
    "apnews.com",
    "bbc.co.uk",
    "theverge.com",
    "techcrunch.com",
    "wired.com",
    "arstechnica.com",
    "cnn.com",
];

impl Language {
    /// The language tag used on the wire (`zh` / `en`).
    pub fn tag(self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }

    /// The other supported language.
    pub fn other(self) -> Language {
        match self {
            Language::Zh => Language::En,
            Language::En => Language::Zh,
        }
    }

    /// Name of the language as written in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Zh => "中文",
            Language::En => "English",
        }
    }

    /// Curated news domains searched for this language.
    pub fn domains(self) -> &'static [&'static str] {
        match self {
            Language::Zh => ZH_DOMAINS,
            Language::En => EN_DOMAINS,
        }
    }

    /// Long-form date, e.g. `2025年5月6日` or `May 6, 2025`.
    pub fn long_date(self, date: NaiveDate) -> String {
        match self {
            Language::Zh => format!("{}年{}月{}日", date.year(), date.month(), date.day()),
            Language::En => date.format("%B %-d, %Y").to_string(),
        }
    }

    /// Long-form date including the weekday.
    pub fn long_date_with_weekday(self, date: NaiveDate) -> String {
        match self {
            Language::Zh => format!("{} {}", self.long_date(date), zh_weekday(date.weekday())),
            Language::En => date.format("%A, %B %-d, %Y").to_string(),
        }
    }

    pub fn no_news_found(self) -> &'static str {
        match self {
            Language::Zh => "未找到相关新闻",
            Language::En => "No news found",
        }
    }

    pub fn fetch_failed(self) -> &'static str {
        match self {
            Language::Zh => "获取新闻时发生错误，请稍后重试",
            Language::En => "Error fetching news, please try again later",
        }
    }

    /// Advisory shown when fewer items than requested were found.
    pub fn too_few_news(self, found: usize, target: usize) -> String {
        match self {
            Language::Zh => format!("仅找到 {found} 条相关新闻（目标 {target} 条）"),
            Language::En => format!("Only {found} news items found (target {target})"),
        }
    }

    pub fn report_failed(self) -> &'static str {
        match self {
            Language::Zh => "生成日报格式时发生错误，请稍后重试。",
            Language::En => {
                "An error occurred while formatting the report. Please try again later."
            }
        }
    }
}

fn zh_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "cn" => Ok(Language::Zh),
            "en" | "en-us" => Ok(Language::En),
            other => Err(format!("unsupported language: {other}")),
        }
    }
}

/// A user-supplied search term.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Keyword {
    /// Timestamp-derived identifier.
    pub id: String,
    pub text: String,
    /// Whether this keyword takes part in the next search.
    pub selected: bool,
}

/// Reasons a keyword is refused by [`KeywordSet::add`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeywordError {
    #[error("keyword is empty")]
    Empty,
    #[error("keyword already present: {0}")]
    Duplicate(String),
    #[error("at most 10 keywords are allowed")]
    Full,
}

/// Ordered set of keywords, unique by case-insensitive text, capped at
/// [`MAX_KEYWORDS`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    /// Add a keyword, selected by default.
    ///
    /// The text is trimmed and a single trailing comma is dropped, mirroring
    /// what the input widget does when a comma commits the entry.
    pub fn add(&mut self, text: &str) -> Result<&Keyword, KeywordError> {
        let text = text.trim();
        let text = text.strip_suffix(',').unwrap_or(text).trim();
        if text.is_empty() {
            return Err(KeywordError::Empty);
        }
        if self.is_full() {
            return Err(KeywordError::Full);
        }
        if self.position(text).is_some() {
            return Err(KeywordError::Duplicate(text.to_string()));
        }
        self.keywords.push(Keyword {
            id: Utc::now().timestamp_millis().to_string(),
            text: text.to_string(),
            selected: true,
        });
        Ok(&self.keywords[self.keywords.len() - 1])
    }

    /// Remove a keyword by text. Returns whether anything was removed.
    pub fn remove(&mut self, text: &str) -> bool {
        match self.position(text) {
            Some(i) => {
                self.keywords.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove the most recently added keyword (backspace on an empty input).
    pub fn remove_last(&mut self) -> Option<Keyword> {
        self.keywords.pop()
    }

    /// Flip the selection flag of a keyword, returning the new value.
    pub fn toggle(&mut self, text: &str) -> Option<bool> {
        let i = self.position(text)?;
        let kw = &mut self.keywords[i];
        kw.selected = !kw.selected;
        Some(kw.selected)
    }

    /// Texts of the selected keywords, in insertion order.
    pub fn selected(&self) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| k.selected)
            .map(|k| k.text.clone())
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.keywords.len() >= MAX_KEYWORDS
    }

    fn position(&self, text: &str) -> Option<usize> {
        let needle = text.trim().to_lowercase();
        self.keywords
            .iter()
            .position(|k| k.text.to_lowercase() == needle)
    }
}

/// One finished generation cycle.
///
/// Written to disk by [`crate::outputs::json`] and rendered by
/// [`crate::outputs::markdown`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Digest {
    /// When the digest was generated.
    pub generated_at: DateTime<Utc>,
    pub language: Language,
    /// Keywords that were active when the digest was generated.
    pub keywords: Vec<String>,
    pub news: Vec<NewsItem>,
    /// Markdown report derived from `news` and `keywords`.
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_item_missing_fields_default() {
        let item: NewsItem = serde_json::from_str(r#"{"title": "Only title"}"#).unwrap();
        assert_eq!(item.title, "Only title");
        assert_eq!(item.summary, "");
        assert_eq!(item.url, "");
    }

    #[test]
    fn test_language_serde_tags() {
        assert_eq!(serde_json::to_string(&Language::Zh).unwrap(), "\"zh\"");
        let en: Language = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(en, Language::En);
    }

    #[test]
    fn test_language_from_str() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_other() {
        assert_eq!(Language::Zh.other(), Language::En);
        assert_eq!(Language::En.other(), Language::Zh);
    }

    #[test]
    fn test_long_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        assert_eq!(Language::Zh.long_date(d), "2025年5月6日");
        assert_eq!(Language::En.long_date(d), "May 6, 2025");
        assert_eq!(Language::En.long_date_with_weekday(d), "Tuesday, May 6, 2025");
        assert_eq!(Language::Zh.long_date_with_weekday(d), "2025年5月6日 星期二");
    }

    #[test]
    fn test_keyword_add_trims_and_selects() {
        let mut set = KeywordSet::default();
        let kw = set.add("  AI, ").unwrap();
        assert_eq!(kw.text, "AI");
        assert!(kw.selected);
        assert!(!kw.id.is_empty());
    }

    #[test]
    fn test_keyword_dedupe_is_case_insensitive() {
        let mut set = KeywordSet::default();
        set.add("Rust").unwrap();
        assert_eq!(
            set.add("rust").unwrap_err(),
            KeywordError::Duplicate("rust".to_string())
        );
        assert_eq!(set.selected(), vec!["Rust".to_string()]);
    }

    #[test]
    fn test_keyword_rejects_empty() {
        let mut set = KeywordSet::default();
        assert_eq!(set.add("  , ").unwrap_err(), KeywordError::Empty);
    }

    #[test]
    fn test_keyword_cap() {
        let mut set = KeywordSet::default();
        for i in 0..MAX_KEYWORDS {
            set.add(&format!("kw{i}")).unwrap();
        }
        assert!(set.is_full());
        assert_eq!(set.add("one more").unwrap_err(), KeywordError::Full);
    }

    #[test]
    fn test_keyword_toggle_and_selected() {
        let mut set = KeywordSet::default();
        set.add("AI").unwrap();
        set.add("Rust").unwrap();
        assert_eq!(set.toggle("ai"), Some(false));
        assert_eq!(set.selected(), vec!["Rust".to_string()]);
        assert_eq!(set.toggle("missing"), None);
    }

    #[test]
    fn test_keyword_remove_and_remove_last() {
        let mut set = KeywordSet::default();
        set.add("AI").unwrap();
        set.add("Rust").unwrap();
        set.add("Go").unwrap();
        assert!(set.remove("RUST"));
        assert!(!set.remove("RUST"));
        assert_eq!(set.remove_last().map(|k| k.text), Some("Go".to_string()));
        assert_eq!(set.selected(), vec!["AI".to_string()]);
    }

    #[test]
    fn test_keyword_set_serializes_as_array() {
        let mut set = KeywordSet::default();
        set.add("AI").unwrap();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["text"], "AI");
        assert_eq!(json[0]["selected"], true);
    }

    #[test]
    fn test_digest_serialization() {
        let digest = Digest {
            generated_at: Utc::now(),
            language: Language::En,
            keywords: vec!["AI".to_string()],
            news: vec![],
            report: "# Report".to_string(),
        };
        let json = serde_json::to_string(&digest).unwrap();
        assert!(json.contains("\"language\":\"en\""));
        assert!(json.contains("# Report"));
    }
}
