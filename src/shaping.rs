//! Coercion of loosely structured model output into [`NewsItem`] records.
//!
//! Chat models are asked for JSON but return whatever they like: code fences,
//! prose around the payload, missing fields, scheme-less links. Every call
//! site that expects JSON goes through [`parse_with_fallback`], and every item
//! that reaches the rest of the pipeline goes through [`normalize`].

use crate::models::NewsItem;
use crate::utils::{looks_truncated, truncate_for_log};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*").unwrap());
static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static ARRAY_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());

pub const SENTINEL_TITLE: &str = "API Response Error";
pub const SENTINEL_SOURCE: &str = "System";

/// Top-level JSON shape expected from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

impl JsonShape {
    fn span(self) -> &'static Regex {
        match self {
            JsonShape::Object => &*OBJECT_SPAN,
            JsonShape::Array => &*ARRAY_SPAN,
        }
    }
}

/// Remove Markdown code-fence markers (```` ``` ```` and ```` ```json ````).
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Parse model output with a validator, falling back to `default`.
///
/// Steps:
/// 1. strip code fences
/// 2. parse the whole text
/// 3. on failure, parse the first `{...}` (or `[...]`) span
/// 4. if nothing parses, or `validate` rejects the value, return `default(raw)`
pub fn parse_with_fallback<T, V, D>(raw: &str, shape: JsonShape, validate: V, default: D) -> T
where
    V: Fn(Value) -> Option<T>,
    D: FnOnce(&str) -> T,
{
    let cleaned = strip_code_fences(raw);

    let value = match serde_json::from_str::<Value>(&cleaned) {
        Ok(v) => Some(v),
        Err(e) => {
            if looks_truncated(&e) {
                warn!(error = %e, "Model output looks truncated");
            }
            shape
                .span()
                .find(&cleaned)
                .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        }
    };

    match value.and_then(validate) {
        Some(parsed) => parsed,
        None => {
            warn!(
                ?shape,
                preview = %truncate_for_log(raw, 200),
                "Model output did not match the expected JSON; using fallback"
            );
            default(raw)
        }
    }
}

/// Validate or repair a link.
///
/// Absolute `http(s)` links with a host are kept as given. Links with any
/// other scheme are dropped. Scheme-less links get `https://` prepended and
/// are kept if that parses. Unrecoverable links become the empty string.
pub fn repair_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => raw.to_string(),
        Ok(url) => {
            debug!(url = raw, scheme = url.scheme(), "Discarding non-web URL");
            String::new()
        }
        // A scheme separator that still fails to parse is beyond repair.
        Err(e) if raw.contains("://") => {
            debug!(url = raw, error = %e, "Discarding invalid URL");
            String::new()
        }
        Err(_) => {
            let candidate = format!("https://{raw}");
            match Url::parse(&candidate) {
                Ok(_) => candidate,
                Err(e) => {
                    debug!(url = raw, error = %e, "Discarding invalid URL");
                    String::new()
                }
            }
        }
    }
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Default missing fields and repair the link. Idempotent.
pub fn normalize(item: NewsItem, now: DateTime<Utc>) -> NewsItem {
    NewsItem {
        url: repair_url(&item.url),
        date: if item.date.trim().is_empty() {
            timestamp(now)
        } else {
            item.date
        },
        ..item
    }
}

fn string_field(obj: &Value, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Coerce one JSON value into a normalized [`NewsItem`]. Non-objects yield `None`.
pub fn item_from_value(value: &Value, now: DateTime<Utc>) -> Option<NewsItem> {
    if !value.is_object() {
        return None;
    }
    let item = NewsItem {
        title: string_field(value, "title"),
        summary: string_field(value, "summary"),
        url: string_field(value, "url"),
        date: string_field(value, "date"),
        source: string_field(value, "source"),
    };
    Some(normalize(item, now))
}

/// The record substituted when model output cannot be parsed.
pub fn sentinel(raw: &str, now: DateTime<Utc>) -> NewsItem {
    let head: String = raw.chars().take(150).collect();
    NewsItem {
        title: SENTINEL_TITLE.to_string(),
        summary: format!("{head}..."),
        url: String::new(),
        date: timestamp(now),
        source: SENTINEL_SOURCE.to_string(),
    }
}

pub fn is_sentinel(item: &NewsItem) -> bool {
    item.title == SENTINEL_TITLE && item.source == SENTINEL_SOURCE && item.url.is_empty()
}

/// Shape a `{"news": [...]}` reply into items, or a single sentinel record.
pub fn shape_news_response(raw: &str, now: DateTime<Utc>) -> Vec<NewsItem> {
    parse_with_fallback(
        raw,
        JsonShape::Object,
        |value| {
            let news = value.get("news")?.as_array()?;
            Some(
                news.iter()
                    .filter_map(|v| item_from_value(v, now))
                    .collect::<Vec<_>>(),
            )
        },
        |raw| vec![sentinel(raw, now)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_repair_url_keeps_valid() {
        assert_eq!(repair_url("https://example.com/a?b=1"), "https://example.com/a?b=1");
        assert_eq!(repair_url("http://e"), "http://e");
    }

    #[test]
    fn test_repair_url_prepends_scheme() {
        for u in ["example.com", "news.example.org/story/1", "e"] {
            assert_eq!(repair_url(u), format!("https://{u}"));
        }
    }

    #[test]
    fn test_repair_url_discards_invalid() {
        assert_eq!(repair_url(""), "");
        assert_eq!(repair_url("   "), "");
        assert_eq!(repair_url("not a url"), "");
        assert_eq!(repair_url("https://"), "");
    }

    #[test]
    fn test_repair_url_drops_other_schemes() {
        assert_eq!(repair_url("ftp://files.example.com/a"), "");
        assert_eq!(repair_url("mailto:editor@example.com"), "");
        assert_eq!(repair_url("javascript:alert(1)"), "");
        assert_eq!(repair_url("HTTPS://Example.com/a"), "HTTPS://Example.com/a");
    }

    #[test]
    fn test_normalize_defaults_and_is_idempotent() {
        let raw = NewsItem {
            title: "T".to_string(),
            url: "example.com/x".to_string(),
            ..Default::default()
        };
        let once = normalize(raw, now());
        assert_eq!(once.url, "https://example.com/x");
        assert_eq!(once.date, "2025-05-06T12:00:00.000Z");
        assert_eq!(once.summary, "");

        let later = now() + chrono::Duration::hours(5);
        assert_eq!(normalize(once.clone(), later), once);
    }

    #[test]
    fn test_shape_plain_json() {
        let raw = r#"{"news": [{"title": "A", "summary": "S", "url": "a.com", "date": "2025-05-06", "source": "X"}]}"#;
        let items = shape_news_response(raw, now());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://a.com");
        assert_eq!(items[0].date, "2025-05-06");
    }

    #[test]
    fn test_shape_fenced_and_wrapped_json() {
        let raw = "Here you go:\n```json\n{\"news\": [{\"title\": \"A\", \"source\": null}]}\n```\nEnjoy!";
        let items = shape_news_response(raw, now());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "A");
        assert_eq!(items[0].source, "");
    }

    #[test]
    fn test_shape_empty_news() {
        assert!(shape_news_response(r#"{"news": []}"#, now()).is_empty());
    }

    #[test]
    fn test_shape_garbage_yields_sentinel() {
        let raw = "I could not find any news today.";
        let items = shape_news_response(raw, now());
        assert_eq!(items.len(), 1);
        assert!(is_sentinel(&items[0]));
        assert_eq!(items[0].summary, format!("{raw}..."));
    }

    #[test]
    fn test_shape_wrong_schema_yields_sentinel() {
        let items = shape_news_response(r#"{"articles": []}"#, now());
        assert!(is_sentinel(&items[0]));
    }

    #[test]
    fn test_sentinel_summary_is_char_bounded() {
        let raw = "新".repeat(400);
        let s = sentinel(&raw, now());
        assert_eq!(s.summary.chars().count(), 153);
    }

    #[test]
    fn test_parse_with_fallback_array() {
        let out: Vec<i64> = parse_with_fallback(
            "result: [1, 2, 3] done",
            JsonShape::Array,
            |v| {
                v.as_array()
                    .map(|a| a.iter().filter_map(Value::as_i64).collect())
            },
            |_| vec![],
        );
        assert_eq!(out, vec![1, 2, 3]);
    }
}
