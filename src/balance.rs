//! Recency filtering and merging of the two per-language result lists.
//!
//! The balancer is a greedy fill, not an interleave: with `half = target / 2`,
//! a side that has fewer than `half` recent items contributes all of them and
//! the other side fills the rest. Otherwise each side contributes its first
//! `half` items in the order the search backend returned them.

use crate::models::NewsItem;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Reverse;
use tracing::debug;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse the date formats seen in backend and model output.
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD[ T]HH:MM[:SS]` (assumed UTC) and
/// bare `YYYY-MM-DD` / `YYYY/MM/DD` (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    ["%Y-%m-%d", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Keep items dated within `[now - window_days, now]`. Unparsable dates are dropped.
pub fn filter_recent(items: Vec<NewsItem>, now: DateTime<Utc>, window_days: i64) -> Vec<NewsItem> {
    let earliest = now - Duration::days(window_days);
    let before = items.len();
    let kept: Vec<NewsItem> = items
        .into_iter()
        .filter(|item| match parse_date(&item.date) {
            Some(d) => earliest <= d && d <= now,
            None => false,
        })
        .collect();
    debug!(before, after = kept.len(), window_days, "Applied recency filter");
    kept
}

/// Pick from two already-filtered lists toward `target` items, keeping the
/// picks of each side apart.
pub fn merge_split(
    a: Vec<NewsItem>,
    b: Vec<NewsItem>,
    target: usize,
) -> (Vec<NewsItem>, Vec<NewsItem>) {
    let half = target / 2;
    // A short side gives everything it has and the other side tops up.
    let take_b = (target - half.min(a.len())).min(b.len());
    let take_a = (target - take_b).min(a.len());

    (
        a.into_iter().take(take_a).collect(),
        b.into_iter().take(take_b).collect(),
    )
}

/// Recency-filter both sides, then pick toward `target` items with
/// [`merge_split`].
///
/// The combined length is `min(target, recent_a + recent_b)` and depends only
/// on the inputs and `now`.
pub fn balance_split(
    a: Vec<NewsItem>,
    b: Vec<NewsItem>,
    target: usize,
    now: DateTime<Utc>,
    window_days: i64,
) -> (Vec<NewsItem>, Vec<NewsItem>) {
    let a = filter_recent(a, now, window_days);
    let b = filter_recent(b, now, window_days);
    debug!(recent_a = a.len(), recent_b = b.len(), target, "Balancing result lists");
    merge_split(a, b, target)
}

/// Sort newest first. Items with unparsable dates keep their relative order
/// at the end.
pub fn sort_newest_first(items: &mut [NewsItem]) {
    items.sort_by_key(|item| Reverse(parse_date(&item.date)));
}
