//! Translation of keywords and result sets through the chat model.
//!
//! Both helpers are best-effort: a failed call returns the input unchanged.

use crate::api::{ChatBackend, ChatRequest};
use crate::models::{Language, NewsItem};
use crate::shaping::{JsonShape, parse_with_fallback};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

fn text_prompt(text: &str, target: Language) -> ChatRequest {
    let system = format!(
        "You are a translator. Translate the user's text into {}. \
         Return ONLY the translated text, nothing else. \
         Keep proper nouns, product names and acronyms as they are.",
        target.display_name()
    );
    ChatRequest::new(system, text)
}

/// Translate one short text (typically a keyword) into `target`.
///
/// Returns the trimmed translation, or `text` itself if the call fails or the
/// model answers with nothing.
#[instrument(level = "info", skip(chat))]
pub async fn translate_text(chat: &dyn ChatBackend, text: &str, target: Language) -> String {
    match chat.complete(&text_prompt(text, target)).await {
        Ok(reply) => {
            let reply = reply.trim();
            if reply.is_empty() {
                warn!("Empty translation; keeping original text");
                text.to_string()
            } else {
                debug!(translated = reply, "Translated text");
                reply.to_string()
            }
        }
        Err(e) => {
            warn!(error = %e, "Translation failed; keeping original text");
            text.to_string()
        }
    }
}

#[derive(Serialize)]
struct TranslatableFields<'a> {
    title: &'a str,
    summary: &'a str,
}

fn batch_prompt(items: &[NewsItem], target: Language) -> ChatRequest {
    let fields: Vec<TranslatableFields<'_>> = items
        .iter()
        .map(|i| TranslatableFields {
            title: &i.title,
            summary: &i.summary,
        })
        .collect();
    let payload = serde_json::to_string(&fields).unwrap_or_else(|_| "[]".to_string());
    let system = format!(
        "You are a news translator. Translate the \"title\" and \"summary\" of every \
         element of the JSON array into {}. Return ONLY a JSON array with the same \
         number of elements in the same order, each element having exactly the keys \
         \"title\" and \"summary\".",
        target.display_name()
    );
    ChatRequest::new(system, payload)
}

fn translated_text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Translate the title and summary of every item into `target` with one call.
///
/// `url`, `date` and `source` always come from the input. Items are paired
/// with the model's array by position; if the array is shorter, only the
/// paired prefix is returned. If the call or the parse fails, `items` is
/// returned unchanged.
#[instrument(level = "info", skip_all, fields(count = items.len(), %target))]
pub async fn translate_news(
    chat: &dyn ChatBackend,
    items: Vec<NewsItem>,
    target: Language,
) -> Vec<NewsItem> {
    if items.is_empty() {
        return items;
    }

    let reply = match chat.complete(&batch_prompt(&items, target)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Batch translation failed; keeping originals");
            return items;
        }
    };

    let translated: Option<Vec<Value>> = parse_with_fallback(
        &reply,
        JsonShape::Array,
        |v| v.as_array().cloned().map(Some),
        |_| None,
    );
    let Some(translated) = translated else {
        return items;
    };

    if translated.len() != items.len() {
        warn!(
            expected = items.len(),
            got = translated.len(),
            "Translated array length differs; pairing by position"
        );
    }

    let out: Vec<NewsItem> = items
        .into_iter()
        .zip(translated.iter())
        .map(|(original, t)| NewsItem {
            title: translated_text(t, "title").unwrap_or(original.title),
            summary: translated_text(t, "summary").unwrap_or(original.summary),
            url: original.url,
            date: original.date,
            source: original.source,
        })
        .collect();
    info!(count = out.len(), "Translated news batch");
    out
}
