//! Web-search-augmented chat call used when the news backend comes back empty.

use crate::api::{ChatBackend, ChatRequest};
use crate::error::Result;
use crate::models::{Language, NewsItem};
use crate::shaping::{is_sentinel, shape_news_response};
use chrono::{NaiveDate, Utc};
use tracing::{info, instrument, warn};

const SYSTEM_ZH: &str = "你是一个专业的新闻搜索助手，擅长搜索和整理最新新闻。请始终以JSON格式返回结果，并且只返回近期的新闻。新闻摘要应该简洁明了，突出重点。";

const SYSTEM_EN: &str = "You are a professional news search assistant who finds and organizes the latest news. Always answer in JSON and only return recent news. Summaries must be concise and highlight the key facts.";

/// The search prompt for `keyword` on `today`.
pub fn search_prompt(keyword: &str, language: Language, today: NaiveDate) -> ChatRequest {
    let date = language.long_date(today);
    let (system, user) = match language {
        Language::Zh => (
            SYSTEM_ZH,
            format!(
                "请搜索{date}关于\"{keyword}\"的新闻，要求：\n\
                 1. 使用搜索工具搜索最新新闻，优先{date}发布的新闻\n\
                 2. 语言：中文\n\
                 3. 新闻摘要要求：\n   - 字数控制在100-150字之间\n   - 突出新闻的关键信息和重要细节\n   - 保持客观专业的语气\n\
                 4. 返回格式必须是JSON：{{\"news\": [{{\"title\": \"新闻标题\", \"summary\": \"新闻摘要\", \"url\": \"新闻链接\", \"date\": \"发布日期(ISO 8601)\", \"source\": \"新闻来源\"}}]}}\n\
                 5. 如果找不到相关新闻，返回空数组：{{\"news\": []}}"
            ),
        ),
        Language::En => (
            SYSTEM_EN,
            format!(
                "Search for news about \"{keyword}\" published around {date}. Requirements:\n\
                 1. Use the search tool and prefer articles published on {date}\n\
                 2. Language: English\n\
                 3. Summaries:\n   - 60-100 words\n   - highlight the key facts and important details\n   - keep an objective, professional tone\n\
                 4. The answer must be JSON: {{\"news\": [{{\"title\": \"headline\", \"summary\": \"summary\", \"url\": \"link\", \"date\": \"publication date (ISO 8601)\", \"source\": \"outlet\"}}]}}\n\
                 5. If nothing is found, return an empty array: {{\"news\": []}}"
            ),
        ),
    };
    ChatRequest::new(system, user).with_web_search()
}

/// Ask the chat model to search the web for `keyword`.
///
/// Output goes through [`shape_news_response`]; a parse-failure sentinel is
/// logged and dropped, so unusable output yields an empty list.
///
/// # Errors
///
/// Propagates the chat call's error.
#[instrument(level = "info", skip(chat))]
pub async fn search_with_llm(
    chat: &dyn ChatBackend,
    keyword: &str,
    language: Language,
    today: NaiveDate,
) -> Result<Vec<NewsItem>> {
    let reply = chat.complete(&search_prompt(keyword, language, today)).await?;
    let mut items = shape_news_response(&reply, Utc::now());
    let before = items.len();
    items.retain(|item| !is_sentinel(item));
    if items.len() < before {
        warn!("Model search reply was not usable JSON");
    }
    info!(count = items.len(), "Model search returned news");
    Ok(items)
}
