//! Report formatting.
//!
//! Two interchangeable formatters produce the Markdown digest, selected by
//! [`ReportStyle`]:
//!
//! - **Template**: a fixed skeleton rendered locally by [`render_template`]
//! - **Llm**: a strict-format prompt answered by the chat model
//!   ([`format_with_llm`]); failures yield a localized apology string
//!
//! # Template output
//!
//! ```text
//! # Daily News Report - May 6, 2025
//!
//! ## Summary
//! Today's digest collects 1 news item about: AI.
//!
//! ## News Details
//!
//! 1. **Title** | Source | [link](https://...)
//!    Summary text
//! ```

use crate::api::{ChatBackend, ChatRequest};
use crate::config::ReportStyle;
use crate::models::{Language, NewsItem};
use chrono::{Local, NaiveDate};
use itertools::Itertools;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{error, info, instrument};
use url::Url;

/// Render the deterministic Markdown report.
pub fn render_template(
    news: &[NewsItem],
    keywords: &[String],
    language: Language,
    date: NaiveDate,
) -> String {
    let mut md = String::new();
    let count = news.len();

    match language {
        Language::Zh => {
            writeln!(md, "# {}新闻日报\n", language.long_date(date)).unwrap();
            writeln!(md, "## 概要").unwrap();
            writeln!(
                md,
                "今日共整理与「{}」相关的新闻 {count} 条。\n",
                keywords.iter().join("、")
            )
            .unwrap();
            writeln!(md, "## 新闻详情\n").unwrap();
        }
        Language::En => {
            writeln!(md, "# Daily News Report - {}\n", language.long_date(date)).unwrap();
            writeln!(md, "## Summary").unwrap();
            let noun = if count == 1 { "news item" } else { "news items" };
            writeln!(
                md,
                "Today's digest collects {count} {noun} about: {}.\n",
                keywords.iter().join(", ")
            )
            .unwrap();
            writeln!(md, "## News Details\n").unwrap();
        }
    }

    let link = match language {
        Language::Zh => "链接",
        Language::En => "link",
    };
    for (i, item) in news.iter().enumerate() {
        let mut line = format!("{}. **{}**", i + 1, item.title.trim());
        if !item.source.is_empty() {
            write!(line, " | {}", item.source).unwrap();
        }
        if !item.url.is_empty() {
            write!(line, " | [{link}]({})", item.url).unwrap();
        }
        writeln!(md, "{line}").unwrap();
        if !item.summary.trim().is_empty() {
            writeln!(md, "   {}", item.summary.trim()).unwrap();
        }
        writeln!(md).unwrap();
    }

    md.trim_end().to_string() + "\n"
}

const FORMAT_ZH: &str = "作为新闻编辑，请严格按照以下格式输出新闻：

# [日期]新闻日报

## 概要
[2-3句话总结今日要闻]

## 关键词
[关键词列表]

## 新闻详情

1. **[第一条新闻标题]**
> [新闻内容]
来源：[来源] | [链接]

2. **[第二条新闻标题]**
> [新闻内容]
来源：[来源] | [链接]

[继续用相同格式列出剩余新闻，保持编号连续]

格式要求：
1. 新闻标题必须用粗体（**标题**）
2. 新闻内容必须用引用格式（>）
3. 编号必须从1开始连续
4. 每条新闻必须包含标题、内容、来源和链接
5. 内容要简洁专业";

const FORMAT_EN: &str = "As a news editor, please strictly follow this format:

# Daily News Report - [Date]

## Summary
[2-3 sentences summarizing today's news]

## Keywords
[List of keywords]

## News Details

1. **[First News Title]**
> [News content]
Source: [Source] | [Link]

2. **[Second News Title]**
> [News content]
Source: [Source] | [Link]

[Continue with the same format for remaining news, keeping numbers sequential]

Format requirements:
1. News titles must be in bold (**title**)
2. News content must be in quote format (>)
3. Numbers must be sequential starting from 1
4. Each news must include title, content, source and link
5. Content should be concise and professional";

/// The strict-format prompt for the model formatter.
pub fn report_prompt(
    news: &[NewsItem],
    keywords: &[String],
    language: Language,
    date: NaiveDate,
) -> ChatRequest {
    let today = language.long_date_with_weekday(date);
    let payload = serde_json::to_string(news).unwrap_or_else(|_| "[]".to_string());
    let (system, user) = match language {
        Language::Zh => (
            FORMAT_ZH,
            format!(
                "请将以下新闻整理成日报：\n\n日期：{today}\n关键词：{}\n新闻内容：{payload}\n\n\
                 注意：\n1. 严格按照示例格式\n2. 保持编号连续\n3. 内容简洁专业",
                keywords.iter().join("、")
            ),
        ),
        Language::En => (
            FORMAT_EN,
            format!(
                "Please format these news into a report:\n\nDate: {today}\nKeywords: {}\nNews content: {payload}\n\n\
                 Note:\n1. Strictly follow the example format\n2. Keep numbering sequential\n3. Content should be concise and professional",
                keywords.iter().join(", ")
            ),
        ),
    };
    ChatRequest::new(system, user).with_penalties(0.5, 0.5)
}

/// Ask the chat model to format the report.
///
/// Never fails: any error yields [`Language::report_failed`].
#[instrument(level = "info", skip_all, fields(count = news.len(), %language))]
pub async fn format_with_llm(
    chat: &dyn ChatBackend,
    news: &[NewsItem],
    keywords: &[String],
    language: Language,
    date: NaiveDate,
) -> String {
    match chat.complete(&report_prompt(news, keywords, language, date)).await {
        Ok(report) if !report.trim().is_empty() => {
            info!(bytes = report.len(), "Model formatted report");
            report.trim().to_string()
        }
        Ok(_) => {
            error!("Model returned an empty report");
            language.report_failed().to_string()
        }
        Err(e) => {
            error!(error = %e, "Report formatting failed");
            language.report_failed().to_string()
        }
    }
}

/// Render a Markdown report as HTML for the browser.
///
/// Raw HTML in the source is escaped and links outside http(s) lose their
/// target, so model output cannot inject markup or script.
pub fn render_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let dest_url = if is_web_link(&dest_url) {
                dest_url
            } else {
                CowStr::Borrowed("")
            };
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            })
        }
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn is_web_link(dest: &str) -> bool {
    Url::parse(dest).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// The configured report formatter.
#[derive(Clone)]
pub struct ReportFormatter {
    style: ReportStyle,
    chat: Arc<dyn ChatBackend>,
}

impl ReportFormatter {
    pub fn new(style: ReportStyle, chat: Arc<dyn ChatBackend>) -> Self {
        Self { style, chat }
    }

    pub fn style(&self) -> ReportStyle {
        self.style
    }

    /// Format `news` for `keywords` as of today (local time).
    pub async fn format(&self, news: &[NewsItem], keywords: &[String], language: Language) -> String {
        let today = Local::now().date_naive();
        match self.style {
            ReportStyle::Template => render_template(news, keywords, language, today),
            ReportStyle::Llm => {
                format_with_llm(self.chat.as_ref(), news, keywords, language, today).await
            }
        }
    }
}
