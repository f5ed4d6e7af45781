use crate::error::DigestError;
use crate::models::{KeywordError, Language};
use crate::search::newsapi::NewsQuery;
use crate::web::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// A JSON `{"error": ...}` body with a status code.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<DigestError> for ApiError {
    fn from(e: DigestError) -> Self {
        let status = match e {
            DigestError::Busy => StatusCode::CONFLICT,
            DigestError::NoKeywords => StatusCode::BAD_REQUEST,
            DigestError::Upstream { .. } | DigestError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl From<KeywordError> for ApiError {
    fn from(e: KeywordError) -> Self {
        let status = match e {
            KeywordError::Duplicate(_) => StatusCode::CONFLICT,
            KeywordError::Empty | KeywordError::Full => StatusCode::BAD_REQUEST,
        };
        ApiError(status, e.to_string())
    }
}

fn not_found(text: &str) -> ApiError {
    ApiError(StatusCode::NOT_FOUND, format!("unknown keyword: {text}"))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn list_keywords(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.controller.snapshot().await.keywords)
}

#[derive(Debug, Deserialize)]
pub struct NewKeyword {
    pub text: String,
}

pub async fn add_keyword(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewKeyword>,
) -> Result<impl IntoResponse, ApiError> {
    let keyword = state.controller.add_keyword(&body.text).await?;
    Ok((StatusCode::CREATED, Json(keyword)))
}

pub async fn remove_keyword(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.controller.remove_keyword(&text).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&text))
    }
}

pub async fn remove_last_keyword(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .controller
        .remove_last_keyword()
        .await
        .map(Json)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, "no keyword to remove".to_string()))
}

pub async fn toggle_keyword(
    State(state): State<Arc<AppState>>,
    Path(text): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.controller.toggle_keyword(&text).await {
        Some(selected) => Ok(Json(json!({ "text": text, "selected": selected }))),
        None => Err(not_found(&text)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub language: Language,
    pub report_style: crate::config::ReportStyle,
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub language: Language,
}

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(Settings {
        language: state.controller.language().await,
        report_style: state.formatter.style(),
    })
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Json<Settings> {
    state.controller.set_language(update.language).await;
    get_settings(State(state)).await
}

/// Start a generation cycle in the background; clients poll `/api/status`.
#[instrument(level = "info", skip_all)]
pub async fn generate(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let (keywords, language) = state.controller.begin().await?;
    info!(?keywords, %language, "Generation requested");

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.run(keywords, language).await;
    });
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "generating" }))))
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.controller.snapshot().await)
}

pub async fn reset(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.controller.reset().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fire a canned query at the news backend and echo what came back.
///
/// `apiKeyConfigured` is always true here: startup refuses to run without a key.
#[instrument(level = "info", skip_all)]
pub async fn test_news(State(state): State<Arc<AppState>>) -> Response {
    match state.news.fetch(&NewsQuery::sample()).await {
        Ok(raw) => {
            let status = if (200..300).contains(&raw.status) {
                "success"
            } else {
                "error"
            };
            Json(json!({
                "status": status,
                "apiKeyConfigured": true,
                "statusCode": raw.status,
                "data": raw.body,
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "News backend check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "apiKeyConfigured": true,
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Search `AI` in Chinese and format a report, outside the controller state.
#[instrument(level = "info", skip_all)]
pub async fn test_pipeline(State(state): State<Arc<AppState>>) -> Response {
    let language = Language::Zh;
    let keywords = vec!["AI".to_string()];
    match state.searcher.search_localized("AI", language).await {
        Ok(news) => {
            let report = state.formatter.format(&news, &keywords, language).await;
            Json(json!({ "report": report })).into_response()
        }
        Err(e) => {
            error!(error = %e, "Pipeline self-test failed");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, "Test failed".to_string()).into_response()
        }
    }
}
