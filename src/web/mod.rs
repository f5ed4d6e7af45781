//! HTTP surface: the single-page UI plus a small JSON API over the
//! [`crate::controller::Controller`].

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::index))
        .route(
            "/api/keywords",
            get(handlers::list_keywords)
                .post(handlers::add_keyword)
                .delete(handlers::remove_last_keyword),
        )
        .route("/api/keywords/:text", delete(handlers::remove_keyword))
        .route("/api/keywords/:text/toggle", post(handlers::toggle_keyword))
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )
        .route("/api/generate", post(handlers::generate))
        .route("/api/status", get(handlers::status))
        .route("/api/reset", post(handlers::reset))
        .route("/api/test-news", get(handlers::test_news))
        .route("/api/test", get(handlers::test_pipeline))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fakes::ScriptedChat;
    use crate::config::{ReportStyle, test_config};
    use crate::controller::Controller;
    use crate::outputs::report::ReportFormatter;
    use crate::search::NewsSearcher;
    use crate::search::newsapi::fakes::FixedNews;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, SecondsFormat, Utc};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn app(chat: Arc<ScriptedChat>, news: Arc<FixedNews>) -> Router {
        let config = test_config();
        let searcher = NewsSearcher::new(chat.clone(), news.clone(), &config);
        let formatter = ReportFormatter::new(ReportStyle::Template, chat);
        let controller = Arc::new(Controller::new(
            searcher.clone(),
            formatter.clone(),
            config.target,
        ));
        create_app(AppState {
            controller,
            news,
            searcher,
            formatter,
        })
    }

    fn quiet_app() -> Router {
        app(Arc::new(ScriptedChat::ok(&[])), Arc::new(FixedNews::articles(json!([]))))
    }

    fn recent_news() -> Arc<FixedNews> {
        let published = (Utc::now() - Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
        Arc::new(FixedNews::articles(json!([
            {"title": "Chips", "description": "d", "url": "https://n.example/1", "publishedAt": published, "source": {"name": "S"}}
        ])))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_index_serves_page() {
        let res = quiet_app().oneshot(request("GET", "/", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8_lossy(&bytes);
        assert!(page.contains("/api/status"));
        // Rendered report in the page, raw Markdown on the clipboard.
        assert!(page.contains("state.report_html"));
        assert!(page.contains("writeText(state.report"));
        // The progress bar is only shown while a run is in flight.
        assert!(page.contains(r#"$("bar").classList.toggle("hidden", !busy);"#));
    }

    #[tokio::test]
    async fn test_keyword_endpoints() {
        let app = quiet_app();
        let (status, body) = send(&app, request("POST", "/api/keywords", Some(json!({"text": "AI"})))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["text"], "AI");
        assert_eq!(body["selected"], true);

        let (status, _) = send(&app, request("POST", "/api/keywords", Some(json!({"text": "ai"})))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, request("POST", "/api/keywords", Some(json!({"text": "  "})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, request("POST", "/api/keywords/AI/toggle", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected"], false);

        send(&app, request("POST", "/api/keywords", Some(json!({"text": "Rust"})))).await;
        let (_, body) = send(&app, request("GET", "/api/keywords", None)).await;
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = send(&app, request("DELETE", "/api/keywords", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "Rust");

        let (status, _) = send(&app, request("DELETE", "/api/keywords/AI", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request("DELETE", "/api/keywords/AI", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let app = quiet_app();
        let (_, body) = send(&app, request("GET", "/api/settings", None)).await;
        assert_eq!(body["language"], "zh");
        assert_eq!(body["reportStyle"], "template");

        let (status, body) = send(&app, request("PUT", "/api/settings", Some(json!({"language": "en"})))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "en");
        let (_, body) = send(&app, request("GET", "/api/status", None)).await;
        assert_eq!(body["language"], "en");
    }

    #[tokio::test]
    async fn test_generate_requires_keyword() {
        let (status, body) = send(&quiet_app(), request("POST", "/api/generate", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no keyword is selected");
    }

    #[tokio::test]
    async fn test_generate_then_poll_status() {
        let app = app(Arc::new(ScriptedChat::ok(&[])), recent_news());
        send(&app, request("POST", "/api/keywords", Some(json!({"text": "AI"})))).await;

        let (status, _) = send(&app, request("POST", "/api/generate", None)).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let mut body = Value::Null;
        for _ in 0..50 {
            body = send(&app, request("GET", "/api/status", None)).await.1;
            if body["phase"] != "generating" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(body["phase"], "success");
        assert_eq!(body["progress"], 100);
        assert!(body["report"].as_str().unwrap().contains("**Chips**"));
        assert!(body["report_html"].as_str().unwrap().contains("<strong>Chips</strong>"));
        assert_eq!(body["active_keywords"], json!(["AI"]));

        let (status, _) = send(&app, request("POST", "/api/reset", None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = send(&app, request("GET", "/api/status", None)).await;
        assert_eq!(body["phase"], "idle");
        assert_eq!(body["news"], json!([]));
        assert!(body["report_html"].is_null());
    }

    #[tokio::test]
    async fn test_news_endpoint_echoes_backend() {
        let news = recent_news();
        let app = app(Arc::new(ScriptedChat::ok(&[])), news.clone());
        let (status, body) = send(&app, request("GET", "/api/test-news", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["apiKeyConfigured"], true);
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["data"]["articles"][0]["title"], "Chips");

        assert_eq!(news.calls(), 1);
        let q = &news.queries.lock().unwrap()[0];
        assert_eq!(q.q, "technology");
        assert_eq!(q.page_size, 5);
    }

    #[tokio::test]
    async fn test_news_endpoint_reports_backend_failure() {
        let app = app(
            Arc::new(ScriptedChat::ok(&[])),
            Arc::new(FixedNews::failing("connection refused")),
        );
        let (status, body) = send(&app, request("GET", "/api/test-news", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_pipeline_self_test() {
        let healthy = app(Arc::new(ScriptedChat::ok(&[])), recent_news());
        let (status, body) = send(&healthy, request("GET", "/api/test", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["report"].as_str().unwrap().contains("**Chips**"));

        let failing = app(
            Arc::new(ScriptedChat::ok(&[])),
            Arc::new(FixedNews::failing("down")),
        );
        let (status, body) = send(&failing, request("GET", "/api/test", None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Test failed"}));
    }
}
