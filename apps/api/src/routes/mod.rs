pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::document::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/ping", get(health::ping_handler))
        .route("/health", get(health::health_handler))
        // Document API
        .route("/api/v1/documents", post(handlers::handle_generate_document))
        .route("/api/v1/documents/plan", post(handlers::handle_plan_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::document::handlers::{DOCUMENT_ID_HEADER, FONT_SIZE_HEADER, PAGE_COUNT_HEADER};
    use crate::models::topic::tests::make_png;

    fn make_app() -> Router {
        build_router(AppState::new(Config::default()))
    }

    async fn post_json(uri: &str, body: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        make_app().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn text_topic(title: &str, bullets: &[&str]) -> Value {
        json!({ "media": "text", "topic": title, "content": bullets })
    }

    #[tokio::test]
    async fn test_ping() {
        let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = make_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "message": "Pong!" }));
    }

    #[tokio::test]
    async fn test_generate_returns_pdf_with_layout_headers() {
        let body = json!({
            "topics": [
                text_topic("Stacks", &["LIFO order", "push/pop O(1)"]),
                text_topic("Big-O", &["O(n^{2}) worst case"]),
            ]
        });
        let response = post_json("/api/v1/documents", body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[FONT_SIZE_HEADER], "10");
        assert_eq!(headers[PAGE_COUNT_HEADER], "1");
        assert!(headers.contains_key(DOCUMENT_ID_HEADER));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_image_topic_is_accepted() {
        let body = json!({
            "topics": [
                { "media": "image", "data": STANDARD.encode(make_png(64, 32)) },
                text_topic("Caption", &["A red rectangle"]),
            ]
        });
        let response = post_json("/api/v1/documents", body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_plan_reports_layout() {
        let body = json!({
            "topics": [text_topic("Queues", &["FIFO order"])],
            "options": { "default_font_size": 8.0 }
        });
        let response = post_json("/api/v1/documents/plan", body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let plan = json_body(response).await;
        assert_eq!(plan["font_size"], json!(8.0));
        assert_eq!(plan["page_count"], json!(1));
        assert_eq!(plan["placements"].as_array().unwrap().len(), 1);
        assert!(plan["generated_at"].is_string());
        assert!(plan["document_id"].is_string());
    }

    #[tokio::test]
    async fn test_empty_topics_is_bad_request() {
        let response = post_json("/api/v1/documents", json!({ "topics": [] })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_unsupported_media_is_unprocessable() {
        let body = json!({ "topics": [{ "media": "video", "data": "AAAA" }] });
        let response = post_json("/api/v1/documents", body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"]["code"], "UNSUPPORTED_MEDIA");
    }

    #[tokio::test]
    async fn test_invalid_override_is_bad_request() {
        let body = json!({
            "topics": [text_topic("Heaps", &["O(log n) insert"])],
            "options": { "min_font_size": -1.0 }
        });
        let response = post_json("/api/v1/documents/plan", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_CONFIG");
    }

    #[tokio::test]
    async fn test_budget_exceeded_is_unprocessable() {
        let bullet = "a fairly long bullet line that needs several words to wrap";
        let topics: Vec<Value> = (0..200)
            .map(|i| text_topic(&format!("Topic {i}"), &[bullet, bullet, bullet, bullet]))
            .collect();
        let body = json!({
            "topics": topics,
            "options": { "max_page_budget": 1, "min_font_size": 9.9 }
        });
        let response = post_json("/api/v1/documents/plan", body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"]["code"], "PAGE_BUDGET_EXCEEDED");
    }
}
