//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use vigil_domain::{RATE_LIMITED_RESPONSE, RequestHandler, Services};
use vigil_llm::MockGenerator;
use vigil_retrieval::{ContextItem, StaticRetriever};
use vigil_server::{Server, ServerConfig};

fn app_with(services: Services) -> Router {
    Server::new(RequestHandler::new(services), ServerConfig::new()).router()
}

fn services(generator: MockGenerator) -> Services {
    Services::new(
        Arc::new(generator),
        Arc::new(StaticRetriever::new(vec![ContextItem::new(
            "Celiac disease is an immune reaction to gluten.",
        )])),
    )
}

fn passing() -> MockGenerator {
    MockGenerator::scripted(|req| {
        Ok(match req.purpose.as_str() {
            "score_groundedness" | "check_precision" => "0.95".to_string(),
            _ => "Celiac disease is triggered by gluten.".to_string(),
        })
    })
}

fn ask(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_status_and_version() {
    let app = app_with(services(passing()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["total_requests"], 0);
    assert!(!body["version"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn ask_returns_answer() {
    let app = app_with(services(passing()));

    let response = app
        .oneshot(ask(json!({"user_id": "carol", "query": "What is celiac disease?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["response"], "Celiac disease is triggered by gluten.");
    assert_eq!(body["outcome"], "pass");
    assert_eq!(body["cached"], false);
    assert_eq!(body["scores"]["groundedness_loops"], 1);
}

#[tokio::test]
async fn ask_invalid_input_is_400_with_answer_body() {
    let app = app_with(services(passing()));

    let response = app
        .oneshot(ask(json!({"user_id": "carol", "query": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["outcome"], "invalid");
    assert!(body["response"].as_str().unwrap().starts_with("Invalid input: "));
}

#[tokio::test]
async fn ask_malformed_json_is_error_response() {
    let app = app_with(services(passing()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"user_id\": 5"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "bad_request");
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn ask_rate_limited_is_429() {
    use std::time::Duration;
    use vigil_domain::HandlerConfig;
    use vigil_ratelimit::{RateLimitConfig, RateLimiter};

    let services = services(passing())
        .with_rate_limiter(RateLimiter::new(
            RateLimitConfig::new()
                .with_requests_per_minute(1)
                .with_burst_multiplier(1.0),
        ))
        .with_handler_config(HandlerConfig::default().with_acquire_timeout(Duration::ZERO));
    let app = app_with(services);

    let first = app
        .clone()
        .oneshot(ask(json!({"user_id": "carol", "query": "What is celiac disease?"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(ask(json!({"user_id": "carol", "query": "Is oat safe?"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(second).await;
    assert_eq!(body["response"], RATE_LIMITED_RESPONSE);
}

#[tokio::test]
async fn metrics_reflect_traffic() {
    let app = app_with(services(passing()));

    app.clone()
        .oneshot(ask(json!({"user_id": "carol", "query": "What is celiac disease?"})))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["metrics"]["counters"]["requests_total"], 1);
    assert_eq!(body["metrics"]["counters"]["cache_misses"], 1);
    assert_eq!(body["response_cache"]["size"], 1);
    assert_eq!(body["rate_limiter"]["total_requests"], 1);
}

#[tokio::test]
async fn unhealthy_service_answers_503() {
    let app = app_with(services(MockGenerator::new(Vec::<String>::new())));

    app.clone()
        .oneshot(ask(json!({"user_id": "carol", "query": "What is celiac disease?"})))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "unhealthy");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = app_with(services(passing()));
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
