//! HTTP routes exercised in-process with `tower::ServiceExt::oneshot`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{INSIGHT_OK, Script, ScriptedBackend, TRAITS_OK, fast_settings, orchestrator};
use ember_insight::http::{HttpState, build_router};
use ember_insight::{AnalysisSettings, Config};
use serde_json::{Value, json};
use tower::ServiceExt;

fn state(backend: Arc<ScriptedBackend>, settings: AnalysisSettings, debug: bool) -> HttpState {
    let mut config = Config::default();
    config.app.debug = debug;
    HttpState {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator(backend, settings)),
    }
}

async fn send(state: HttpState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn scenario_a_body() -> String {
    json!({
        "user_id": "u1",
        "question": "What are you looking for?",
        "answer": "A serious relationship"
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(
        state(Arc::new(ScriptedBackend::happy()), fast_settings(), false),
        get("/health"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_info_reports_app_and_model() {
    let (status, body) = send(
        state(Arc::new(ScriptedBackend::happy()), fast_settings(), false),
        get("/info"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ember Date Onboarding Analysis");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["model"], "scripted-model");
    assert_eq!(body["task_timeout_ms"], 200);
}

#[tokio::test]
async fn test_analyze_success() {
    let backend = Arc::new(ScriptedBackend::happy());
    let (status, body) = send(
        state(backend.clone(), fast_settings(), false),
        post_json(&scenario_a_body()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["insight"]["keywords"].as_array().unwrap().len(), 3);
    assert_eq!(body["traits"].as_array().unwrap().len(), 2);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_analyze_accepts_identifier_alias() {
    let body = json!({
        "identifier": "u7",
        "question": "What are you looking for?",
        "answer": "Someone to hike with"
    })
    .to_string();
    let (status, body) = send(
        state(Arc::new(ScriptedBackend::happy()), fast_settings(), false),
        post_json(&body),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u7");
}

#[tokio::test]
async fn test_empty_answer_is_422_without_backend_call() {
    let backend = Arc::new(ScriptedBackend::happy());
    let body = json!({ "user_id": "u1", "question": "q?", "answer": "" }).to_string();
    let (status, body) = send(state(backend.clone(), fast_settings(), false), post_json(&body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "Validation error");
    assert_eq!(body["errors"][0]["field"], "answer");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_missing_field_is_422() {
    let backend = Arc::new(ScriptedBackend::happy());
    let body = json!({ "question": "q?", "answer": "a" }).to_string();
    let (status, body) = send(state(backend.clone(), fast_settings(), false), post_json(&body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "user_id");
    assert_eq!(body["errors"][0]["message"], "field required");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_422() {
    let backend = Arc::new(ScriptedBackend::happy());
    let (status, body) = send(
        state(backend.clone(), fast_settings(), false),
        post_json("{\"user_id\": \"u1\","),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "Validation error");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_task_failure_is_500_naming_the_task() {
    let backend = Arc::new(ScriptedBackend::new(
        Script::Reply(INSIGHT_OK.to_string()),
        Script::Reply("Here you go: traits!".to_string()),
    ));
    let (status, body) = send(state(backend, fast_settings(), false), post_json(&scenario_a_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["failures"][0]["task"], "trait");
    assert_eq!(body["failures"][0]["kind"], "MalformedResponse");
    assert!(body["detail"].as_str().unwrap().contains("Trait/MalformedResponse"));
    assert!(body["failures"][0].get("message").is_none());
}

#[tokio::test]
async fn test_debug_mode_includes_failure_messages() {
    let backend = Arc::new(ScriptedBackend::new(
        Script::Reply(INSIGHT_OK.to_string()),
        Script::Reply("Here you go: traits!".to_string()),
    ));
    let (status, body) = send(state(backend, fast_settings(), true), post_json(&scenario_a_body())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["failures"][0]["message"]
            .as_str()
            .unwrap()
            .contains("malformed response")
    );
}

#[tokio::test]
async fn test_overall_timeout_is_504() {
    let backend = Arc::new(ScriptedBackend::new(
        Script::Hang,
        Script::Reply(TRAITS_OK.to_string()),
    ));
    let settings = AnalysisSettings {
        task_timeout: Duration::from_secs(5),
        analysis_timeout: Duration::from_millis(100),
        ..AnalysisSettings::default()
    };
    let (status, body) = send(state(backend, settings, false), post_json(&scenario_a_body())).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["kind"], "Timeout");
    assert_eq!(body["cancelled"], false);
    assert_eq!(body["timeout_ms"], 100);
}

#[tokio::test]
async fn test_cancelled_analysis_maps_to_504() {
    use axum::response::IntoResponse;
    use ember_insight::AnalysisError;
    use ember_insight::http::ErrorResponse;

    let response = ErrorResponse::new(
        AnalysisError::Timeout {
            timeout_ms: 20,
            cancelled: true,
        },
        false,
    )
    .into_response();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], "Timeout");
    assert_eq!(json["cancelled"], true);
}
