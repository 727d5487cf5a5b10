//! HTTP transport for the analysis service
//!
//! Axum router exposing `/health`, `/info` and `POST /analyze`. Handlers stay
//! thin: validate the body, call the orchestrator, render the result.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AnalysisError;
use crate::orchestrator::Orchestrator;
use crate::schemas::{AnalysisRequest, AnalysisRequestBody};

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
}

/// An [`AnalysisError`] rendered with the server's verbosity setting.
pub struct ErrorResponse {
    error: AnalysisError,
    verbose: bool,
}

impl ErrorResponse {
    pub fn new(error: AnalysisError, verbose: bool) -> Self {
        Self { error, verbose }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match &self.error {
            AnalysisError::InputInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AnalysisError::Orchestration(_) | AnalysisError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AnalysisError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        };
        (status, Json(self.error.to_json(self.verbose))).into_response()
    }
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Info endpoint
pub async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let settings = state.orchestrator.settings();
    Json(json!({
        "name": state.config.app.name,
        "version": state.config.app.version,
        "model": state.orchestrator.backend().model(),
        "task_timeout_ms": settings.task_timeout.as_millis() as u64,
        "analysis_timeout_ms": settings.analysis_timeout.as_millis() as u64,
    }))
}

/// Run both agents against one onboarding answer and return the merged analysis
pub async fn analyze_handler(
    State(state): State<HttpState>,
    payload: Result<Json<AnalysisRequestBody>, JsonRejection>,
) -> Response {
    let verbose = state.config.app.debug;

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": "Validation error",
                    "errors": [{ "field": "body", "message": rejection.body_text() }]
                })),
            )
                .into_response();
        }
    };

    let request = match AnalysisRequest::try_from(body) {
        Ok(request) => request,
        Err(invalid) => return ErrorResponse::new(invalid.into(), verbose).into_response(),
    };

    match state.orchestrator.analyze(request).await {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(err) => ErrorResponse::new(err, verbose).into_response(),
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/analyze", post(analyze_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Start the HTTP server and serve until ctrl-c
pub async fn start_http_server(config: Arc<Config>, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let bind = config.server.http_bind;
    let app = build_router(HttpState {
        config: config.clone(),
        orchestrator,
    });

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP listener: {}", e))?;

    tracing::info!(
        "Starting {} v{} on {}",
        config.app.name,
        config.app.version,
        bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    Ok(())
}
