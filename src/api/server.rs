//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, Method},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{self, ApiResult};
use super::models::{
    AnalyzeRequest, ChaptersRequest, CognitiveLoadRequest, ExplainRequest, TranslateRequest, WikipediaQuery,
};
use crate::analysis::Analyzer;
use crate::enrich::WikipediaClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub wikipedia: Arc<WikipediaClient>,
}

/// All routes with CORS and request tracing
pub fn router(state: AppState) -> Router {
    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/chapters", post(chapters_handler))
        .route("/api/cognitive-load", post(cognitive_load_handler))
        .route("/api/analyze", post(analyze_handler))
        .route("/api/jobs/:job_id/:artifact", get(artifact_handler))
        .route("/api/explain", post(explain_handler))
        .route("/api/translate", post(translate_handler))
        .route("/api/wikipedia", get(wikipedia_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("🌐 API server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(handlers::health_check(&state).await)
}

async fn chapters_handler(
    State(state): State<AppState>,
    Json(request): Json<ChaptersRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::generate_chapters(&state, request).await?))
}

async fn cognitive_load_handler(
    State(state): State<AppState>,
    Json(request): Json<CognitiveLoadRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::cognitive_load(&state, request).await?))
}

async fn analyze_handler(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::analyze(&state, request).await?))
}

async fn artifact_handler(
    State(state): State<AppState>,
    Path((job_id, artifact)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::get_artifact(&state, &job_id, &artifact).await?))
}

async fn explain_handler(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::explain(&state, request).await?))
}

async fn translate_handler(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::translate(&state, request).await?))
}

async fn wikipedia_handler(
    State(state): State<AppState>,
    Query(query): Query<WikipediaQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(handlers::wikipedia(&state, query).await?))
}
