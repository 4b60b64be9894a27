//! HTTP routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner |
//! | `POST` | `/predict` | Classify a question and answer it |
//! | `GET`  | `/health` | Health check (returns version) |

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use qna_classify::{enriched_text, SupportClassifier};
use qna_core::config::RetrievalSettings;
use qna_core::{AppError, AppResult};
use qna_knowledge::RagPipeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const BANNER: &str = "Интеллектуальный помощник оператора службы поддержки.";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
    classifier: Arc<SupportClassifier>,
    retrieval: Arc<RetrievalSettings>,
    /// Classify `question | topic | reference questions` instead of the
    /// bare question
    use_retrieval_context: bool,
}

impl AppState {
    pub fn new(
        pipeline: Arc<RagPipeline>,
        classifier: Arc<SupportClassifier>,
        retrieval: RetrievalSettings,
        use_retrieval_context: bool,
    ) -> Self {
        Self {
            pipeline,
            classifier,
            retrieval: Arc::new(retrieval),
            use_retrieval_context,
        }
    }
}

#[derive(Serialize)]
struct BannerResponse {
    text: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub answer: String,
    pub class_1: String,
    pub class_2: String,
}

/// Build the router with CORS open to all origins.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_banner))
        .route("/predict", post(handle_predict))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn run_server(bind: &str, state: AppState) -> AppResult<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", bind, e)))?;

    tracing::info!("HTTP API listening on http://{}", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested, stopping HTTP API");
        })
        .await?;

    Ok(())
}

async fn handle_banner() -> Json<BannerResponse> {
    Json(BannerResponse { text: BANNER })
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_predict(
    State(state): State<AppState>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let question = request.question;

    if question.trim().is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }

    let start = Instant::now();
    tracing::info!("Predict: {}", question);

    let documents = state.pipeline.main_lookup(&question).await?;
    let enriched = enriched_text(&question, &documents, &state.retrieval)?;
    tracing::debug!("Classification context: {}", enriched);

    let classify_input = if state.use_retrieval_context {
        enriched.as_str()
    } else {
        question.as_str()
    };
    let classes = state.classifier.classify(classify_input).await?;

    let rag = state.pipeline.answer(&question).await?;

    tracing::info!(
        class_1 = %classes.class_1,
        class_2 = %classes.class_2,
        "Predict completed in {:?}",
        start.elapsed()
    );

    Ok(Json(PredictResponse {
        answer: rag.answer,
        class_1: classes.class_1,
        class_2: classes.class_2,
    }))
}
