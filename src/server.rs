use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::orchestrator::FallbackOrchestrator;
use crate::translate::{Translate, translate_chunked};
use crate::{CaptionTrackDescriptor, Failure, FailureKind, Transcript, TranscriptLine, VideoId, extract_video_id};

/// Shared read-only state, resolved once at startup
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FallbackOrchestrator>,
    pub translator: Arc<dyn Translate>,
    pub config: Arc<Config>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Acquisition(#[from] Failure),

    #[error("Missing text or target language")]
    MissingFields,

    #[error("Translation failed: {0}")]
    Translation(Failure),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Acquisition(f) => match f.kind() {
                FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
                FailureKind::NotFound => StatusCode::NOT_FOUND,
                FailureKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
                FailureKind::Blocked => StatusCode::SERVICE_UNAVAILABLE,
                FailureKind::Upstream => StatusCode::BAD_GATEWAY,
                FailureKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingFields => StatusCode::BAD_REQUEST,
            ApiError::Translation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Acquisition(f) if f.kind() == FailureKind::InvalidInput => "Invalid YouTube URL.".to_string(),
            ApiError::Acquisition(f) => f.message().to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!("Request failed with {status}: {self}");
        }
        (status, Json(ErrorResponse { detail: self.detail() })).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranscriptRequest {
    pub url: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub video_id: VideoId,
    pub transcript: Vec<TranscriptLine>,
    pub full_text: String,
    pub word_count: usize,
    pub language: String,
}

impl From<Transcript> for TranscriptResponse {
    fn from(t: Transcript) -> Self {
        Self {
            video_id: t.video_id,
            transcript: t.lines,
            full_text: t.full_text,
            word_count: t.word_count,
            language: t.language,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub video_id: String,
    pub languages: Vec<CaptionTrackDescriptor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranslateRequest {
    pub text: String,
    pub target_language: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub translated: String,
    pub target_language: String,
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/transcript", post(get_transcript))
        .route("/languages/:video_id", get(get_languages))
        .route("/translate", post(translate_text))
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let resp = next.run(req).await;
    info!("{method} {path} -> {} in {:?}", resp.status().as_u16(), started.elapsed());
    resp
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "YouTube Transcriber API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "supadata": state.config.supadata_key().is_some(),
        "proxy": state.config.resolved_proxy().is_some(),
        "strategies": state.orchestrator.labels(),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_transcript(
    State(state): State<AppState>,
    Json(req): Json<TranscriptRequest>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    info!("Transcript request: {}", req.url);

    let video_id = VideoId::parse(&req.url)?;
    let language = req
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(state.config.default_lang());

    let acquisition = state.orchestrator.acquire(&video_id, language).await;
    let transcript = acquisition.outcome?;
    info!(
        "Success for {video_id} after {} attempt(s): {} lines, {} words",
        acquisition.attempts.len(),
        transcript.lines.len(),
        transcript.word_count
    );
    Ok(Json(transcript.into()))
}

async fn get_languages(State(state): State<AppState>, Path(video_id): Path<String>) -> Json<LanguagesResponse> {
    let languages = match extract_video_id(&video_id) {
        Some(id) => state.orchestrator.list_languages(&id).await,
        None => Vec::new(),
    };
    Json(LanguagesResponse { video_id, languages })
}

async fn translate_text(
    State(state): State<AppState>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if req.text.trim().is_empty() || req.target_language.trim().is_empty() {
        return Err(ApiError::MissingFields);
    }

    let translated = translate_chunked(
        state.translator.as_ref(),
        &req.text,
        req.target_language.trim(),
        state.config.translate_chunk_chars(),
    )
    .await
    .map_err(ApiError::Translation)?;

    Ok(Json(TranslateResponse {
        translated,
        target_language: req.target_language,
    }))
}
