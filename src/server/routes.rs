//! Axum route handlers for the devpath-core HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`                                       — liveness probe.
//! - `POST /profiles/:profile_id/challenges/generate`      — SSE generation stream.
//! - `POST /challenges/:challenge_id/submissions`          — submission evaluation.
//!
//! Grounded directly on the teacher's `AppState` + `app_router` + handler
//! shape (`src/server/routes.rs`); the crew-delegation domain is replaced
//! with the challenge-generation/evaluation domain this crate implements.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::challenges::{ChallengeGenerator, GenerationEvent};
use crate::config::EngineConfig;
use crate::domain::SubmissionContent;
use crate::error::CoreError;
use crate::evaluation::evaluate_submission;
use crate::llm::LlmClient;
use crate::repository::Repository;

/// Shared application state for the HTTP server.
///
/// Generation and evaluation call the LLM at different sampling
/// temperatures (`spec.md` §6: `llm_temperature_generation` vs
/// `llm_temperature_evaluation`), so each gets its own client instance
/// rather than sharing one `LlmClient` built with a single baked-in
/// temperature.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<ChallengeGenerator>,
    pub repo: Arc<dyn Repository>,
    pub llm_evaluation: Arc<dyn LlmClient>,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        llm_generation: Arc<dyn LlmClient>,
        llm_evaluation: Arc<dyn LlmClient>,
        config: EngineConfig,
    ) -> Self {
        let generator = Arc::new(ChallengeGenerator::new(repo.clone(), llm_generation, config.clone()));
        Self { generator, repo, llm_evaluation, config }
    }
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/profiles/{profile_id}/challenges/generate", post(generate_handler))
        .route("/challenges/{challenge_id}/submissions", post(submit_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health — liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "devpath-core",
    }))
}

/// POST /profiles/:profile_id/challenges/generate — starts (or joins) a
/// challenge-generation run and streams its events as SSE, one JSON object
/// per event (`spec.md` §4.7, §6).
async fn generate_handler(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
) -> axum::response::Response {
    let cancel = CancellationToken::new();
    match state.generator.generate(profile_id, cancel).await {
        Ok(rx) => Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// Adapt a `broadcast::Receiver<GenerationEvent>` into an SSE event stream.
/// A lagged receiver (the subscriber fell behind the channel's bound) is
/// treated as the end of this subscription rather than an error — the
/// client can re-request generation status if needed.
fn event_stream(rx: broadcast::Receiver<GenerationEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse_event = Event::default().json_data(&event).unwrap_or_else(|_| {
                        Event::default().data("{\"event\":\"error\",\"message\":\"serialization failure\"}")
                    });
                    return Some((Ok(sse_event), rx));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// Request body for `POST /challenges/:challenge_id/submissions`.
///
/// `profile_id` stands in for the identity the external JWT-based identity
/// provider would otherwise attach to the request (`spec.md` §1 non-goals).
#[derive(Debug, Deserialize)]
struct SubmissionRequest {
    profile_id: String,
    #[serde(flatten)]
    content: SubmissionContent,
    time_taken_sec: u64,
    #[serde(default)]
    commit_message: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// POST /challenges/:challenge_id/submissions — evaluates a submission and
/// applies the resulting skill progression (`spec.md` §4.8, §6).
async fn submit_handler(
    State(state): State<AppState>,
    Path(challenge_id): Path<String>,
    Json(req): Json<SubmissionRequest>,
) -> axum::response::Response {
    let result = evaluate_submission(
        &state.repo,
        &state.llm_evaluation,
        &state.config,
        &req.profile_id,
        &challenge_id,
        req.content,
        req.time_taken_sec,
        req.commit_message,
        req.notes,
    )
    .await;

    match result {
        Ok(evaluation) => (StatusCode::OK, Json(evaluation)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// Translate a `CoreError` into a transport status code, per `spec.md` §7's
/// propagation policy (translation happens only at this boundary).
fn error_response(err: CoreError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::AlreadyCompleted(_) => StatusCode::CONFLICT,
        CoreError::AlreadyGenerating(_) => StatusCode::CONFLICT,
        CoreError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::LLMUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::EvaluationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::ParseFailure(_) => StatusCode::BAD_GATEWAY,
        CoreError::RepositoryFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CoreError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "detail": err.to_string() })))
}
