//! devpath-core HTTP server binary.
//!
//! Starts an axum HTTP server exposing challenge generation (SSE) and
//! submission evaluation over the in-memory repository. Persistent storage
//! is explicitly out of scope for this crate (`spec.md` §1) — swap
//! `MemoryRepository` for a real `Repository` implementation at this call
//! site to back it with a database.
//!
//! # Environment Variables
//!
//! - `PORT` — HTTP port (default: 8080)
//! - `LLM_BASE_URL` — base URL of an OpenAI-compatible chat-completions endpoint
//! - `LLM_MODEL`, `LLM_TIMEOUT_SEC`, `LLM_MAX_RETRIES` — see `EngineConfig::from_env`
//! - `RUST_LOG` — tracing filter (default: "info")

use std::sync::Arc;

use devpath_core::llm::{HttpLlmClient, LlmClient};
use devpath_core::repository::memory::MemoryRepository;
use devpath_core::repository::Repository;
use devpath_core::server::{app_router, AppState};
use devpath_core::EngineConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,devpath_core=debug".into()),
        )
        .init();

    let config = EngineConfig::from_env();
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{port}");

    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
    let llm_generation: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        base_url.clone(),
        config.llm_model.clone(),
        config.llm_temperature_generation,
    ));
    let llm_evaluation: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::new(
        base_url,
        config.llm_model.clone(),
        config.llm_temperature_evaluation,
    ));

    let state = AppState::new(repo, llm_generation, llm_evaluation, config);
    let app = app_router(state);

    tracing::info!("devpath-core server starting on {bind_addr}");
    tracing::info!("  GET  /health                                      — liveness probe");
    tracing::info!("  POST /profiles/:profile_id/challenges/generate     — SSE generation stream");
    tracing::info!("  POST /challenges/:challenge_id/submissions         — submission evaluation");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("failed to bind");

    axum::serve(listener, app).await.expect("server failed");
}
