//! HTTP/SSE transport binding for the engine core.
//!
//! A thin illustrative surface, not the subject of this crate's
//! specification (`spec.md` §1 non-goals exclude transport plumbing, CORS,
//! and auth) — but every engine needs a runnable entry point, so this
//! mirrors the teacher's `AppState` + `app_router` shape with the
//! crew-delegation domain swapped for challenge generation/evaluation.
//!
//! # Endpoints
//!
//! - `GET  /health` — liveness probe.
//! - `POST /profiles/:profile_id/challenges/generate` — starts C7's
//!   `generate`, streams events as SSE.
//! - `POST /challenges/:challenge_id/submissions` — runs C8's `evaluate`.

pub mod routes;

pub use routes::{app_router, AppState};
