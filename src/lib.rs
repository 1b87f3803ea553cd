//! # devpath-core
//!
//! The LLM-orchestration engine for a professional-development platform:
//! personalized challenge generation with incremental streaming, submission
//! evaluation, and bounded per-skill progression.
//!
//! Module layout follows the component breakdown in `spec.md` §2:
//!
//! - [`skills`] — C1 skill model, C2 skill mapper, C3 progression engine.
//! - [`prompts`] — C4 prompt builder (generation + evaluation modes).
//! - [`llm`] — C5 LLM client adapter (streaming, retries, cancellation).
//! - [`parsing`] — C6 streaming JSON parser.
//! - [`challenges`] — C7 challenge generator.
//! - [`evaluation`] — C8 submission evaluator.
//! - [`repository`] — C9 repository port plus the in-memory default backend.
//! - [`domain`] — core entities: `Profile`, `Challenge`, `Submission`, `Feedback`.
//! - [`config`] — engine configuration.
//! - [`error`] — crate-wide error types.
//! - [`server`] — HTTP/SSE transport binding.

pub mod challenges;
pub mod config;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod parsing;
pub mod prompts;
pub mod repository;
pub mod server;
pub mod skills;

pub use challenges::generator::{ChallengeGenerator, GenerationEvent};
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};
pub use evaluation::evaluator::{evaluate_submission, EvaluationResult};
pub use repository::Repository;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
