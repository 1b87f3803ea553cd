//! Crate-wide error types.
//!
//! `CoreError` covers every `ErrorKind` named in the engine specification.
//! Skill-mapping rejections and duplicate-assessment drops are deliberately
//! not represented here — those are logged warnings, not errors.

use thiserror::Error;

/// Errors surfaced by the engine core.
///
/// Translation to transport status codes happens at the HTTP boundary
/// (see `server::routes`), not here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed submission shape or category mismatch.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Profile, challenge, or a required attribute is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Submission to a challenge that is already `completed`.
    #[error("challenge already completed: {0}")]
    AlreadyCompleted(String),

    /// A generation was already running for this profile and could not be joined.
    #[error("generation already in progress for profile {0}")]
    AlreadyGenerating(String),

    /// The LLM adapter timed out waiting for the first byte.
    #[error("LLM call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The LLM is unavailable after exhausting retries.
    #[error("LLM unavailable: {0}")]
    LLMUnavailable(String),

    /// Evaluation could not complete because the LLM was unavailable.
    #[error("evaluation unavailable: {0}")]
    EvaluationUnavailable(String),

    /// The LLM's response could not be parsed into the expected structure.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// A repository operation failed.
    #[error("repository failure: {0}")]
    RepositoryFailure(String),

    /// The operation was cancelled via its cancellation token.
    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether this error represents a transient condition safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::LLMUnavailable(_) | CoreError::EvaluationUnavailable(_)
        )
    }
}

/// Convenience alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;
