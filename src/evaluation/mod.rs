//! Submission Evaluator (C8). See `spec.md` §4.8.

pub mod evaluator;

pub use evaluator::{evaluate_submission, EvaluationResult};
