//! `Feedback` — the scored outcome for a submission. See `spec.md` §3.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The skill-progression summary embedded in a `Feedback` and returned to
/// the client as part of `EvaluationResult` (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillProgression {
    pub deltas: BTreeMap<String, i32>,
    pub new_values: BTreeMap<String, i32>,
    pub skills_updated: Vec<String>,
    pub reasoning: BTreeMap<String, String>,
}

/// The scored outcome for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub submission_id: String,
    pub score: i32,
    /// Opaque, category-specific numeric breakdown — the source spec leaves
    /// the exact keys ambiguous, so this stays a free-form JSON object
    /// rather than a fixed struct.
    pub metrics: Value,
    pub feedback_text: String,
    pub skills_progression: SkillProgression,
}

impl Feedback {
    /// Validate invariant: `score ∈ [0,100]`.
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=100).contains(&self.score) {
            return Err(format!("score must be in [0,100], got {}", self.score));
        }
        Ok(())
    }
}
