//! Core entities: `Profile`, `Challenge`, `Submission`, `Feedback`, and the
//! skill-progression log entry. See `spec.md` §3.

pub mod challenge;
pub mod feedback;
pub mod profile;
pub mod submission;

pub use challenge::{Challenge, ChallengeCategory, ChallengeStatus, Description, Difficulty, DifficultyLevel};
pub use feedback::{Feedback, SkillProgression};
pub use profile::{Profile, Track};
pub use submission::{Submission, SubmissionContent, SubmissionStatus};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Append-only skill-progression history entry (`spec.md` §3, recommended).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SkillProgressionLogEntry {
    pub profile_id: String,
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of all skill values immediately after this change.
    pub snapshot: BTreeMap<String, i32>,
    pub changed: BTreeMap<String, SkillChange>,
    pub trigger: String,
}

/// A single skill's before/after/delta triple within a log entry.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct SkillChange {
    pub from: i32,
    pub to: i32,
    pub delta: i32,
}
