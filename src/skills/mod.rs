//! Skill model, mapper, and progression engine (C1–C3).

pub mod mapper;
pub mod model;
pub mod progression;

pub use mapper::{map_skill, MapOutcome};
pub use model::{apply_delta, clamp};
pub use progression::{compute_delta, DifficultyLevel, SkillAssessment};
