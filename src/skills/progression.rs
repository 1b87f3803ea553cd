//! Progression engine (C3).
//!
//! Computes a per-skill integer delta from a demonstrated-level assessment,
//! the submission's overall score, difficulty, and attempt count. See
//! `spec.md` §4.3 for the formula and its guaranteed properties.

use serde::{Deserialize, Serialize};

/// Difficulty bucket used both by challenge generation and the progression
/// weight lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    fn weight(self) -> f64 {
        match self {
            DifficultyLevel::Easy => 0.7,
            DifficultyLevel::Medium => 1.0,
            DifficultyLevel::Hard => 1.3,
        }
    }
}

/// Per-skill assessment reported by the LLM for one `affected_skills` entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SkillAssessment {
    /// Demonstrated level in `[0,100]`, independent of the user's stored value.
    pub demonstrated: i32,
    /// Signed intensity in `[-1,1]` of how strongly this submission moved the skill.
    pub intensity: f64,
}

/// Compute the integer delta to add (before clamping) to `skill_current`.
///
/// Implements the piecewise formula from `spec.md` §4.3 verbatim:
///
/// ```text
/// gap              = demonstrated - skill_current
/// weight           = {easy: 0.7, medium: 1.0, hard: 1.3}[difficulty_level]
/// curve            = 1 / (1 + exp((skill_current - 70) / 10))
/// attempt_penalty  = max(0.6, 1 - 0.1 * (attempts - 1))
///
/// if nota_geral < 50:
///     score_factor = (nota_geral - 50) / 50
///     if intensity < 0: score_factor *= (1 + |intensity|)
/// else:
///     score_factor = {>=90: 2.0, >=75: 1.5, >=60: 1.0, else: 0.6}
///
/// raw = gap * intensity * score_factor * weight * curve * attempt_penalty / 10
///
/// if nota_geral >= 90 and 0 < raw < 3:  raw = 3
/// if nota_geral  < 40 and -2 < raw < 0: raw = -2
///
/// delta = round(raw)
/// ```
pub fn compute_delta(
    skill_current: i32,
    nota_geral: f64,
    assessment: SkillAssessment,
    difficulty_level: DifficultyLevel,
    attempts: u32,
) -> i32 {
    let gap = (assessment.demonstrated - skill_current) as f64;
    let weight = difficulty_level.weight();
    let curve = 1.0 / (1.0 + (((skill_current as f64) - 70.0) / 10.0).exp());
    let attempts = attempts.max(1);
    let attempt_penalty = (1.0 - 0.1 * ((attempts - 1) as f64)).max(0.6);

    let score_factor = if nota_geral < 50.0 {
        let mut factor = (nota_geral - 50.0) / 50.0;
        if assessment.intensity < 0.0 {
            factor *= 1.0 + assessment.intensity.abs();
        }
        factor
    } else if nota_geral >= 90.0 {
        2.0
    } else if nota_geral >= 75.0 {
        1.5
    } else if nota_geral >= 60.0 {
        1.0
    } else {
        0.6
    };

    let mut raw = gap * assessment.intensity * score_factor * weight * curve * attempt_penalty / 10.0;

    if nota_geral >= 90.0 && raw > 0.0 && raw < 3.0 {
        raw = 3.0;
    }
    if nota_geral < 40.0 && raw < 0.0 && raw > -2.0 {
        raw = -2.0;
    }

    raw.round() as i32
}
