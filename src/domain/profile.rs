//! `Profile` — identity of a user inside the core.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coarse role classification inferred from `career_goal` (`spec.md` Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Track {
    Frontend,
    Backend,
    Fullstack,
    Data,
    Other,
}

impl Track {
    /// Infer a track by keyword from a free-text career goal, per `spec.md` §4.4.
    pub fn infer(career_goal: &str) -> Track {
        let lowered = career_goal.to_lowercase();
        if lowered.contains("frontend") {
            Track::Frontend
        } else if lowered.contains("backend") || lowered.contains("api") {
            Track::Backend
        } else if lowered.contains("data") || lowered.contains("etl") || lowered.contains("pipeline") {
            Track::Data
        } else if lowered.contains("fullstack") {
            Track::Fullstack
        } else {
            Track::Fullstack
        }
    }
}

/// A user's profile as seen by the core. Skill maps use `BTreeMap` for
/// deterministic iteration order (matters for mapper tie-breaks and for
/// stable JSON in logs/snapshots).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub profile_id: String,
    pub career_goal: String,
    pub tech_skills: BTreeMap<String, i32>,
    pub soft_skills: BTreeMap<String, i32>,
    #[serde(default)]
    pub strong_skills: Option<BTreeMap<String, i32>>,
}

impl Profile {
    /// The track inferred from this profile's `career_goal`.
    pub fn track(&self) -> Track {
        Track::infer(&self.career_goal)
    }

    /// Validate the skill-value invariant: every value in `[0,100]`, every
    /// key non-empty after trimming.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in self.tech_skills.iter().chain(self.soft_skills.iter()) {
            if crate::skills::model::normalize_key(name).is_none() {
                return Err(format!("skill name must not be blank: {name:?}"));
            }
            if !crate::skills::model::is_valid(*value) {
                return Err(format!("skill value out of range for {name:?}: {value}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_inference() {
        assert_eq!(Track::infer("Become a frontend engineer"), Track::Frontend);
        assert_eq!(Track::infer("Backend/API developer"), Track::Backend);
        assert_eq!(Track::infer("Work on ETL pipelines"), Track::Data);
        assert_eq!(Track::infer("Fullstack developer"), Track::Fullstack);
        assert_eq!(Track::infer("Something else entirely"), Track::Fullstack);
    }

    #[test]
    fn validation_rejects_out_of_range() {
        let mut profile = Profile {
            profile_id: "p1".into(),
            career_goal: "backend".into(),
            tech_skills: BTreeMap::new(),
            soft_skills: BTreeMap::new(),
            strong_skills: None,
        };
        profile.tech_skills.insert("Python".into(), 150);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn validation_accepts_valid_profile() {
        let mut profile = Profile {
            profile_id: "p1".into(),
            career_goal: "backend".into(),
            tech_skills: BTreeMap::new(),
            soft_skills: BTreeMap::new(),
            strong_skills: None,
        };
        profile.tech_skills.insert("Python".into(), 70);
        assert!(profile.validate().is_ok());
    }
}
