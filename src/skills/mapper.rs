//! Skill mapper (C2).
//!
//! Maps an LLM-reported skill name onto the user's canonical skill set, or
//! rejects it. Never creates a new skill — the closed-world constraint
//! described in `spec.md` §4.2/§9.

use std::collections::BTreeMap;

use crate::config::SoftSkillKeywords;

/// Outcome of a mapping attempt, including the reason for a rejection so
/// callers can log a useful warning (rejections are not errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOutcome {
    /// Resolved to this canonical user skill name.
    Mapped(String),
    /// No canonical skill could be resolved.
    Rejected,
}

/// Resolve `assessed_name` against `user_skills`, following the resolution
/// order in `spec.md` §4.2: exact match, then (soft skills only) keyword
/// match, then (tech skills only) substring match.
pub fn map_skill(
    assessed_name: &str,
    user_skills: &BTreeMap<String, i32>,
    is_soft_skill: bool,
    soft_skill_keywords: &SoftSkillKeywords,
) -> MapOutcome {
    // 1. Exact match.
    if user_skills.contains_key(assessed_name) {
        return MapOutcome::Mapped(assessed_name.to_string());
    }

    // 2. Keyword match (soft skills only).
    if is_soft_skill {
        if let Some(canonical) = keyword_match(assessed_name, soft_skill_keywords) {
            if user_skills.contains_key(&canonical) {
                return MapOutcome::Mapped(canonical);
            }
        }
    }

    // 3. Substring match (tech skills only).
    if !is_soft_skill {
        if let Some(canonical) = substring_match(assessed_name, user_skills) {
            return MapOutcome::Mapped(canonical);
        }
    }

    MapOutcome::Rejected
}

/// Keyword resolution: lowercase both strings; if `assessed_name` contains
/// any keyword belonging to a canonical skill, that canonical skill wins.
/// First canonical match in the configured insertion order wins.
fn keyword_match(assessed_name: &str, keywords: &SoftSkillKeywords) -> Option<String> {
    let lowered = assessed_name.to_lowercase();
    for (canonical, kws) in keywords {
        if kws.iter().any(|kw| lowered.contains(&kw.to_lowercase())) {
            return Some(canonical.clone());
        }
    }
    None
}

/// Substring resolution: normalized `assessed_name` is a substring of a
/// canonical key or vice versa (case-insensitive, trimmed).
fn substring_match(assessed_name: &str, user_skills: &BTreeMap<String, i32>) -> Option<String> {
    let normalized = assessed_name.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    for canonical in user_skills.keys() {
        let canon_lower = canonical.trim().to_lowercase();
        if canon_lower.contains(&normalized) || normalized.contains(&canon_lower) {
            return Some(canonical.clone());
        }
    }
    None
}
