//! Engine configuration.
//!
//! Every key recognized by the core (`spec.md` §6) with a default, loadable
//! from the process environment the way the teacher's provider configs read
//! their `*_API_KEY`/`*_MAX_RETRIES` env vars.

use std::collections::BTreeMap;
use std::time::Duration;

/// Keyword sets used by the soft-skill mapper (C2), keyed by canonical skill name.
///
/// Insertion order is preserved (`Vec` of `(canonical, keywords)` pairs)
/// because the mapper's tie-break rule is "first canonical match in
/// insertion order of the configured keyword set wins".
pub type SoftSkillKeywords = Vec<(String, Vec<String>)>;

/// Typed configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Identifier of the backend LLM model.
    pub llm_model: String,
    /// Per-call timeout for the LLM adapter.
    pub llm_timeout: Duration,
    /// Maximum retry attempts on transient LLM failures.
    pub llm_max_retries: u32,
    /// Sampling temperature used for challenge generation calls.
    pub llm_temperature_generation: f64,
    /// Sampling temperature used for evaluation calls.
    pub llm_temperature_evaluation: f64,
    /// Maximum number of active challenges a profile may hold at once.
    pub max_active_challenges_per_profile: usize,
    /// Backpressure bound on the generation event channel.
    pub event_queue_bound: usize,
    /// Keyword configuration consumed by the skill mapper.
    pub soft_skill_keywords: SoftSkillKeywords,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            llm_model: "default-model".to_string(),
            llm_timeout: Duration::from_secs(30),
            llm_max_retries: 3,
            llm_temperature_generation: 0.9,
            llm_temperature_evaluation: 0.3,
            max_active_challenges_per_profile: 3,
            event_queue_bound: 64,
            soft_skill_keywords: default_soft_skill_keywords(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `LLM_MODEL`, `LLM_TIMEOUT_SEC`,
    /// `LLM_MAX_RETRIES`, `LLM_TEMPERATURE_GENERATION`,
    /// `LLM_TEMPERATURE_EVALUATION`, `MAX_ACTIVE_CHALLENGES_PER_PROFILE`,
    /// `EVENT_QUEUE_BOUND`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            llm_model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_timeout: std::env::var("LLM_TIMEOUT_SEC")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.llm_timeout),
            llm_max_retries: std::env::var("LLM_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm_max_retries),
            llm_temperature_generation: std::env::var("LLM_TEMPERATURE_GENERATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm_temperature_generation),
            llm_temperature_evaluation: std::env::var("LLM_TEMPERATURE_EVALUATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.llm_temperature_evaluation),
            max_active_challenges_per_profile: std::env::var("MAX_ACTIVE_CHALLENGES_PER_PROFILE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_active_challenges_per_profile),
            event_queue_bound: std::env::var("EVENT_QUEUE_BOUND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.event_queue_bound),
            soft_skill_keywords: defaults.soft_skill_keywords,
        }
    }
}

/// The three canonical Portuguese soft skills and their keyword sets,
/// per `spec.md` §4.2. Configuration, not control flow.
pub fn default_soft_skill_keywords() -> SoftSkillKeywords {
    vec![
        (
            "Comunicação".to_string(),
            vec![
                "comunicação",
                "comunicacao",
                "comunicar",
                "explicar",
                "escrever",
                "mensagem",
                "email",
                "técnica",
                "tecnica",
                "equipe",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        ),
        (
            "Organização".to_string(),
            vec![
                "organização",
                "organizacao",
                "organizar",
                "planejar",
                "planejamento",
                "priorizar",
                "gerenciar",
                "gestão",
                "gestao",
                "tempo",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        ),
        (
            "Resolução de Problemas".to_string(),
            vec![
                "resolução",
                "resolucao",
                "resolver",
                "problema",
                "debugar",
                "debug",
                "investigar",
                "análise",
                "analise",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        ),
    ]
}

/// Build a lookup map from the configured keyword list, for convenience in
/// call sites that want `BTreeMap` access instead of ordered iteration.
pub fn keyword_lookup(keywords: &SoftSkillKeywords) -> BTreeMap<String, Vec<String>> {
    keywords.iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.llm_timeout, Duration::from_secs(30));
        assert_eq!(cfg.llm_max_retries, 3);
        assert_eq!(cfg.llm_temperature_generation, 0.9);
        assert_eq!(cfg.llm_temperature_evaluation, 0.3);
        assert_eq!(cfg.max_active_challenges_per_profile, 3);
        assert_eq!(cfg.event_queue_bound, 64);
        assert_eq!(cfg.soft_skill_keywords.len(), 3);
    }

    #[test]
    fn keyword_order_preserved() {
        let cfg = EngineConfig::default();
        let names: Vec<&str> = cfg
            .soft_skill_keywords
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(names, ["Comunicação", "Organização", "Resolução de Problemas"]);
    }
}
