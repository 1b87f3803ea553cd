//! Submission Evaluator (C8). See `spec.md` §4.8.
//!
//! Orchestrates the Prompt Builder (C4) and LLM Client Adapter (C5) to score
//! a submission, then drives the Skill Mapper (C2) and Progression Engine
//! (C3) to turn the LLM's per-skill assessment into a committed skill
//! update. Grounded on `src/task.rs`'s single-task execute-then-output
//! pipeline and `src/server/routes.rs::execute_handler`'s
//! load-then-execute-then-record-then-translate shape.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{
    Challenge, ChallengeCategory, ChallengeStatus, Feedback, Profile, SkillProgression, Submission,
    SubmissionContent, SubmissionStatus,
};
use crate::error::{CoreError, CoreResult};
use crate::llm::LlmClient;
use crate::parsing::parse_complete;
use crate::prompts::build_evaluation_prompt;
use crate::repository::{EvaluationCommit, Repository, SkillNamespace};
use crate::skills::progression::{compute_delta, SkillAssessment};
use crate::skills::{apply_delta, map_skill, MapOutcome};

/// The result returned to the caller once a submission has been scored
/// (`spec.md` §6's `EvaluationResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub submission_id: String,
    pub status: String,
    pub score: i32,
    pub metrics: Value,
    pub feedback: String,
    pub skills_progression: SkillProgression,
}

/// The raw JSON object the LLM must answer the evaluation prompt with.
///
/// `skills_assessment` must preserve the LLM's emission order: the mapper's
/// tie-break rule (`spec.md` §4.2/§4.8 step 6, scenario S1) is "first mapping
/// wins", which only means something if duplicate-mapped entries keep the
/// order they were written in. `serde_json`'s `preserve_order` feature keeps
/// object key order through `parse_complete`'s `Value`; an `IndexMap` here
/// keeps it through this final deserialization step too.
#[derive(Debug, Deserialize)]
struct EvalResponse {
    nota_geral: f64,
    #[serde(default)]
    metrics: Value,
    #[serde(default)]
    feedback: String,
    skills_assessment: IndexMap<String, AssessedSkill>,
}

#[derive(Debug, Clone, Deserialize)]
struct AssessedSkill {
    skill_level_demonstrated: i32,
    progression_intensity: f64,
    #[serde(default)]
    reasoning: String,
}

/// Which skill namespace a challenge category is assessed against
/// (`spec.md` §4.8 step 6): tech for `code`/`organization`, soft for
/// `daily-task`.
fn namespace_for(category: ChallengeCategory) -> SkillNamespace {
    match category {
        ChallengeCategory::Code | ChallengeCategory::Organization => SkillNamespace::Tech,
        ChallengeCategory::DailyTask => SkillNamespace::Soft,
    }
}

/// Validate the submission's discriminator against its owning challenge's
/// category (`spec.md` §4.8 preconditions).
fn check_category_match(content: &SubmissionContent, challenge: &Challenge) -> CoreResult<()> {
    if content.expected_category() != challenge.category {
        return Err(CoreError::InvalidInput(format!(
            "submission type does not match challenge category {:?}",
            challenge.category
        )));
    }
    Ok(())
}

/// Record `submission` as `failed` and propagate `err`. Used whenever the
/// LLM's response cannot be parsed or validated, so a caller listing a
/// profile's submission history still sees the attempt happened.
async fn fail_submission(
    repo: &Arc<dyn Repository>,
    mut submission: Submission,
    err: CoreError,
) -> CoreResult<EvaluationResult> {
    submission.status = SubmissionStatus::Failed;
    if let Err(persist_err) = repo.create_submission(submission).await {
        warn!("failed to persist failed submission after evaluation error {err}: {persist_err}");
    }
    Err(err)
}

/// Evaluate a submission against a challenge and update the owning
/// profile's skills. See `spec.md` §4.8 for the full algorithm.
pub async fn evaluate_submission(
    repo: &Arc<dyn Repository>,
    llm: &Arc<dyn LlmClient>,
    config: &EngineConfig,
    profile_id: &str,
    challenge_id: &str,
    submitted_code: SubmissionContent,
    time_taken_sec: u64,
    commit_message: Option<String>,
    notes: Option<String>,
) -> CoreResult<EvaluationResult> {
    // 1. Load challenge and profile.
    let challenge = repo.get_challenge(challenge_id).await?;
    if challenge.profile_id != profile_id {
        return Err(CoreError::NotFound(format!("challenge {challenge_id} for profile {profile_id}")));
    }
    if challenge.status == ChallengeStatus::Completed {
        return Err(CoreError::AlreadyCompleted(challenge_id.to_string()));
    }
    let profile = repo.get_profile(profile_id).await?;

    // Preconditions: discriminator matches category, type-specific content present.
    check_category_match(&submitted_code, &challenge)?;
    submitted_code
        .validate_nonempty()
        .map_err(CoreError::InvalidInput)?;

    let namespace = namespace_for(challenge.category);
    let current_skills = match namespace {
        SkillNamespace::Tech => profile.tech_skills.clone(),
        SkillNamespace::Soft => profile.soft_skills.clone(),
    };

    // 2-3. Render submission, build evaluation prompt.
    let pending_submission = Submission {
        submission_id: String::new(),
        profile_id: profile_id.to_string(),
        challenge_id: challenge_id.to_string(),
        submitted_code,
        time_taken_sec,
        commit_message,
        notes,
        status: SubmissionStatus::Pending,
        submitted_at: Utc::now(),
    };
    let prompt = build_evaluation_prompt(&challenge, &pending_submission, &current_skills);

    // 4. Call the LLM, collecting the full response (non-streaming here).
    let cancel = tokio_util::sync::CancellationToken::new();
    let mut stream = llm
        .stream(prompt, config.llm_timeout, config.llm_max_retries, cancel)
        .await
        .map_err(|e| match e {
            CoreError::Timeout(d) => CoreError::EvaluationUnavailable(format!("timed out after {d:?}")),
            other => CoreError::EvaluationUnavailable(other.to_string()),
        })?;
    let raw_text = stream
        .collect_text()
        .await
        .map_err(|e| CoreError::EvaluationUnavailable(e.to_string()))?;

    // 5. Parse as a single JSON object. Any failure from here on is recorded
    // as a `failed` submission before propagating (`spec.md` §4.8 step 5, §7).
    let value = match parse_complete(&raw_text) {
        Ok(v) => v,
        Err(reason) => {
            return fail_submission(repo, pending_submission, CoreError::ParseFailure(reason)).await;
        }
    };
    let parsed: EvalResponse = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(e) => {
            return fail_submission(repo, pending_submission, CoreError::ParseFailure(e.to_string())).await;
        }
    };

    if !(0.0..=100.0).contains(&parsed.nota_geral) {
        let reason = format!("nota_geral out of range: {}", parsed.nota_geral);
        return fail_submission(repo, pending_submission, CoreError::ParseFailure(reason)).await;
    }
    if parsed.skills_assessment.is_empty() {
        let reason = "skills_assessment missing or empty".to_string();
        return fail_submission(repo, pending_submission, CoreError::ParseFailure(reason)).await;
    }

    // 6. Map each assessed skill to a canonical user skill; drop unmapped and
    // duplicate mappings with a warning rather than failing the evaluation.
    let attempts = repo.count_attempts(profile_id, challenge_id).await? + 1;
    let difficulty_level = challenge.difficulty.level;

    let mut deltas = BTreeMap::new();
    let mut new_values = BTreeMap::new();
    let mut skills_updated = Vec::new();
    let mut reasoning = BTreeMap::new();
    let mut seen_canonical = std::collections::BTreeSet::new();

    for (assessed_name, assessment) in &parsed.skills_assessment {
        let outcome = map_skill(
            assessed_name,
            &current_skills,
            namespace == SkillNamespace::Soft,
            &config.soft_skill_keywords,
        );
        let canonical = match outcome {
            MapOutcome::Mapped(name) => name,
            MapOutcome::Rejected => {
                warn!(
                    "skill assessment {assessed_name:?} did not map to a canonical skill for profile {profile_id} challenge {challenge_id}"
                );
                continue;
            }
        };
        if !seen_canonical.insert(canonical.clone()) {
            warn!(
                "duplicate mapping to {canonical:?} from {assessed_name:?} dropped for profile {profile_id} challenge {challenge_id}"
            );
            continue;
        }

        let current = *current_skills.get(&canonical).expect("canonical skill exists in current_skills");
        let delta = compute_delta(
            current,
            parsed.nota_geral,
            SkillAssessment {
                demonstrated: assessment.skill_level_demonstrated,
                intensity: assessment.progression_intensity,
            },
            difficulty_level,
            attempts,
        );

        deltas.insert(canonical.clone(), delta);
        new_values.insert(canonical.clone(), apply_delta(current, delta));
        skills_updated.push(canonical.clone());
        reasoning.insert(canonical, assessment.reasoning.clone());
    }

    // 7-9. Persist: submission, feedback, skill update, challenge completion,
    // all within one repository transaction.
    let mut merged_skills = current_skills;
    for (skill, value) in &new_values {
        merged_skills.insert(skill.clone(), *value);
    }

    let submission_id = Uuid::new_v4().to_string();
    let submission = Submission { submission_id: submission_id.clone(), ..pending_submission };

    let score = parsed.nota_geral.round() as i32;
    let skills_progression = SkillProgression {
        deltas,
        new_values,
        skills_updated,
        reasoning,
    };
    let feedback = Feedback {
        submission_id: submission_id.clone(),
        score,
        metrics: parsed.metrics,
        feedback_text: parsed.feedback,
        skills_progression: skills_progression.clone(),
    };
    feedback.validate().map_err(CoreError::ParseFailure)?;

    repo.commit_evaluation(EvaluationCommit {
        submission,
        feedback: feedback.clone(),
        challenge_id: challenge_id.to_string(),
        namespace,
        updated_skills: merged_skills,
    })
    .await?;

    Ok(EvaluationResult {
        submission_id,
        status: "scored".to_string(),
        score,
        metrics: feedback.metrics,
        feedback: feedback.feedback_text,
        skills_progression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChallengeCategory, Description, Difficulty};
    use crate::repository::memory::MemoryRepository;
    use crate::skills::DifficultyLevel;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ScriptedLlm {
        response: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn stream(
            &self,
            _prompt: String,
            _timeout: Duration,
            _max_retries: u32,
            _cancel: tokio_util::sync::CancellationToken,
        ) -> CoreResult<crate::llm::LlmStream> {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx.send(Ok(self.response.clone())).await;
            drop(tx);
            Ok(crate::llm::LlmStream::from_receiver(rx))
        }
    }

    fn sample_profile() -> Profile {
        Profile {
            profile_id: "p1".into(),
            career_goal: "backend".into(),
            tech_skills: BTreeMap::from([
                ("Python".to_string(), 70),
                ("FastAPI".to_string(), 60),
                ("SQL".to_string(), 55),
            ]),
            soft_skills: BTreeMap::from([
                ("Comunicação".to_string(), 33),
                ("Organização".to_string(), 30),
                ("Resolução de Problemas".to_string(), 50),
            ]),
            strong_skills: None,
        }
    }

    fn sample_challenge() -> Challenge {
        Challenge {
            challenge_id: "c1".into(),
            profile_id: "p1".into(),
            category: ChallengeCategory::Code,
            title: "Fix it".into(),
            description: Description::Code {
                text: "Fix it".into(),
                eval_criteria: vec!["correctness".into()],
                target_skill: "Python".into(),
                affected_skills: vec!["Python".into(), "FastAPI".into(), "SQL".into()],
            },
            difficulty: Difficulty { level: DifficultyLevel::Hard, time_limit_minutes: 60 },
            target_skill: "Python".into(),
            affected_skills: vec!["Python".into(), "FastAPI".into(), "SQL".into()],
            template_code: None,
            status: ChallengeStatus::Active,
            created_at: Utc::now(),
        }
    }

    async fn setup(llm_response: &str) -> (Arc<dyn Repository>, Arc<dyn LlmClient>, EngineConfig) {
        let memory = MemoryRepository::new();
        memory.seed_profile(sample_profile()).await;
        memory.create_challenge(sample_challenge()).await.unwrap();
        let repo: Arc<dyn Repository> = Arc::new(memory);
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm { response: llm_response.to_string() });
        (repo, llm, EngineConfig::default())
    }

    #[tokio::test]
    async fn s2_scenario_code_submission_all_skills_owned() {
        let response = r#"{"nota_geral":85,"metrics":{"tests_passed":9},"feedback":"nice work","skills_assessment":{"Python":{"skill_level_demonstrated":85,"progression_intensity":0.7,"reasoning":"solid"},"FastAPI":{"skill_level_demonstrated":75,"progression_intensity":0.5,"reasoning":"ok"},"SQL":{"skill_level_demonstrated":70,"progression_intensity":0.4,"reasoning":"fine"}}}"#;
        let (repo, llm, config) = setup(response).await;

        let submission = SubmissionContent::Codigo {
            files: Some(BTreeMap::from([("main.py".to_string(), "print(1)".to_string())])),
            content: None,
        };
        let result = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 300, None, None)
            .await
            .unwrap();

        assert_eq!(result.status, "scored");
        assert_eq!(result.score, 85);
        assert_eq!(result.skills_progression.skills_updated.len(), 3);
        for delta in result.skills_progression.deltas.values() {
            assert!(*delta > 0);
        }
        let python_delta = result.skills_progression.deltas["Python"];
        assert!(python_delta >= result.skills_progression.deltas["FastAPI"]);
        assert!(python_delta >= result.skills_progression.deltas["SQL"]);

        let challenge = repo.get_challenge("c1").await.unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Completed);
    }

    #[tokio::test]
    async fn closed_world_unmapped_skill_is_dropped_not_created() {
        let response = r#"{"nota_geral":80,"metrics":{},"feedback":"good","skills_assessment":{"Python":{"skill_level_demonstrated":85,"progression_intensity":0.6,"reasoning":"x"},"Rust":{"skill_level_demonstrated":90,"progression_intensity":0.9,"reasoning":"unrelated"}}}"#;
        let (repo, llm, config) = setup(response).await;

        let submission = SubmissionContent::Codigo { files: None, content: Some("print(1)".to_string()) };
        let result = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 200, None, None)
            .await
            .unwrap();

        assert!(result.skills_progression.skills_updated.contains(&"Python".to_string()));
        assert!(!result.skills_progression.skills_updated.contains(&"Rust".to_string()));

        let tech = repo.get_tech_skills("p1").await.unwrap();
        assert!(!tech.contains_key("Rust"));
    }

    #[tokio::test]
    async fn already_completed_challenge_rejects_further_submissions() {
        let response = r#"{"nota_geral":50,"metrics":{},"feedback":"ok","skills_assessment":{"Python":{"skill_level_demonstrated":60,"progression_intensity":0.1,"reasoning":"x"}}}"#;
        let (repo, llm, config) = setup(response).await;
        repo.mark_completed("c1").await.unwrap();

        let submission = SubmissionContent::Codigo { files: None, content: Some("print(1)".to_string()) };
        let err = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 200, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyCompleted(_)));
    }

    #[tokio::test]
    async fn category_mismatch_is_invalid_input() {
        let (repo, llm, config) = setup("{}").await;
        let submission = SubmissionContent::TextoLivre { content: "wrong type".to_string() };
        let err = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 200, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn malformed_llm_response_records_failed_submission() {
        let memory = Arc::new(MemoryRepository::new());
        memory.seed_profile(sample_profile()).await;
        memory.create_challenge(sample_challenge()).await.unwrap();
        let repo: Arc<dyn Repository> = memory.clone();
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm { response: "not json at all".to_string() });
        let config = EngineConfig::default();

        let submission = SubmissionContent::Codigo { files: None, content: Some("print(1)".to_string()) };
        let err = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 120, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ParseFailure(_)));

        let submissions = memory.submissions_for("p1").await;
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].status, SubmissionStatus::Failed);

        // The challenge must not have been completed by a failed evaluation.
        let challenge = repo.get_challenge("c1").await.unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Active);
    }

    #[tokio::test]
    async fn s1_soft_skill_rename_mapping_first_wins() {
        let memory = MemoryRepository::new();
        memory.seed_profile(sample_profile()).await;
        let mut challenge = sample_challenge();
        challenge.category = ChallengeCategory::DailyTask;
        challenge.target_skill = "Comunicação".to_string();
        challenge.affected_skills = vec!["Comunicação".to_string(), "Organização".to_string()];
        challenge.description = Description::DailyTask {
            context: "ctx".into(),
            objectives: vec!["obj".into()],
            tips: vec![],
            enunciado: crate::domain::challenge::EmailEnunciado {
                kind: "email".into(),
                de: "a".into(),
                assunto: "b".into(),
                data: "c".into(),
                corpo: "d".into(),
            },
            eval_criteria: vec!["clarity".into()],
            target_skill: "Comunicação".into(),
            affected_skills: vec!["Comunicação".into(), "Organização".into()],
        };
        memory.create_challenge(challenge).await.unwrap();
        let repo: Arc<dyn Repository> = Arc::new(memory);

        let response = r#"{"nota_geral":82,"metrics":{},"feedback":"great","skills_assessment":{"Comunicação em equipe":{"skill_level_demonstrated":80,"progression_intensity":0.7,"reasoning":"team"},"Comunicação técnica":{"skill_level_demonstrated":75,"progression_intensity":0.6,"reasoning":"tech"},"Empatia":{"skill_level_demonstrated":85,"progression_intensity":0.5,"reasoning":"n/a"}}}"#;
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm { response: response.to_string() });
        let config = EngineConfig::default();

        let submission = SubmissionContent::TextoLivre { content: "done".to_string() };
        let result = evaluate_submission(&repo, &llm, &config, "p1", "c1", submission, 300, None, None)
            .await
            .unwrap();

        assert_eq!(result.skills_progression.skills_updated, vec!["Comunicação".to_string()]);
        let soft = repo.get_soft_skills("p1").await.unwrap();
        assert_eq!(soft.get("Organização"), Some(&30));
    }
}
