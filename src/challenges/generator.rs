//! Challenge Generator (C7). See `spec.md` §4.7.
//!
//! Orchestrates the Prompt Builder (C4), the LLM Client Adapter (C5), and
//! the Streaming JSON Parser (C6): each of the three challenges is parsed
//! independently via its own `StreamingJsonParser` instance, handed off to
//! the next one via [`crate::parsing::StreamingJsonParser::tail`] so a
//! challenge's trailing text becomes the next challenge's leading text.
//!
//! Grounded on `src/crew.rs`'s kickoff orchestration (sequencing several
//! task outputs and emitting lifecycle events through a shared recorder)
//! and `src/server/routes.rs`'s `AppState`-held `Arc<RwLock<_>>` guard
//! pattern, adapted here to a `tokio::sync::Mutex` over a map of
//! `broadcast` senders keyed by `profile_id`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{Challenge, ChallengeCategory, Description, Difficulty, Profile, Track};
use crate::error::CoreError;
use crate::llm::LlmClient;
use crate::parsing::{ParserEvent, StreamingJsonParser};
use crate::prompts::build_generation_prompt;
use crate::repository::Repository;

/// Number of challenges produced by one `generate` call (`spec.md` §4.7).
const CHALLENGE_COUNT: usize = 3;

/// An event emitted during generation, in the order `spec.md` §4.7 defines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GenerationEvent {
    Start { profile_id: String, track: Track },
    Progress { percent: u8, message: String },
    ChallengeChunk { index: usize, partial_challenge: Value },
    Challenge { index: usize, challenge: Challenge },
    Complete { challenges: Vec<Challenge> },
    Cancelled,
    Error { kind: String, message: String },
}

/// Raw shape the LLM is asked to produce for one challenge (`spec.md` §6),
/// before a `challenge_id`/`profile_id`/`status`/`created_at` are attached.
#[derive(Debug, Deserialize)]
struct GeneratedChallengeDraft {
    category: ChallengeCategory,
    title: String,
    description: Description,
    difficulty: Difficulty,
    target_skill: String,
    affected_skills: Vec<String>,
    #[serde(default)]
    template_code: Option<crate::domain::challenge::TemplateCode>,
}

/// Orchestrates challenge generation with a per-profile in-flight guard.
pub struct ChallengeGenerator {
    repo: Arc<dyn Repository>,
    llm: Arc<dyn LlmClient>,
    config: EngineConfig,
    in_flight: Mutex<HashMap<String, broadcast::Sender<GenerationEvent>>>,
}

impl ChallengeGenerator {
    pub fn new(repo: Arc<dyn Repository>, llm: Arc<dyn LlmClient>, config: EngineConfig) -> Self {
        Self { repo, llm, config, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Start (or join) generation for `profile_id`. A second concurrent
    /// call for the same profile joins the in-flight broadcast rather than
    /// being rejected — see the Open Question decision in `DESIGN.md`.
    pub async fn generate(
        self: &Arc<Self>,
        profile_id: String,
        cancel: CancellationToken,
    ) -> Result<broadcast::Receiver<GenerationEvent>, CoreError> {
        let mut guard = self.in_flight.lock().await;
        if let Some(tx) = guard.get(&profile_id) {
            if tx.receiver_count() == 0 {
                return Err(CoreError::AlreadyGenerating(profile_id));
            }
            return Ok(tx.subscribe());
        }

        let (tx, rx) = broadcast::channel(self.config.event_queue_bound);
        guard.insert(profile_id.clone(), tx.clone());
        drop(guard);

        let generator = Arc::clone(self);
        tokio::spawn(async move {
            generator.run(profile_id.clone(), tx, cancel).await;
            generator.in_flight.lock().await.remove(&profile_id);
        });

        Ok(rx)
    }

    async fn run(&self, profile_id: String, tx: broadcast::Sender<GenerationEvent>, cancel: CancellationToken) {
        let emit = |event: GenerationEvent| {
            let _ = tx.send(event);
        };

        let profile = match self.repo.get_profile(&profile_id).await {
            Ok(p) => p,
            Err(e) => {
                emit(GenerationEvent::Error { kind: "not_found".to_string(), message: e.to_string() });
                return;
            }
        };

        let track = profile.track();
        emit(GenerationEvent::Start { profile_id: profile_id.clone(), track });
        emit(GenerationEvent::Progress { percent: 10, message: "building prompt".to_string() });

        let prompt = build_generation_prompt(&profile);

        let mut stream = match self
            .llm
            .stream(prompt, self.config.llm_timeout, self.config.llm_max_retries, cancel.clone())
            .await
        {
            Ok(s) => s,
            Err(e) => {
                emit(translate_llm_error(e));
                return;
            }
        };
        emit(GenerationEvent::Progress { percent: 40, message: "awaiting response".to_string() });

        let mut parser = StreamingJsonParser::new();
        let mut challenges = Vec::with_capacity(CHALLENGE_COUNT);

        'collect: while challenges.len() < CHALLENGE_COUNT {
            let delta = tokio::select! {
                _ = cancel.cancelled() => {
                    emit(GenerationEvent::Cancelled);
                    return;
                }
                next = stream.next() => next,
            };

            let mut pending = match delta {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    emit(translate_llm_error(e));
                    return;
                }
                None => break,
            };

            loop {
                let index = challenges.len();
                let events = parser.push(&pending);
                let mut completed_value = None;

                for event in events {
                    match event {
                        ParserEvent::PartialField { .. } | ParserEvent::ArrayItem { .. } => {
                            emit(GenerationEvent::ChallengeChunk {
                                index,
                                partial_challenge: parser.snapshot().clone(),
                            });
                        }
                        ParserEvent::ParseError { reason } => {
                            emit(GenerationEvent::Error { kind: "parse_failure".to_string(), message: reason });
                            return;
                        }
                        ParserEvent::Complete { value, partial: false } => completed_value = Some(value),
                        ParserEvent::Complete { partial: true, .. } => {}
                    }
                }

                if !parser.is_complete() {
                    break;
                }

                match finish_challenge(completed_value, &profile_id, index) {
                    Ok(challenge) => {
                        emit(GenerationEvent::Challenge { index, challenge: challenge.clone() });
                        challenges.push(challenge);
                        let percent = [70u8, 85, 95][index.min(2)];
                        emit(GenerationEvent::Progress {
                            percent,
                            message: format!("challenge {index} parsed"),
                        });
                    }
                    Err(message) => {
                        emit(GenerationEvent::Error { kind: "parse_failure".to_string(), message });
                        return;
                    }
                }

                if challenges.len() == CHALLENGE_COUNT {
                    break 'collect;
                }

                let tail = parser.tail().to_string();
                parser = StreamingJsonParser::new();
                if tail.is_empty() {
                    break;
                }
                pending = tail;
            }
        }

        if challenges.len() < CHALLENGE_COUNT {
            // The LLM stream ended before all challenges arrived. Attempt
            // best-effort recovery per the streaming parser's truncation
            // contract; it will virtually always come back `partial: true`
            // here, which the generator treats as a parse failure.
            let events = parser.finish();
            let reason = events
                .into_iter()
                .find_map(|e| match e {
                    ParserEvent::Complete { partial: true, .. } => {
                        Some("response truncated before this challenge completed".to_string())
                    }
                    ParserEvent::ParseError { reason } => Some(reason),
                    _ => None,
                })
                .unwrap_or_else(|| "LLM stream ended prematurely".to_string());

            emit(GenerationEvent::Error {
                kind: "parse_failure".to_string(),
                message: format!(
                    "{reason} (only {} of {CHALLENGE_COUNT} challenges parsed)",
                    challenges.len()
                ),
            });
            return;
        }

        // Only now, with all challenges successfully parsed and validated, do
        // we touch the profile's existing active challenges — a timeout or
        // parse failure up to this point must leave them untouched
        // (`spec.md` scenario S5).
        if let Err(e) = self.repo.deactivate_active_challenges(&profile_id).await {
            emit(GenerationEvent::Error { kind: "repository_failure".to_string(), message: e.to_string() });
            return;
        }

        for challenge in &challenges {
            if let Err(e) = self.repo.create_challenge(challenge.clone()).await {
                emit(GenerationEvent::Error { kind: "repository_failure".to_string(), message: e.to_string() });
                return;
            }
        }

        info!(profile_id = %profile_id, "generation complete");
        emit(GenerationEvent::Complete { challenges });
    }
}

/// Build a `Challenge` from the fully-parsed JSON value a completed
/// `StreamingJsonParser` produced. Called only once `parser.is_complete()`
/// holds, so `value` is always `Some` in practice; the `None` arm exists
/// for the case where the stack closed without ever emitting a
/// non-partial `Complete` (callers should not reach this in practice).
fn finish_challenge(value: Option<Value>, profile_id: &str, index: usize) -> Result<Challenge, String> {
    let value = value.ok_or_else(|| format!("challenge {index} did not parse"))?;

    let draft: GeneratedChallengeDraft =
        serde_json::from_value(value).map_err(|e| format!("challenge {index}: {e}"))?;

    let challenge = Challenge {
        challenge_id: Uuid::new_v4().to_string(),
        profile_id: profile_id.to_string(),
        category: draft.category,
        title: draft.title,
        description: draft.description,
        difficulty: draft.difficulty,
        target_skill: draft.target_skill,
        affected_skills: draft.affected_skills,
        template_code: draft.template_code,
        status: crate::domain::ChallengeStatus::Active,
        created_at: chrono::Utc::now(),
    };
    challenge.validate().map_err(|e| format!("challenge {index} invalid: {e}"))?;
    Ok(challenge)
}

fn translate_llm_error(err: CoreError) -> GenerationEvent {
    match err {
        CoreError::Timeout(_) => GenerationEvent::Error {
            kind: "timeout".to_string(),
            message: "LLM did not respond in time".to_string(),
        },
        other => GenerationEvent::Error { kind: "llm_unavailable".to_string(), message: other.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryRepository;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ScriptedLlm {
        script: Vec<String>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn stream(
            &self,
            _prompt: String,
            _timeout: Duration,
            _max_retries: u32,
            _cancel: CancellationToken,
        ) -> Result<crate::llm::LlmStream, CoreError> {
            let (tx, rx) = mpsc::channel(self.script.len() + 1);
            for chunk in &self.script {
                let _ = tx.send(Ok(chunk.clone())).await;
            }
            drop(tx);
            Ok(crate::llm::LlmStream::from_receiver(rx))
        }
    }

    fn sample_profile() -> Profile {
        Profile {
            profile_id: "p1".into(),
            career_goal: "backend".into(),
            tech_skills: BTreeMap::from([("Python".to_string(), 55)]),
            soft_skills: BTreeMap::new(),
            strong_skills: None,
        }
    }

    fn draft_json(title: &str) -> String {
        format!(
            r#"{{"category":"code","title":"{title}","description":{{"text":"do it","eval_criteria":["testing"],"target_skill":"Python","affected_skills":["Python","SQL"]}},"difficulty":{{"level":"medium","time_limit_minutes":45}},"target_skill":"Python","affected_skills":["Python","SQL"],"template_code":null}}"#
        )
    }

    #[tokio::test]
    async fn generates_and_persists_three_challenges() {
        let memory = MemoryRepository::new();
        memory.seed_profile(sample_profile()).await;
        let repo: Arc<dyn Repository> = Arc::new(memory);

        let script = vec![draft_json("A"), draft_json("B"), draft_json("C")];
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm { script });
        let generator = Arc::new(ChallengeGenerator::new(repo.clone(), llm, EngineConfig::default()));

        let mut rx = generator
            .generate("p1".to_string(), CancellationToken::new())
            .await
            .unwrap();

        let mut saw_complete = false;
        while let Ok(event) = rx.recv().await {
            if let GenerationEvent::Complete { challenges } = event {
                assert_eq!(challenges.len(), 3);
                saw_complete = true;
                break;
            }
        }
        assert!(saw_complete);
    }

    fn active_challenge(id: &str) -> Challenge {
        Challenge {
            challenge_id: id.to_string(),
            profile_id: "p1".into(),
            category: ChallengeCategory::Code,
            title: "Prior challenge".into(),
            description: Description::Code {
                text: "do it".into(),
                eval_criteria: vec!["testing".into()],
                target_skill: "Python".into(),
                affected_skills: vec!["Python".into(), "SQL".into()],
            },
            difficulty: Difficulty { level: crate::skills::DifficultyLevel::Medium, time_limit_minutes: 30 },
            target_skill: "Python".into(),
            affected_skills: vec!["Python".into(), "SQL".into()],
            template_code: None,
            status: crate::domain::ChallengeStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn truncated_stream_surfaces_parse_failure() {
        let memory = MemoryRepository::new();
        memory.seed_profile(sample_profile()).await;
        memory.create_challenge(active_challenge("prior")).await.unwrap();
        let repo: Arc<dyn Repository> = Arc::new(memory);

        // Two full challenges plus a third that never closes its braces.
        let mut third = draft_json("C");
        third.truncate(third.len() - 40);
        let script = vec![draft_json("A"), draft_json("B"), third];
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm { script });
        let generator = Arc::new(ChallengeGenerator::new(repo.clone(), llm, EngineConfig::default()));

        let mut rx = generator
            .generate("p1".to_string(), CancellationToken::new())
            .await
            .unwrap();

        let mut saw_error = false;
        while let Ok(event) = rx.recv().await {
            match event {
                GenerationEvent::Error { kind, .. } => {
                    assert_eq!(kind, "parse_failure");
                    saw_error = true;
                    break;
                }
                GenerationEvent::Complete { .. } => panic!("truncated stream should not complete"),
                _ => {}
            }
        }
        assert!(saw_error);

        // S5: a parse failure must leave prior active challenges untouched.
        let active = repo.active_challenges("p1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].challenge_id, "prior");
    }
}
