//! Default in-memory `Repository` implementation (C13). Grounded on
//! `src/memory/storage/kickoff_task_outputs_storage.rs` as the pattern for
//! a concrete backing store living alongside the trait it implements, with
//! the lock swapped from the teacher's `rusqlite` connection mutex to a
//! plain `tokio::sync::RwLock` over in-memory maps.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Challenge, ChallengeStatus, Feedback, Profile, Submission, SubmissionStatus};
use crate::error::{CoreError, CoreResult};

use super::{EvaluationCommit, Repository, SkillNamespace};

#[derive(Default)]
struct State {
    profiles: BTreeMap<String, Profile>,
    challenges: BTreeMap<String, Challenge>,
    submissions: BTreeMap<String, Submission>,
    feedbacks: Vec<Feedback>,
    attempts: BTreeMap<(String, String), u32>,
}

/// A process-local `Repository` with no external database. Useful for
/// tests and for running the core without a `postgres`/`sqlite` feature
/// enabled.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile directly, bypassing the repository contract. Used by
    /// tests and by the HTTP layer's demo/fixture bootstrap.
    pub async fn seed_profile(&self, profile: Profile) {
        self.state.write().await.profiles.insert(profile.profile_id.clone(), profile);
    }

    /// All submissions recorded for a profile, regardless of status. Test-only introspection.
    pub async fn submissions_for(&self, profile_id: &str) -> Vec<Submission> {
        self.state
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.profile_id == profile_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_profile(&self, profile_id: &str) -> CoreResult<Profile> {
        self.state
            .read()
            .await
            .profiles
            .get(profile_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("profile {profile_id}")))
    }

    async fn get_tech_skills(&self, profile_id: &str) -> CoreResult<BTreeMap<String, i32>> {
        Ok(self.get_profile(profile_id).await?.tech_skills)
    }

    async fn get_soft_skills(&self, profile_id: &str) -> CoreResult<BTreeMap<String, i32>> {
        Ok(self.get_profile(profile_id).await?.soft_skills)
    }

    async fn update_tech_skills(&self, profile_id: &str, skills: BTreeMap<String, i32>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(profile_id)
            .ok_or_else(|| CoreError::NotFound(format!("profile {profile_id}")))?;
        profile.tech_skills = skills;
        Ok(())
    }

    async fn update_soft_skills(&self, profile_id: &str, skills: BTreeMap<String, i32>) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(profile_id)
            .ok_or_else(|| CoreError::NotFound(format!("profile {profile_id}")))?;
        profile.soft_skills = skills;
        Ok(())
    }

    async fn active_challenges(&self, profile_id: &str) -> CoreResult<Vec<Challenge>> {
        let state = self.state.read().await;
        Ok(state
            .challenges
            .values()
            .filter(|c| c.profile_id == profile_id && c.status == ChallengeStatus::Active)
            .cloned()
            .collect())
    }

    async fn deactivate_active_challenges(&self, profile_id: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        for challenge in state.challenges.values_mut() {
            if challenge.profile_id == profile_id && challenge.status == ChallengeStatus::Active {
                challenge.status = ChallengeStatus::Expired;
            }
        }
        Ok(())
    }

    async fn create_challenge(&self, challenge: Challenge) -> CoreResult<()> {
        self.state.write().await.challenges.insert(challenge.challenge_id.clone(), challenge);
        Ok(())
    }

    async fn get_challenge(&self, challenge_id: &str) -> CoreResult<Challenge> {
        self.state
            .read()
            .await
            .challenges
            .get(challenge_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("challenge {challenge_id}")))
    }

    async fn mark_completed(&self, challenge_id: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let challenge = state
            .challenges
            .get_mut(challenge_id)
            .ok_or_else(|| CoreError::NotFound(format!("challenge {challenge_id}")))?;
        challenge.status = ChallengeStatus::Completed;
        Ok(())
    }

    async fn create_submission(&self, mut submission: Submission) -> CoreResult<String> {
        if submission.submission_id.is_empty() {
            submission.submission_id = Uuid::new_v4().to_string();
        }
        let id = submission.submission_id.clone();
        let mut state = self.state.write().await;
        let key = (submission.profile_id.clone(), submission.challenge_id.clone());
        *state.attempts.entry(key).or_insert(0) += 1;
        state.submissions.insert(id.clone(), submission);
        Ok(id)
    }

    async fn create_feedback(&self, feedback: Feedback) -> CoreResult<()> {
        self.state.write().await.feedbacks.push(feedback);
        Ok(())
    }

    async fn count_attempts(&self, profile_id: &str, challenge_id: &str) -> CoreResult<u32> {
        let key = (profile_id.to_string(), challenge_id.to_string());
        Ok(self.state.read().await.attempts.get(&key).copied().unwrap_or(0))
    }

    async fn commit_evaluation(&self, commit: EvaluationCommit) -> CoreResult<()> {
        let mut state = self.state.write().await;

        let profile = state
            .profiles
            .get(&commit.submission.profile_id)
            .ok_or_else(|| CoreError::NotFound(format!("profile {}", commit.submission.profile_id)))?
            .clone();
        if !state.challenges.contains_key(&commit.challenge_id) {
            return Err(CoreError::NotFound(format!("challenge {}", commit.challenge_id)));
        }

        let mut updated_profile = profile;
        match commit.namespace {
            SkillNamespace::Tech => updated_profile.tech_skills = commit.updated_skills,
            SkillNamespace::Soft => updated_profile.soft_skills = commit.updated_skills,
        }

        let mut submission = commit.submission;
        submission.status = SubmissionStatus::Scored;
        let key = (submission.profile_id.clone(), submission.challenge_id.clone());

        state.profiles.insert(updated_profile.profile_id.clone(), updated_profile);
        *state.attempts.entry(key).or_insert(0) += 1;
        state.submissions.insert(submission.submission_id.clone(), submission);
        state.feedbacks.push(commit.feedback);
        state.challenges.get_mut(&commit.challenge_id).unwrap().status = ChallengeStatus::Completed;

        Ok(())
    }
}
