//! `Submission` — a user's attempt at a challenge. See `spec.md` §3 and §6.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChallengeCategory;

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Scored,
    Failed,
}

/// The category-tagged union of submission payloads (`spec.md` §6).
///
/// The discriminator (`type`) is validated against the owning challenge's
/// category before any content is read, per the Design Note in `spec.md` §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SubmissionContent {
    /// Code submission: one or more files keyed by path.
    #[serde(rename = "codigo")]
    Codigo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        files: Option<BTreeMap<String, String>>,
        /// Legacy single-file shape, also accepted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Free-text submission for a `daily-task` challenge.
    #[serde(rename = "texto_livre")]
    TextoLivre { content: String },
    /// Structured planning-form submission for an `organization` challenge.
    #[serde(rename = "planejamento")]
    Planejamento {
        form_data: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    },
}

impl SubmissionContent {
    /// The challenge category this submission type must match.
    pub fn expected_category(&self) -> ChallengeCategory {
        match self {
            SubmissionContent::Codigo { .. } => ChallengeCategory::Code,
            SubmissionContent::TextoLivre { .. } => ChallengeCategory::DailyTask,
            SubmissionContent::Planejamento { .. } => ChallengeCategory::Organization,
        }
    }

    /// Validate that type-specific content is present and non-empty, per
    /// the Submission Evaluator's preconditions (`spec.md` §4.8).
    pub fn validate_nonempty(&self) -> Result<(), String> {
        match self {
            SubmissionContent::Codigo { files, content } => {
                let has_files = files.as_ref().is_some_and(|f| !f.is_empty());
                let has_content = content.as_ref().is_some_and(|c| !c.trim().is_empty());
                if !has_files && !has_content {
                    return Err("code submission must include non-empty files or content".into());
                }
                Ok(())
            }
            SubmissionContent::TextoLivre { content } => {
                if content.trim().is_empty() {
                    return Err("texto_livre submission must include non-empty content".into());
                }
                Ok(())
            }
            SubmissionContent::Planejamento { form_data } => {
                if form_data.is_empty() || form_data.values().all(|section| section.is_empty()) {
                    return Err("planejamento submission must include non-empty form_data".into());
                }
                Ok(())
            }
        }
    }

    /// Render this submission into files (normalizing the legacy single-file
    /// `codigo` shape into a single-entry map), for code submissions only.
    pub fn as_files(&self) -> Option<BTreeMap<String, String>> {
        match self {
            SubmissionContent::Codigo { files, content } => {
                if let Some(files) = files {
                    Some(files.clone())
                } else {
                    content
                        .as_ref()
                        .map(|c| BTreeMap::from([("main".to_string(), c.clone())]))
                }
            }
            _ => None,
        }
    }
}

/// A user's attempt at a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id: String,
    pub profile_id: String,
    pub challenge_id: String,
    pub submitted_code: SubmissionContent,
    pub time_taken_sec: u64,
    #[serde(default)]
    pub commit_message: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_code_shape_accepted() {
        let content = SubmissionContent::Codigo { files: None, content: Some("print(1)".into()) };
        assert!(content.validate_nonempty().is_ok());
        let files = content.as_files().unwrap();
        assert_eq!(files.get("main").unwrap(), "print(1)");
    }

    #[test]
    fn empty_code_submission_rejected() {
        let content = SubmissionContent::Codigo { files: None, content: None };
        assert!(content.validate_nonempty().is_err());
    }

    #[test]
    fn empty_text_rejected() {
        let content = SubmissionContent::TextoLivre { content: "   ".into() };
        assert!(content.validate_nonempty().is_err());
    }

    #[test]
    fn category_matching() {
        let content = SubmissionContent::TextoLivre { content: "ok".into() };
        assert_eq!(content.expected_category(), ChallengeCategory::DailyTask);
    }
}
