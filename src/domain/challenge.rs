//! `Challenge` — a generated assignment. See `spec.md` §3 and §6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::skills::DifficultyLevel;

/// The category of a challenge, which determines the shape of its
/// `description` and `template_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeCategory {
    Code,
    DailyTask,
    Organization,
}

/// Lifecycle state of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Completed,
    Expired,
}

/// `{level, time_limit_minutes}` per `spec.md` §3, invariants I3/I4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Difficulty {
    pub level: DifficultyLevel,
    pub time_limit_minutes: u32,
}

impl Difficulty {
    /// Validate invariant I4: `time_limit_minutes ∈ [5, 240]`.
    pub fn validate(&self) -> Result<(), String> {
        if !(5..=240).contains(&self.time_limit_minutes) {
            return Err(format!(
                "time_limit_minutes must be in [5,240], got {}",
                self.time_limit_minutes
            ));
        }
        Ok(())
    }
}

/// An email enunciado for a `daily-task` challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailEnunciado {
    #[serde(rename = "type")]
    pub kind: String, // always "email"
    pub de: String,
    pub assunto: String,
    pub data: String,
    pub corpo: String,
}

/// Functional/non-functional requirements enunciado for an `organization` challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementsEnunciado {
    pub funcionais: Vec<String>,
    pub nao_funcionais: Vec<String>,
}

/// Category-specific shape of a challenge's `description` field (`spec.md` §6).
///
/// `#[serde(deny_unknown_fields)]` on every variant is load-bearing here:
/// without it, `Organization`'s required fields are a strict superset match
/// for `Code`, and untagged resolution (first structural match wins) would
/// silently deserialize every `Organization` challenge as `Code`, dropping
/// `hints`/`enunciado`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Description {
    #[serde(deny_unknown_fields)]
    Code {
        text: String,
        eval_criteria: Vec<String>,
        target_skill: String,
        affected_skills: Vec<String>,
    },
    #[serde(deny_unknown_fields)]
    DailyTask {
        context: String,
        objectives: Vec<String>,
        tips: Vec<String>,
        enunciado: EmailEnunciado,
        eval_criteria: Vec<String>,
        target_skill: String,
        affected_skills: Vec<String>,
    },
    #[serde(deny_unknown_fields)]
    Organization {
        text: String,
        hints: Vec<String>,
        enunciado: RequirementsEnunciado,
        eval_criteria: Vec<String>,
        target_skill: String,
        affected_skills: Vec<String>,
    },
}

impl Description {
    /// The `eval_criteria` list, regardless of category.
    pub fn eval_criteria(&self) -> &[String] {
        match self {
            Description::Code { eval_criteria, .. } => eval_criteria,
            Description::DailyTask { eval_criteria, .. } => eval_criteria,
            Description::Organization { eval_criteria, .. } => eval_criteria,
        }
    }

    /// The enunciado/body text the evaluator must render into the prompt,
    /// distinct from free-form `text`/`context`.
    pub fn enunciado_text(&self) -> Option<String> {
        match self {
            Description::Code { .. } => None,
            Description::DailyTask { enunciado, .. } => Some(format!(
                "De: {}\nAssunto: {}\nData: {}\n\n{}",
                enunciado.de, enunciado.assunto, enunciado.data, enunciado.corpo
            )),
            Description::Organization { enunciado, .. } => Some(format!(
                "Requisitos funcionais:\n{}\n\nRequisitos não funcionais:\n{}",
                bullet_list(&enunciado.funcionais),
                bullet_list(&enunciado.nao_funcionais)
            )),
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

/// A single section of an `organization` challenge's planning form schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSection {
    pub id: String,
    pub label: String,
    pub fields: Vec<FormField>,
}

/// A single field within a planning form section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FormFieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Field widget kind for a planning form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldType {
    Textarea,
    Dropdown,
    Text,
}

/// `template_code` shape, category-dependent (`spec.md` §6).
///
/// `daily-task` challenges carry no template; represent that case as
/// `Option::None` at the `Challenge` level rather than as a variant here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateCode {
    /// `code`: mapping path→initial_content plus optional `open: path`.
    Code {
        files: std::collections::BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        open: Option<String>,
    },
    /// `organization`: an array of form sections.
    Form(Vec<FormSection>),
}

/// A generated challenge assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub profile_id: String,
    pub category: ChallengeCategory,
    pub title: String,
    pub description: Description,
    pub difficulty: Difficulty,
    pub target_skill: String,
    pub affected_skills: Vec<String>,
    pub template_code: Option<TemplateCode>,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    /// Validate invariants I1–I4 from `spec.md` §3.
    pub fn validate(&self) -> Result<(), String> {
        if self.affected_skills.len() < 2 || self.affected_skills.len() > 4 {
            return Err(format!(
                "affected_skills must have 2-4 entries, got {}",
                self.affected_skills.len()
            ));
        }
        if !self.affected_skills.contains(&self.target_skill) {
            return Err("target_skill must be included in affected_skills".to_string());
        }
        self.difficulty.validate()?;
        Ok(())
    }

    /// Raw JSON description, for embedding into an evaluation prompt or
    /// serializing into a partial-challenge chunk event.
    pub fn description_json(&self) -> Value {
        serde_json::to_value(&self.description).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_challenge() -> Challenge {
        Challenge {
            challenge_id: "c1".into(),
            profile_id: "p1".into(),
            category: ChallengeCategory::Code,
            title: "Fix the bug".into(),
            description: Description::Code {
                text: "Fix it".into(),
                eval_criteria: vec!["correctness".into()],
                target_skill: "Python".into(),
                affected_skills: vec!["Python".into(), "SQL".into()],
            },
            difficulty: Difficulty { level: DifficultyLevel::Easy, time_limit_minutes: 30 },
            target_skill: "Python".into(),
            affected_skills: vec!["Python".into(), "SQL".into()],
            template_code: Some(TemplateCode::Code { files: BTreeMap::new(), open: None }),
            status: ChallengeStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_challenge_passes() {
        assert!(sample_challenge().validate().is_ok());
    }

    #[test]
    fn target_skill_must_be_in_affected_skills() {
        let mut c = sample_challenge();
        c.target_skill = "Rust".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn affected_skills_bounds() {
        let mut c = sample_challenge();
        c.affected_skills = vec!["Python".into()];
        assert!(c.validate().is_err());

        c.affected_skills = vec![
            "Python".into(),
            "A".into(),
            "B".into(),
            "C".into(),
            "D".into(),
        ];
        assert!(c.validate().is_err());
    }

    #[test]
    fn time_limit_bounds() {
        let mut c = sample_challenge();
        c.difficulty.time_limit_minutes = 1;
        assert!(c.validate().is_err());
        c.difficulty.time_limit_minutes = 300;
        assert!(c.validate().is_err());
    }
}
