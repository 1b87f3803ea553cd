//! Evaluation-mode prompt assembly (`spec.md` §4.4, §4.8).

use std::collections::BTreeMap;

use crate::domain::{Challenge, Submission};

use super::render_submission;

/// Build the evaluation prompt for a challenge/submission pair, including
/// the current value of every skill in `affected_skills` and the explicit
/// rubric the LLM must answer with.
pub fn build_evaluation_prompt(
    challenge: &Challenge,
    submission: &Submission,
    current_skill_values: &BTreeMap<String, i32>,
) -> String {
    let mut out = String::new();
    out.push_str("You evaluate a user's submission against a challenge.\n\n");

    out.push_str("Challenge:\n");
    out.push_str(&serde_json::to_string_pretty(&challenge.description_json()).unwrap_or_default());
    out.push('\n');

    if let Some(enunciado) = challenge.description.enunciado_text() {
        out.push_str("\nEnunciado:\n");
        out.push_str(&enunciado);
        out.push('\n');
    }

    out.push_str("\nSubmission:\n");
    out.push_str(&render_submission(&submission.submitted_code));
    out.push('\n');

    out.push_str("\nCurrent skill values:\n");
    for name in &challenge.affected_skills {
        let value = current_skill_values.get(name).copied().unwrap_or(0);
        out.push_str(&format!("- {name}: {value}\n"));
    }

    out.push_str(RUBRIC);
    out
}

const RUBRIC: &str = r#"
Respond with a single JSON object with keys `nota_geral`, `metrics`,
`feedback`, and `skills_assessment`, where:
- `nota_geral` is an integer in [0, 100].
- `metrics` is an object of short named numeric sub-scores.
- `feedback` is free text explaining the score.
- `skills_assessment` maps each affected skill name to
  {skill_level_demonstrated: int, progression_intensity: float, reasoning: string}.
"#;
