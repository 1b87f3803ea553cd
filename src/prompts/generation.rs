//! Generation-mode prompt assembly (`spec.md` §4.4, §6).

use crate::domain::Profile;

/// Build the generation prompt for `profile`: track, current skill values,
/// and the per-category rubric, plus the explicit generation instructions
/// (exactly three challenges, fullstack category mix, difficulty buckets,
/// `affected_skills`/`eval_criteria` shape).
pub fn build_generation_prompt(profile: &Profile) -> String {
    let track = profile.track();

    let mut out = String::new();
    out.push_str("You generate professional-development challenges for a single user.\n\n");
    out.push_str(&format!("Track: {track:?}\n\n"));

    out.push_str("Current technical skills:\n");
    out.push_str(&skill_listing(&profile.tech_skills));
    out.push_str("\nCurrent soft skills:\n");
    out.push_str(&skill_listing(&profile.soft_skills));
    out.push('\n');

    out.push_str(RUBRIC);
    out.push_str(INSTRUCTIONS);
    out
}

fn skill_listing(skills: &std::collections::BTreeMap<String, i32>) -> String {
    if skills.is_empty() {
        return "(none)\n".to_string();
    }
    skills
        .iter()
        .map(|(name, value)| format!("- {name}: {value}\n"))
        .collect()
}

const RUBRIC: &str = r#"
Respond with exactly three JSON objects, one per challenge, written
back-to-back with no wrapping array and no separator between them. Each
challenge has shape determined by its `category`:
- code: {category, title, description: {text, eval_criteria, target_skill, affected_skills}, difficulty: {level, time_limit_minutes}, target_skill, affected_skills, template_code: {files: {path: initial_content}, open?}}
- daily-task: {category, title, description: {context, objectives, tips, enunciado: {type: "email", de, assunto, data, corpo}, eval_criteria, target_skill, affected_skills}, difficulty, target_skill, affected_skills, template_code: null}
- organization: {category, title, description: {text, hints, enunciado: {funcionais, nao_funcionais}, eval_criteria, target_skill, affected_skills}, difficulty, target_skill, affected_skills, template_code: [{id, label, fields: [{id, label, type, options?, placeholder?}]}]}

"#;

const INSTRUCTIONS: &str = r#"Instructions:
- Produce exactly three challenges.
- If the track is FULLSTACK, include at least one `code` challenge and at
  least one challenge from another category, in randomized order.
- Choose difficulty by skill level: below 40 -> easy, 40 to 70 -> medium,
  above 70 -> hard. Vary difficulty across the three challenges.
- `affected_skills` must be short canonical skill names, not sentences;
  include between 2 and 4 entries, always including `target_skill`.
- `eval_criteria` entries must be technical nouns, not sentences.
"#;
