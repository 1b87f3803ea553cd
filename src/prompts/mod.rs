//! Prompt Builder (C4): pure functions assembling the text sent to the LLM
//! Client Adapter. See `spec.md` §4.4.
//!
//! Both modes are plain string assembly over already-validated domain data —
//! no I/O, no randomness, no state. Rendering a submission for the
//! evaluation prompt lives here too since it is purely a function of the
//! submission's shape (`spec.md` §4.8 step 2).

pub mod evaluation;
pub mod generation;

pub use evaluation::build_evaluation_prompt;
pub use generation::build_generation_prompt;

use std::collections::BTreeMap;

use crate::domain::SubmissionContent;

/// Render a submission into prompt text per `spec.md` §4.8 step 2: code
/// files get a `// <path>` header, free text is inlined, planning form
/// answers are flattened section by section.
pub fn render_submission(content: &SubmissionContent) -> String {
    match content {
        SubmissionContent::Codigo { .. } => {
            let files = content.as_files().unwrap_or_default();
            files
                .iter()
                .map(|(path, body)| format!("// {path}\n{body}"))
                .collect::<Vec<_>>()
                .join("\n\n")
        }
        SubmissionContent::TextoLivre { content } => content.clone(),
        SubmissionContent::Planejamento { form_data } => render_form_data(form_data),
    }
}

fn render_form_data(form_data: &BTreeMap<String, BTreeMap<String, serde_json::Value>>) -> String {
    form_data
        .iter()
        .map(|(section, fields)| {
            let body = fields
                .iter()
                .map(|(field_id, value)| format!("{field_id}: {}", render_scalar(value)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("=== {section} ===\n{body}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn renders_code_files_with_path_headers() {
        let mut files = BTreeMap::new();
        files.insert("src/main.rs".to_string(), "fn main() {}".to_string());
        let content = SubmissionContent::Codigo { files: Some(files), content: None };
        let rendered = render_submission(&content);
        assert_eq!(rendered, "// src/main.rs\nfn main() {}");
    }

    #[test]
    fn renders_planning_form_sections() {
        let mut section = BTreeMap::new();
        section.insert("goal".to_string(), serde_json::json!("ship v1"));
        let mut form = BTreeMap::new();
        form.insert("Scope".to_string(), section);
        let content = SubmissionContent::Planejamento { form_data: form };
        let rendered = render_submission(&content);
        assert_eq!(rendered, "=== Scope ===\ngoal: ship v1");
    }
}
