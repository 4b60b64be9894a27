//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use qna_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the built-in answer prompt.
pub const DEFAULT_PROMPT_ID: &str = "support.answer";

const BUILTIN_SUPPORT_ANSWER: &str = include_str!("../prompts/support.answer.yml");

/// Per-query variables that must never reach the system instruction.
const USER_VARIABLES: [&str; 4] = ["question", "main", "conditions", "user"];

/// Load a prompt definition by ID.
///
/// Looks for `<id>.yml` in the workspace's `.qna/prompts/` directory and
/// falls back to the built-in definition for [`DEFAULT_PROMPT_ID`].
///
/// # Example
/// ```no_run
/// use qna_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "support.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".qna/prompts")
        .join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        if prompt_id == DEFAULT_PROMPT_ID {
            tracing::debug!("Using built-in prompt {}", prompt_id);
            return default_definition();
        }
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents)
        .map_err(|e| AppError::Prompt(format!("{:?}: {}", prompt_file, e)))?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// The built-in support answer prompt.
pub fn default_definition() -> AppResult<PromptDefinition> {
    parse_prompt(BUILTIN_SUPPORT_ANSWER)
}

fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if def.system_template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt systemTemplate cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for name in USER_VARIABLES {
        if references_variable(&def.system_template, name) {
            return Err(AppError::Prompt(format!(
                "systemTemplate must not reference the per-query variable '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn references_variable(template: &str, name: &str) -> bool {
    template.split("{{").skip(1).any(|tail| {
        let expr = tail.split("}}").next().unwrap_or("");
        expr.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .any(|token| token == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VALID_PROMPT: &str = r#"
id: custom.answer
title: Custom
apiVersion: "1.0"
persona:
  platform: ACME
refusal: "No."
systemTemplate: "You support {{platform}}."
template: "{{question}} {{main}}"
"#;

    fn write_prompt(workspace: &Path, id: &str, contents: &str) {
        let dir = workspace.join(".qna/prompts");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.yml", id)), contents).unwrap();
    }

    #[test]
    fn test_builtin_definition() {
        let def = default_definition().unwrap();
        assert_eq!(def.id, DEFAULT_PROMPT_ID);
        assert_eq!(def.persona.platform, "RUTUBE");
        assert_eq!(def.rules.len(), 3);
    }

    #[test]
    fn test_fallback_to_builtin() {
        let temp = TempDir::new().unwrap();
        let def = load_prompt(temp.path(), DEFAULT_PROMPT_ID).unwrap();
        assert_eq!(def.id, DEFAULT_PROMPT_ID);
    }

    #[test]
    fn test_workspace_override() {
        let temp = TempDir::new().unwrap();
        write_prompt(temp.path(), "custom.answer", VALID_PROMPT);

        let def = load_prompt(temp.path(), "custom.answer").unwrap();
        assert_eq!(def.persona.platform, "ACME");
    }

    #[test]
    fn test_missing_prompt() {
        let temp = TempDir::new().unwrap();
        let result = load_prompt(temp.path(), "nonexistent");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_system_template_rejects_question() {
        let temp = TempDir::new().unwrap();
        let bad = VALID_PROMPT.replace(
            "You support {{platform}}.",
            "You support {{platform}}. Question: {{ question }}",
        );
        write_prompt(temp.path(), "custom.answer", &bad);

        let err = load_prompt(temp.path(), "custom.answer").unwrap_err();
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn test_references_variable() {
        assert!(references_variable("a {{main}} b", "main"));
        assert!(references_variable("{{#each user}}x{{/each}}", "user"));
        assert!(!references_variable("{{platform}} main", "main"));
        assert!(!references_variable("{{mainline}}", "main"));
    }

    #[test]
    fn test_invalid_api_version() {
        let bad = VALID_PROMPT.replace("\"1.0\"", "\"1\"");
        assert!(parse_prompt(&bad).is_err());
    }
}
