//! Prompt builder for rendering templates and injecting retrieved context.

use crate::types::{BuiltPrompt, PromptContext, PromptDefinition};
use handlebars::{handlebars_helper, Handlebars};
use qna_core::{AppError, AppResult};
use std::collections::HashMap;

handlebars_helper!(inc: |x: u64| x + 1);

/// Build the system and user turns for one question.
///
/// 1. Renders the system instruction from the definition alone
/// 2. Renders each context section as a list literal
/// 3. Renders the user turn with the question and the three sections
///
/// # Example
/// ```no_run
/// use qna_prompt::{build_prompt, default_definition, PromptContext};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = default_definition()?;
/// let context = PromptContext {
///     main: vec!["Пароль меняется в настройках профиля.".to_string()],
///     ..Default::default()
/// };
/// let built = build_prompt(&def, "Как изменить пароль?", &context)?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    context: &PromptContext,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = render_system(definition)?;

    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert("main".to_string(), render_list(&context.main));
    variables.insert("conditions".to_string(), render_list(&context.conditions));
    variables.insert("user".to_string(), render_list(&context.user));

    let user = render_template(&definition.template, &variables)?;

    tracing::debug!(
        "Built prompt with {} main, {} conditions, {} user snippets",
        context.main.len(),
        context.conditions.len(),
        context.user.len()
    );

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        context,
        variables,
    ))
}

/// Render the fixed system instruction of a definition.
pub fn render_system(definition: &PromptDefinition) -> AppResult<String> {
    let data = system_variables(definition);
    render_template(&definition.system_template, &data)
}

/// Values the system template may reference.
fn system_variables(definition: &PromptDefinition) -> HashMap<&'static str, handlebars::JsonValue> {
    let mut data = HashMap::new();
    data.insert(
        "platform",
        handlebars::JsonValue::String(definition.persona.platform.clone()),
    );
    data.insert(
        "refusal",
        handlebars::JsonValue::String(definition.refusal.clone()),
    );
    data.insert(
        "rules",
        handlebars::JsonValue::Array(
            definition
                .rules
                .iter()
                .cloned()
                .map(handlebars::JsonValue::String)
                .collect(),
        ),
    );
    data
}

/// Render a Handlebars template with variables.
fn render_template<T: serde::Serialize>(template: &str, variables: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_helper("inc", Box::new(inc));

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Render snippets as a list literal: `['first', 'second']`.
///
/// Each item is quoted the way the knowledge base snippets were shown to
/// the model during prompt design; an empty section renders as `[]`.
pub fn render_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| quote_item(s)).collect();
    format!("[{}]", quoted.join(", "))
}

fn quote_item(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
