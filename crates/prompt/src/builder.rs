//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use handlebars::Handlebars;
use sage_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system and user templates are rendered with the same variables.
/// Missing variables render as empty strings, so optional sections can be
/// guarded with `{{#if name}}`.
///
/// # Example
/// ```no_run
/// use sage_prompt::{build_prompt, load_prompt};
/// use std::collections::HashMap;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = load_prompt(Path::new("."), "language.translate")?;
/// let mut vars = HashMap::new();
/// vars.insert("text".to_string(), "Black holes are dense.".to_string());
/// vars.insert("target_language".to_string(), "Spanish".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    let user = render(&mut handlebars, "user", &definition.template, &variables)?;
    let system = match &definition.system {
        Some(template) => Some(render(&mut handlebars, "system", template, &variables)?),
        None => None,
    };

    Ok(BuiltPrompt {
        system,
        user: user.trim_end().to_string(),
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            json_output: definition.wants_json(),
            resolved_variables: variables,
        },
    })
}

fn render(
    handlebars: &mut Handlebars<'_>,
    name: &str,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template '{}': {}", name, e)))?;

    handlebars
        .render(name, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template '{}': {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptOutputSpec};

    fn definition(system: Option<&str>, template: &str) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                tone: "neutral".to_string(),
                style: "terse".to_string(),
            },
            system: system.map(str::to_string),
            template: template.to_string(),
            output: PromptOutputSpec {
                format: "json".to_string(),
            },
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_simple_template() {
        let def = definition(None, "Question: {{question}}");
        let built = build_prompt(&def, vars(&[("question", "What is a star?")])).unwrap();
        assert_eq!(built.user, "Question: What is a star?");
        assert!(built.system.is_none());
        assert!(built.metadata.json_output);
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_system_template_is_rendered() {
        let def = definition(Some("Answer in {{target_language}}."), "{{question}}");
        let built = build_prompt(
            &def,
            vars(&[("question", "Hola"), ("target_language", "Spanish")]),
        )
        .unwrap();
        assert_eq!(built.system.as_deref(), Some("Answer in Spanish."));
    }

    #[test]
    fn test_no_html_escaping() {
        let def = definition(None, "{{passages}}");
        let built = build_prompt(&def, vars(&[("passages", "<a> & \"b\"")])).unwrap();
        assert_eq!(built.user, "<a> & \"b\"");
    }

    #[test]
    fn test_conditional_section() {
        let def = definition(None, "Q{{#if conversation}} with {{conversation}}{{/if}}");

        let without = build_prompt(&def, vars(&[("conversation", "")])).unwrap();
        assert_eq!(without.user, "Q");

        let with = build_prompt(&def, vars(&[("conversation", "earlier")])).unwrap();
        assert_eq!(with.user, "Q with earlier");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let def = definition(None, "Question: {{missing}}");
        let built = build_prompt(&def, HashMap::new()).unwrap();
        assert_eq!(built.user, "Question:");
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let def = definition(None, "{{#if open}}never closed");
        let result = build_prompt(&def, HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }
}
