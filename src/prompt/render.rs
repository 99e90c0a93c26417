//! Prompt Renderer - Render templates with context variables using Handlebars
//!
//! Templates are compiled once when registered and rendered by name per call.
//! HTML escaping is off because every prompt is plain text or markdown.

use std::collections::HashMap;

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{RefinrError, Result};

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a new PromptRenderer with default settings
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render as empty strings
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render a template string with the given context
    pub fn render(&self, template: &str, context: &HashMap<String, String>) -> Result<String> {
        self.render_with(template, context)
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| RefinrError::Template(format!("Failed to render template: {}", e)))
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| RefinrError::Template(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a previously registered template
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| RefinrError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let renderer = PromptRenderer::new();
        let mut context = HashMap::new();
        context.insert("name".to_string(), "World".to_string());

        let result = renderer.render("Hello, {{name}}!", &context).unwrap();
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_render_missing_variable_empty_string() {
        let renderer = PromptRenderer::new();
        let context: HashMap<String, String> = HashMap::new();

        let result = renderer.render("Hello, {{name}}!", &context).unwrap();
        assert_eq!(result, "Hello, !");
    }

    #[test]
    fn test_render_no_escape_html() {
        let renderer = PromptRenderer::new();
        let context = json!({ "code": "if a < b && b > c { \"x\" }" });

        let result = renderer.render_with("Code: {{code}}", &context).unwrap();
        assert_eq!(result, "Code: if a < b && b > c { \"x\" }");
    }

    #[test]
    fn test_render_each_and_if() {
        let renderer = PromptRenderer::new();
        let template = "{{#each items}}- {{this}}\n{{/each}}{{#if note}}Note: {{note}}{{/if}}";
        let context = json!({ "items": ["a", "b"], "note": "" });

        let result = renderer.render_with(template, &context).unwrap();
        assert_eq!(result, "- a\n- b\n");
    }

    #[test]
    fn test_register_and_render_named() {
        let mut renderer = PromptRenderer::new();
        assert!(!renderer.has_template("greeting"));
        renderer.register_template("greeting", "Hello, {{name}}!").unwrap();
        assert!(renderer.has_template("greeting"));

        let result = renderer.render_named("greeting", &json!({ "name": "Ferris" })).unwrap();
        assert_eq!(result, "Hello, Ferris!");
    }

    #[test]
    fn test_render_named_not_found() {
        let renderer = PromptRenderer::new();
        let result = renderer.render_named("nonexistent", &json!({}));
        assert!(matches!(result, Err(RefinrError::Template(_))));
    }

    #[test]
    fn test_register_invalid_template() {
        let mut renderer = PromptRenderer::new();
        let result = renderer.register_template("broken", "{{#each items}}no close");
        assert!(matches!(result, Err(RefinrError::Template(_))));
    }

    #[test]
    fn test_render_preserves_whitespace() {
        let renderer = PromptRenderer::new();
        let context: HashMap<String, String> = HashMap::new();

        let result = renderer.render("Line 1\n\nLine 3\n\n\nLine 6", &context).unwrap();
        assert_eq!(result, "Line 1\n\nLine 3\n\n\nLine 6");
    }
}
