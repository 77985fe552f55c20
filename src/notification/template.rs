//! Captions for remote alerts, rendered with minijinja.

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use thiserror::Error;

use crate::models::DetectionEvent;

/// A caption template that could not be rendered.
#[derive(Debug, Error)]
#[error("Failed to render template: {0}")]
pub struct TemplateServiceError(#[from] minijinja::Error);

/// Renders operator-supplied caption templates. Variables a template uses but
/// the event context lacks are errors, not empty strings.
pub struct TemplateService {
    env: Environment<'static>,
}

impl TemplateService {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }

    /// Renders `template` against `context`.
    pub fn render(&self, template: &str, context: &Value) -> Result<String, TemplateServiceError> {
        Ok(self.env.render_str(template, context)?)
    }

    /// Renders the caption for `event`. A broken template falls back to
    /// `"<Label>: <identifier>"` so the alert still goes out.
    pub fn caption(&self, template: &str, event: &DetectionEvent, context: &Value) -> String {
        self.render(template, context).unwrap_or_else(|e| {
            tracing::warn!(template, error = %e, "Caption template failed, using default caption.");
            format!("{}: {}", event.category.label(), event.identifier)
        })
    }
}

impl Default for TemplateService {
    fn default() -> Self {
        Self::new()
    }
}
