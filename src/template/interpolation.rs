//! Placeholder substitution for template text and button labels.
//!
//! Syntax: `{name}` or `{name.path.0}` for nested lookups. `{{` and `}}`
//! produce literal braces. Anything between braces that is not a valid
//! path (`{ }`, `{a b}`, `{x:>3}`) is copied through untouched.
//!
//! Substitution is a single pass over the template: values coming from the
//! context are never re-scanned, so context data cannot inject placeholders.

use serde_json::Value;

use crate::config::{MissingPlaceholderMode, TemplateSettings};
use crate::metrics::RenderMetrics;

use super::context::ContextLookup;

/// A placeholder that the context could not satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationGap {
    pub placeholder: String,
}

/// Output of one interpolation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub text: String,
    /// Distinct missing placeholders, in order of first appearance
    pub gaps: Vec<InterpolationGap>,
}

impl Interpolated {
    /// Log one warning per missing placeholder
    pub fn report(&self, position: &str) {
        report_gaps(&self.gaps, position);
    }
}

/// Log one warning per gap and count them
pub fn report_gaps(gaps: &[InterpolationGap], position: &str) {
    if gaps.is_empty() {
        return;
    }

    RenderMetrics::record_gaps(gaps.len() as u64);
    for gap in gaps {
        tracing::warn!(
            placeholder = %gap.placeholder,
            position,
            "Placeholder missing from render context"
        );
    }
}

/// What replaces a placeholder missing from the context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MissingPlaceholder {
    /// Keep `{name}` verbatim
    #[default]
    Keep,
    /// Drop the placeholder. A message body left blank by this is sent with
    /// its placeholders kept instead
    Empty,
    Sentinel(String),
}

#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    missing: MissingPlaceholder,
}

impl Interpolator {
    pub fn new(missing: MissingPlaceholder) -> Self {
        Self { missing }
    }

    pub fn from_settings(settings: &TemplateSettings) -> Self {
        let missing = match settings.missing_placeholder {
            MissingPlaceholderMode::Keep => MissingPlaceholder::Keep,
            MissingPlaceholderMode::Empty => MissingPlaceholder::Empty,
            MissingPlaceholderMode::Sentinel => {
                MissingPlaceholder::Sentinel(settings.sentinel.clone())
            }
        };
        Self::new(missing)
    }

    /// Render message text, logging any gaps
    pub fn render_text<C>(&self, template: &str, context: &C) -> String
    where
        C: ContextLookup + ?Sized,
    {
        let out = self.interpolate(template, context);
        out.report("text");
        out.text
    }

    /// Render a button label or payload, logging any gaps
    pub fn render_label<C>(&self, template: &str, context: &C) -> String
    where
        C: ContextLookup + ?Sized,
    {
        let out = self.interpolate(template, context);
        out.report("label");
        out.text
    }

    /// Substitute placeholders without logging
    pub fn interpolate<C: ContextLookup + ?Sized>(
        &self,
        template: &str,
        context: &C,
    ) -> Interpolated {
        let mut text = String::with_capacity(template.len());
        let mut gaps: Vec<InterpolationGap> = Vec::new();
        let mut rest = template;

        while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
            text.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("{{") {
                text.push('{');
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with("}}") {
                text.push('}');
                rest = &tail[2..];
                continue;
            }
            if tail.starts_with('}') {
                text.push('}');
                rest = &tail[1..];
                continue;
            }

            // tail starts with a single '{'
            let body = &tail[1..];
            match body.find(|c: char| c == '{' || c == '}') {
                Some(end) if body[end..].starts_with('}') && is_placeholder(&body[..end]) => {
                    let name = &body[..end];
                    match context.lookup(name) {
                        Some(value) => push_value(&mut text, value),
                        None => {
                            self.push_missing(&mut text, name);
                            if !gaps.iter().any(|g| g.placeholder == name) {
                                gaps.push(InterpolationGap {
                                    placeholder: name.to_string(),
                                });
                            }
                        }
                    }
                    rest = &body[end + 1..];
                }
                _ => {
                    text.push('{');
                    rest = body;
                }
            }
        }
        text.push_str(rest);

        Interpolated { text, gaps }
    }

    fn push_missing(&self, text: &mut String, name: &str) {
        match &self.missing {
            MissingPlaceholder::Keep => {
                text.push('{');
                text.push_str(name);
                text.push('}');
            }
            MissingPlaceholder::Empty => {}
            MissingPlaceholder::Sentinel(sentinel) => text.push_str(sentinel),
        }
    }
}

/// `name` or `name.path` made of ASCII letters, digits and underscores
fn is_placeholder(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Deterministic stringification of context values.
///
/// Strings as-is, numbers in their shortest round-trip form without
/// grouping, booleans as `true`/`false`, null as empty, lists and maps
/// as compact JSON.
pub fn stringify(value: &Value) -> String {
    let mut out = String::new();
    push_value(&mut out, value);
    out
}

fn push_value(text: &mut String, value: &Value) {
    match value {
        Value::String(s) => text.push_str(s),
        Value::Number(n) => text.push_str(&n.to_string()),
        Value::Bool(b) => text.push_str(if *b { "true" } else { "false" }),
        Value::Null => {}
        // For arrays and objects, use JSON representation
        _ => text.push_str(&value.to_string()),
    }
}
