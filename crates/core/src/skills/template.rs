//! # Task Templates
//!
//! Task descriptions with named `{placeholder}` slots.
//!
//! - `{name}` is replaced by the binding called `name`.
//! - `{name|fallback text}` uses `fallback text` when `name` is not bound.
//! - `{{` and `}}` produce literal braces.
//! - Any other brace (e.g. a JSON example `{"role": ...}`) is left as is.
//!
//! A template is parsed once when the crew config loads and bound once per
//! stage execution.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StageError;
use crate::task_request::no_value_marker;

const PLACEHOLDER_PATTERN: &str = r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)(?:\|([^{}]*))?\}";

/// How unsupplied placeholders are treated at bind time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingPolicy {
    /// Substitute a `[No <name> provided]` marker
    #[default]
    Lenient,
    /// Fail the stage with [`StageError::TemplateBinding`]
    Strict,
}

/// A named slot declared by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    /// Inline fallback from `{name|fallback}`
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(usize),
}

/// A parsed task template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    source: String,
    segments: Vec<Segment>,
    placeholders: Vec<Placeholder>,
}

impl TaskTemplate {
    /// Parse a template, collecting its declared placeholders in order of
    /// first appearance.
    pub fn parse(source: &str) -> Result<Self> {
        let pattern = Regex::new(PLACEHOLDER_PATTERN).context("Invalid placeholder pattern")?;

        let mut segments = Vec::new();
        let mut placeholders: Vec<Placeholder> = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in pattern.captures_iter(source) {
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&source[last..whole.start()]);
            last = whole.end();

            match caps.get(1) {
                None => {
                    // Escaped brace
                    literal.push_str(&whole.as_str()[..1]);
                }
                Some(name) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    let name = name.as_str();
                    let default = caps.get(2).map(|d| d.as_str().to_string());
                    let idx = match placeholders.iter().position(|p| p.name == name) {
                        Some(idx) => {
                            if placeholders[idx].default.is_none() {
                                placeholders[idx].default = default;
                            }
                            idx
                        }
                        None => {
                            placeholders.push(Placeholder {
                                name: name.to_string(),
                                default,
                            });
                            placeholders.len() - 1
                        }
                    };
                    segments.push(Segment::Slot(idx));
                }
            }
        }
        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
            placeholders,
        })
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Whether the template declares `name`
    pub fn declares(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p.name == name)
    }

    /// Substitute bindings into the template.
    ///
    /// Resolution per placeholder: supplied binding, then inline default, then
    /// the policy (marker when lenient, [`StageError::TemplateBinding`] when
    /// strict). Bindings the template does not declare are ignored.
    pub fn bind(
        &self,
        stage: &str,
        bindings: &BTreeMap<String, String>,
        policy: BindingPolicy,
    ) -> Result<String, StageError> {
        let mut values = Vec::with_capacity(self.placeholders.len());
        for placeholder in &self.placeholders {
            let value = match (bindings.get(&placeholder.name), &placeholder.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => match policy {
                    BindingPolicy::Lenient => {
                        no_value_marker(&placeholder.name.replace('_', " "))
                    }
                    BindingPolicy::Strict => {
                        return Err(StageError::template_binding(stage, &placeholder.name));
                    }
                },
            };
            values.push(value);
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(idx) => out.push_str(&values[*idx]),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_placeholders_in_order() {
        let template =
            TaskTemplate::parse("Task: {task_description}\nTone: {tone}\nAgain: {task_description}")
                .unwrap();
        let names: Vec<_> = template.placeholders().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["task_description", "tone"]);
    }

    #[test]
    fn test_bind_substitutes_every_occurrence() {
        let template = TaskTemplate::parse("{a} and {b} and {a}").unwrap();
        let out = template
            .bind("s", &bindings(&[("a", "x"), ("b", "y")]), BindingPolicy::Strict)
            .unwrap();
        assert_eq!(out, "x and y and x");
    }

    #[test]
    fn test_json_braces_and_escapes_are_literal() {
        let template =
            TaskTemplate::parse(r#"Return {"role": "..."} for {name}. Use {{name}} literally."#)
                .unwrap();
        assert_eq!(template.placeholders().len(), 1);
        let out = template
            .bind("s", &bindings(&[("name", "Ada")]), BindingPolicy::Strict)
            .unwrap();
        assert_eq!(out, r#"Return {"role": "..."} for Ada. Use {name} literally."#);
    }

    #[test]
    fn test_lenient_substitutes_marker() {
        let template = TaskTemplate::parse("Data: {sample_data}").unwrap();
        let out = template
            .bind("s", &BTreeMap::new(), BindingPolicy::Lenient)
            .unwrap();
        assert_eq!(out, "Data: [No sample data provided]");
    }

    #[test]
    fn test_strict_raises_binding_error() {
        let template = TaskTemplate::parse("Context: {context}").unwrap();
        let err = template
            .bind("architect", &BTreeMap::new(), BindingPolicy::Strict)
            .unwrap_err();
        assert_eq!(err, StageError::template_binding("architect", "context"));
    }

    #[test]
    fn test_inline_default_satisfies_strict() {
        let template = TaskTemplate::parse("Audience: {audience|general readers}").unwrap();
        let out = template
            .bind("s", &BTreeMap::new(), BindingPolicy::Strict)
            .unwrap();
        assert_eq!(out, "Audience: general readers");

        let out = template
            .bind("s", &bindings(&[("audience", "lawyers")]), BindingPolicy::Strict)
            .unwrap();
        assert_eq!(out, "Audience: lawyers");
    }

    #[test]
    fn test_extra_bindings_are_ignored() {
        let template = TaskTemplate::parse("plain text").unwrap();
        let out = template
            .bind("s", &bindings(&[("unused", "v")]), BindingPolicy::Strict)
            .unwrap();
        assert_eq!(out, "plain text");
        assert!(!template.declares("unused"));
    }
}
