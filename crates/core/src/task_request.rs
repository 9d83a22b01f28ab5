//! # Task Request
//!
//! The normalized, read-only input for one orchestration run.
//!
//! Every field has a fallback so that binding a request into a stage
//! template never fails: empty text becomes a `[No X provided]` marker and
//! unset enums render as their default.

use crate::models::normalize_model_preference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Marker used when a value has nothing meaningful to render
pub const NOT_DEFINED: &str = "not defined";

/// Build the `[No <what> provided]` marker for an empty field
pub fn no_value_marker(what: &str) -> String {
    format!("[No {} provided]", what)
}

/// Category of work the prompt is being generated for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    Recommended,
    DataExtraction,
    DecisionSupport,
    ContentGeneration,
    DataAnalysis,
}

impl TaskCategory {
    pub fn all() -> [TaskCategory; 5] {
        [
            TaskCategory::Recommended,
            TaskCategory::DataExtraction,
            TaskCategory::DecisionSupport,
            TaskCategory::ContentGeneration,
            TaskCategory::DataAnalysis,
        ]
    }

    /// Label shown to users and bound into templates
    pub fn label(&self) -> &'static str {
        match self {
            TaskCategory::Recommended => "Recommended",
            TaskCategory::DataExtraction => "Data Extraction",
            TaskCategory::DecisionSupport => "Decision Support",
            TaskCategory::ContentGeneration => "Content Generation",
            TaskCategory::DataAnalysis => "Data Analysis",
        }
    }

    /// Parse from a label or snake_case id, ignoring case, spaces and dashes
    pub fn parse(value: &str) -> Option<TaskCategory> {
        let key = squash(value);
        TaskCategory::all()
            .into_iter()
            .find(|c| squash(c.label()) == key)
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Communication tone of the generated prompt's output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Formal,
    Casual,
}

impl Tone {
    pub fn all() -> [Tone; 4] {
        [Tone::Professional, Tone::Friendly, Tone::Formal, Tone::Casual]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Friendly => "Friendly",
            Tone::Formal => "Formal",
            Tone::Casual => "Casual",
        }
    }

    pub fn parse(value: &str) -> Option<Tone> {
        let key = squash(value);
        Tone::all().into_iter().find(|t| squash(t.label()) == key)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// One few-shot example pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePair {
    pub input: String,
    pub output: String,
}

impl ExamplePair {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Input bundle for one orchestration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// What the user wants done, or an existing prompt to optimize
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: TaskCategory,
    /// Ordered target-model preference; empty means "Recommended"
    #[serde(default)]
    pub model_preference: Vec<String>,
    #[serde(default)]
    pub tone: Tone,
    /// Free-text background information
    #[serde(default)]
    pub context: String,
    /// Optional sample data (JSON, CSV, free text)
    #[serde(default)]
    pub sample_data: Option<String>,
    /// Optional few-shot input/output pairs
    #[serde(default)]
    pub examples: Vec<ExamplePair>,
}

impl TaskRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_sample_data(mut self, data: impl Into<String>) -> Self {
        self.sample_data = Some(data.into());
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.model_preference = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_example(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.examples.push(ExamplePair::new(input, output));
        self
    }

    /// Render every field into its template binding, applying fallbacks.
    ///
    /// Keys: `task_description`, `task_type`, `model_preference`, `tone`,
    /// `context`, `sample_data`, `few_shot_examples`.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert(
            "task_description".to_string(),
            text_or_marker(&self.description, "task description"),
        );
        out.insert("task_type".to_string(), self.category.label().to_string());
        out.insert(
            "model_preference".to_string(),
            normalize_model_preference(&self.model_preference).join(", "),
        );
        out.insert("tone".to_string(), self.tone.label().to_string());
        out.insert(
            "context".to_string(),
            text_or_marker(&self.context, "context"),
        );
        out.insert(
            "sample_data".to_string(),
            text_or_marker(self.sample_data.as_deref().unwrap_or(""), "sample data"),
        );
        out.insert("few_shot_examples".to_string(), self.render_examples());
        out
    }

    fn render_examples(&self) -> String {
        let rendered: Vec<String> = self
            .examples
            .iter()
            .filter(|e| !e.input.trim().is_empty() || !e.output.trim().is_empty())
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "Example {}:\nInput: {}\nOutput: {}",
                    i + 1,
                    or_not_defined(&e.input),
                    or_not_defined(&e.output)
                )
            })
            .collect();
        if rendered.is_empty() {
            no_value_marker("examples")
        } else {
            rendered.join("\n\n")
        }
    }
}

fn text_or_marker(value: &str, what: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        no_value_marker(what)
    } else {
        trimmed.to_string()
    }
}

fn or_not_defined(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        NOT_DEFINED
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_uses_fallbacks() {
        let bindings = TaskRequest::default().bindings();
        assert_eq!(bindings["task_description"], "[No task description provided]");
        assert_eq!(bindings["task_type"], "Recommended");
        assert_eq!(bindings["model_preference"], "Recommended");
        assert_eq!(bindings["tone"], "Professional");
        assert_eq!(bindings["context"], "[No context provided]");
        assert_eq!(bindings["sample_data"], "[No sample data provided]");
        assert_eq!(bindings["few_shot_examples"], "[No examples provided]");
    }

    #[test]
    fn test_whitespace_context_is_treated_as_empty() {
        let bindings = TaskRequest::new("x").with_context("   \n").bindings();
        assert_eq!(bindings["context"], "[No context provided]");
    }

    #[test]
    fn test_examples_render_in_order() {
        let request = TaskRequest::new("Extract dates")
            .with_example("Order Date: 2024-12-15", r#"{"order_date": "2024-12-15"}"#)
            .with_example("", "")
            .with_example("Shipped 2024-12-20", "");
        let rendered = &request.bindings()["few_shot_examples"];
        assert!(rendered.starts_with("Example 1:\nInput: Order Date: 2024-12-15"));
        assert!(rendered.contains("Example 2:\nInput: Shipped 2024-12-20\nOutput: not defined"));
        assert!(!rendered.contains("Example 3"));
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(
            TaskCategory::parse("data-extraction"),
            Some(TaskCategory::DataExtraction)
        );
        assert_eq!(
            TaskCategory::parse("Decision Support"),
            Some(TaskCategory::DecisionSupport)
        );
        assert_eq!(Tone::parse("CASUAL"), Some(Tone::Casual));
        assert_eq!(Tone::parse("sarcastic"), None);
    }

    #[test]
    fn test_deserialize_partial_request() {
        let request: TaskRequest =
            serde_json::from_str(r#"{"description": "Summarize", "category": "data_analysis"}"#)
                .unwrap();
        assert_eq!(request.category, TaskCategory::DataAnalysis);
        assert_eq!(request.tone, Tone::Professional);
        assert!(request.examples.is_empty());
    }
}
