//! # Artifact Registry
//!
//! Structured outputs exchanged between crew stages.
//!
//! - [`DirectionList`] is produced by the architect and consumed, one
//!   [`Direction`] per slot, by the engineers.
//! - [`PromptArtifact`] is produced by each engineer.
//!
//! Both implement [`StageOutput`], so their JSON schema is what the
//! generation backend is asked to follow.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::schema::StageOutput;

// ============================================================================
// Architect Artifacts
// ============================================================================

/// One solution strategy proposed by the architect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Direction {
    /// Short name of the strategy
    pub name: String,
    /// What this strategy concentrates on
    pub focus: String,
    /// Why it fits the task
    pub relevance: String,
    #[serde(default)]
    pub benefits: Vec<String>,
    /// Open key/value notes (e.g. "reasoning": "chain of thought")
    #[serde(default)]
    pub implementation_considerations: BTreeMap<String, serde_json::Value>,
    /// Engineer the architect had in mind; assignment is still by position
    #[serde(default)]
    pub assigned_engineer: String,
}

impl Direction {
    pub fn new(
        name: impl Into<String>,
        focus: impl Into<String>,
        relevance: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            focus: focus.into(),
            relevance: relevance.into(),
            benefits: Vec::new(),
            implementation_considerations: BTreeMap::new(),
            assigned_engineer: String::new(),
        }
    }
}

/// Architect output: candidate directions in proposal order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DirectionList {
    pub directions: Vec<Direction>,
}

impl DirectionList {
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Direction> {
        self.directions.get(index)
    }

    /// One line per direction, used as read-only context for engineers
    pub fn overview(&self) -> String {
        self.directions
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}. {}: {}", i + 1, d.name, d.focus))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl StageOutput for DirectionList {
    fn validate(&self) -> Result<(), String> {
        if let Some(pos) = self.directions.iter().position(|d| d.name.trim().is_empty()) {
            return Err(format!("direction {} has an empty name", pos + 1));
        }
        Ok(())
    }
}

// ============================================================================
// Engineer Artifacts
// ============================================================================

/// A chosen technique and the reason for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MethodChoice {
    pub selection: String,
    pub justification: String,
}

impl MethodChoice {
    pub fn new(selection: impl Into<String>, justification: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            justification: justification.into(),
        }
    }
}

/// Engineer output: one fully specified prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PromptArtifact {
    /// Persona the target model should adopt
    pub role: String,
    /// What the target model must do
    pub task: String,
    pub rules_constraints: String,
    pub reasoning_method: MethodChoice,
    pub planning_method: MethodChoice,
    pub output_format: MethodChoice,
    /// Why this prompt suits its direction
    pub explanation: String,
    pub usage_guidelines: String,
}

impl PromptArtifact {
    /// Render as a single prompt text ready to paste into a model
    pub fn render(&self) -> String {
        format!(
            "# Role\n{}\n\n# Task\n{}\n\n# Rules & Constraints\n{}\n\n# Reasoning\n{}\n\n# Planning\n{}\n\n# Output Format\n{}",
            self.role,
            self.task,
            self.rules_constraints,
            self.reasoning_method.selection,
            self.planning_method.selection,
            self.output_format.selection,
        )
    }
}

impl StageOutput for PromptArtifact {
    fn validate(&self) -> Result<(), String> {
        let fields = [
            ("role", self.role.as_str()),
            ("task", self.task.as_str()),
            ("rules_constraints", self.rules_constraints.as_str()),
            ("reasoning_method.selection", self.reasoning_method.selection.as_str()),
            ("planning_method.selection", self.planning_method.selection.as_str()),
            ("output_format.selection", self.output_format.selection.as_str()),
            ("explanation", self.explanation.as_str()),
            ("usage_guidelines", self.usage_guidelines.as_str()),
        ];
        let blank: Vec<&str> = fields
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if blank.is_empty() {
            Ok(())
        } else {
            Err(format!("empty field(s): {}", blank.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::schema::{parse_output, schema_of};

    #[test]
    fn test_prompt_artifact_schema_requires_all_fields() {
        let schema = schema_of::<PromptArtifact>();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in [
            "role",
            "task",
            "rules_constraints",
            "reasoning_method",
            "planning_method",
            "output_format",
            "explanation",
            "usage_guidelines",
        ] {
            assert!(required.contains(&field), "{} should be required", field);
        }
    }

    #[test]
    fn test_direction_defaults_optional_fields() {
        let list: DirectionList = parse_output(
            "architect",
            r#"{"directions": [{"name": "Chain", "focus": "Steps", "relevance": "Fits"}]}"#,
        )
        .unwrap();
        assert_eq!(list.len(), 1);
        assert!(list.directions[0].benefits.is_empty());
        assert_eq!(list.overview(), "1. Chain: Steps");
    }

    #[test]
    fn test_blank_direction_name_rejected() {
        let list = DirectionList {
            directions: vec![Direction::new(" ", "f", "r")],
        };
        assert!(list.validate().is_err());
    }

    #[test]
    fn test_blank_artifact_field_rejected() {
        let artifact = PromptArtifact {
            role: "Analyst".to_string(),
            task: "".to_string(),
            rules_constraints: "None".to_string(),
            reasoning_method: MethodChoice::new("CoT", "multi-step"),
            planning_method: MethodChoice::new("Plan-and-solve", "ordered"),
            output_format: MethodChoice::new("JSON", "machine-readable"),
            explanation: "e".to_string(),
            usage_guidelines: "u".to_string(),
        };
        let err = artifact.validate().unwrap_err();
        assert!(err.contains("task"));
        assert!(artifact.render().starts_with("# Role\nAnalyst"));
    }
}
