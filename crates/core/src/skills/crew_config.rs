//! # Crew Configuration
//!
//! Agent role definitions and task templates, loaded from YAML.
//!
//! `agents.yaml` maps an agent key to `{role, goal, backstory}`;
//! `tasks.yaml` maps a task key to `{description, expected_output, agent}`.
//! The architect runs `analyze_requirements_task`; engineer `i` runs
//! `optimize_prompt_direction_{i}`, falling back to
//! `optimize_prompt_direction` when no slot-specific task exists.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::prompts::{AGENTS_YAML, TASKS_YAML};
use super::stage::StageDefinition;
use super::template::TaskTemplate;
use crate::error::OrchestrationError;

pub const ARCHITECT_TASK: &str = "analyze_requirements_task";
pub const ENGINEER_TASK: &str = "optimize_prompt_direction";

/// Role definition for one agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
}

impl AgentDefinition {
    /// Persona block placed at the top of the system prompt
    pub fn persona(&self) -> String {
        let mut out = format!(
            "You are {}.\nYour goal: {}",
            self.role.trim(),
            self.goal.trim()
        );
        if !self.backstory.trim().is_empty() {
            out.push_str(&format!("\nBackground: {}", self.backstory.trim()));
        }
        out
    }
}

/// Raw task entry as written in `tasks.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub description: String,
    #[serde(default)]
    pub expected_output: String,
    /// Key into `agents.yaml`
    pub agent: String,
}

#[derive(Debug, Clone)]
struct CompiledTask {
    agent: String,
    description: TaskTemplate,
    expected_output: TaskTemplate,
}

/// Loaded and parsed crew configuration
#[derive(Debug, Clone)]
pub struct CrewConfig {
    agents: BTreeMap<String, AgentDefinition>,
    tasks: BTreeMap<String, CompiledTask>,
}

impl CrewConfig {
    /// The configuration compiled into the binary
    pub fn bundled() -> Result<Self> {
        Self::from_yaml(AGENTS_YAML, TASKS_YAML).context("Bundled crew config is invalid")
    }

    /// Load `agents.yaml` and `tasks.yaml` from a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let agents_path = dir.join("agents.yaml");
        let tasks_path = dir.join("tasks.yaml");
        let agents = std::fs::read_to_string(&agents_path)
            .with_context(|| format!("Failed to read {}", agents_path.display()))?;
        let tasks = std::fs::read_to_string(&tasks_path)
            .with_context(|| format!("Failed to read {}", tasks_path.display()))?;
        tracing::info!(dir = %dir.display(), "Loading crew config");
        Self::from_yaml(&agents, &tasks)
    }

    /// Parse both documents and check that every task's agent exists
    pub fn from_yaml(agents_yaml: &str, tasks_yaml: &str) -> Result<Self> {
        let agents: BTreeMap<String, AgentDefinition> =
            serde_yaml::from_str(agents_yaml).context("Failed to parse agents.yaml")?;
        let raw_tasks: BTreeMap<String, TaskDefinition> =
            serde_yaml::from_str(tasks_yaml).context("Failed to parse tasks.yaml")?;

        let mut tasks = BTreeMap::new();
        for (key, task) in raw_tasks {
            if !agents.contains_key(&task.agent) {
                anyhow::bail!("Task '{}' references unknown agent '{}'", key, task.agent);
            }
            let description = TaskTemplate::parse(&task.description)
                .with_context(|| format!("Task '{}' has an invalid description", key))?;
            let expected_output = TaskTemplate::parse(&task.expected_output)
                .with_context(|| format!("Task '{}' has an invalid expected_output", key))?;
            tasks.insert(
                key,
                CompiledTask {
                    agent: task.agent,
                    description,
                    expected_output,
                },
            );
        }

        Ok(Self { agents, tasks })
    }

    pub fn agent(&self, key: &str) -> Option<&AgentDefinition> {
        self.agents.get(key)
    }

    /// Check the crew can drive a run with `engineer_count` engineers
    pub fn validate(&self, engineer_count: usize) -> Result<(), OrchestrationError> {
        if engineer_count == 0 {
            return Err(OrchestrationError::InvalidConfig(
                "engineer count must be at least 1".to_string(),
            ));
        }
        self.architect_stage()?;
        for slot in 1..=engineer_count {
            self.engineer_stage(slot)?;
        }
        Ok(())
    }

    /// Stage definition for the architect
    pub fn architect_stage(&self) -> Result<StageDefinition, OrchestrationError> {
        let task = self.tasks.get(ARCHITECT_TASK).ok_or_else(|| {
            OrchestrationError::InvalidConfig(format!("missing task '{}'", ARCHITECT_TASK))
        })?;
        Ok(self.stage_from("architect", task))
    }

    /// Stage definition for engineer `slot` (1-based)
    pub fn engineer_stage(&self, slot: usize) -> Result<StageDefinition, OrchestrationError> {
        let specific = format!("{}_{}", ENGINEER_TASK, slot);
        let task = self
            .tasks
            .get(&specific)
            .or_else(|| self.tasks.get(ENGINEER_TASK))
            .ok_or_else(|| {
                OrchestrationError::InvalidConfig(format!(
                    "no task '{}' or '{}' for engineer {}",
                    specific, ENGINEER_TASK, slot
                ))
            })?;
        Ok(self.stage_from(&format!("engineer_{}", slot), task))
    }

    fn stage_from(&self, name: &str, task: &CompiledTask) -> StageDefinition {
        // Agent existence is checked at load time
        let agent = self.agents.get(&task.agent).cloned().unwrap_or_else(|| {
            AgentDefinition {
                role: task.agent.clone(),
                goal: String::new(),
                backstory: String::new(),
            }
        });
        StageDefinition {
            name: name.to_string(),
            agent_key: task.agent.clone(),
            agent,
            template: task.description.clone(),
            expected_output: task.expected_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGENTS: &str = r#"
architect:
  role: Architect
  goal: Propose directions
prompt_engineer:
  role: Engineer
  goal: Write prompts
"#;

    #[test]
    fn test_bundled_config_supports_three_engineers() {
        let crew = CrewConfig::bundled().unwrap();
        crew.validate(3).unwrap();

        let stage = crew.engineer_stage(2).unwrap();
        assert_eq!(stage.name, "engineer_2");
        assert_eq!(stage.agent_key, "prompt_engineer_2");
        assert!(stage.template.declares("direction"));
        assert!(stage.template.declares("context"));
    }

    #[test]
    fn test_architect_template_declares_all_request_fields() {
        let crew = CrewConfig::bundled().unwrap();
        let stage = crew.architect_stage().unwrap();
        for key in [
            "task_description",
            "task_type",
            "model_preference",
            "tone",
            "context",
            "sample_data",
            "few_shot_examples",
        ] {
            assert!(stage.template.declares(key), "architect should declare {}", key);
        }
    }

    #[test]
    fn test_engineer_falls_back_to_generic_task() {
        let crew = CrewConfig::bundled().unwrap();
        let stage = crew.engineer_stage(5).unwrap();
        assert_eq!(stage.name, "engineer_5");
        assert_eq!(stage.agent_key, "prompt_engineer");
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let tasks = r#"
analyze_requirements_task:
  description: "{task_description}"
  agent: ghost
"#;
        let err = CrewConfig::from_yaml(AGENTS, tasks).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_missing_engineer_template_is_invalid_config() {
        let tasks = r#"
analyze_requirements_task:
  description: "{task_description}"
  agent: architect
optimize_prompt_direction_1:
  description: "{direction}"
  agent: prompt_engineer
"#;
        let crew = CrewConfig::from_yaml(AGENTS, tasks).unwrap();
        crew.validate(1).unwrap();
        let err = crew.validate(2).unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("agents.yaml"), AGENTS).unwrap();
        std::fs::write(
            dir.path().join("tasks.yaml"),
            "analyze_requirements_task:\n  description: x\n  agent: architect\n\
             optimize_prompt_direction:\n  description: y\n  agent: prompt_engineer\n",
        )
        .unwrap();
        let crew = CrewConfig::from_dir(dir.path()).unwrap();
        crew.validate(4).unwrap();
        assert_eq!(crew.tasks.len(), 2);
    }

    #[test]
    fn test_from_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CrewConfig::from_dir(dir.path()).is_err());
    }
}
