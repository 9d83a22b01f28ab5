//! Default crew configuration bundled at compile time.
//!
//! Used when no config directory is given. A directory containing its own
//! `agents.yaml` and `tasks.yaml` replaces both files.

/// Agent role definitions (role, goal, backstory)
pub const AGENTS_YAML: &str = include_str!("defaults/agents.yaml");

/// Task definitions (description template, expected output, agent key)
pub const TASKS_YAML: &str = include_str!("defaults/tasks.yaml");

/// Instructions appended to every stage's system prompt
pub const OUTPUT_INSTRUCTIONS: &str = "\
Respond with a single JSON object and nothing else. \
The object must match this JSON schema:";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_files_non_empty() {
        for (name, content) in [("agents.yaml", AGENTS_YAML), ("tasks.yaml", TASKS_YAML)] {
            assert!(content.len() > 50, "'{}' seems too short", name);
        }
    }

    #[test]
    fn test_bundled_tasks_cover_default_crew() {
        for key in [
            "analyze_requirements_task",
            "optimize_prompt_direction",
            "optimize_prompt_direction_1",
            "optimize_prompt_direction_2",
            "optimize_prompt_direction_3",
        ] {
            assert!(TASKS_YAML.contains(&format!("{}:", key)), "missing {}", key);
        }
    }
}
