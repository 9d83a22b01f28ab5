//! # Architect Skill
//!
//! Analyzes a task request and proposes candidate directions.
//! The architect sees every request field; the direction count check is
//! left to the coordinator so that a short list is reported as a run-level
//! failure rather than a stage failure.

use std::collections::BTreeMap;

use super::artifact_registry::DirectionList;
use super::stage::{StageDefinition, StageExecutor};
use crate::error::StageError;
use crate::models::ModelConfig;
use crate::task_request::TaskRequest;

pub struct ArchitectSkill;

impl ArchitectSkill {
    /// Template bindings for the architect stage
    pub fn bindings(request: &TaskRequest, direction_count: usize) -> BTreeMap<String, String> {
        let mut bindings = request.bindings();
        bindings.insert("direction_count".to_string(), direction_count.to_string());
        bindings
    }

    /// SDK-style call for direct Coordinator integration.
    pub async fn run(
        executor: &StageExecutor,
        stage: &StageDefinition,
        request: &TaskRequest,
        direction_count: usize,
        config: &ModelConfig,
    ) -> Result<DirectionList, StageError> {
        let bindings = Self::bindings(request, direction_count);
        let directions: DirectionList = executor.execute(stage, config.clone(), &bindings).await?;

        tracing::info!(
            stage = %stage.name,
            proposed = directions.len(),
            "Architect proposed directions"
        );
        Ok(directions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedService;
    use crate::skills::crew_config::CrewConfig;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_bindings_add_direction_count() {
        let bindings = ArchitectSkill::bindings(&TaskRequest::new("x"), 4);
        assert_eq!(bindings["direction_count"], "4");
        assert_eq!(bindings["task_description"], "x");
        assert_eq!(bindings.len(), 8);
    }

    #[tokio::test]
    async fn test_run_returns_directions_in_order() {
        let service = Arc::new(ScriptedService::new().reply(
            "architect",
            r#"Here is my analysis:
```json
{"directions": [
  {"name": "Schema-first", "focus": "f1", "relevance": "r1"},
  {"name": "Few-shot", "focus": "f2", "relevance": "r2"},
  {"name": "Validator loop", "focus": "f3", "relevance": "r3"}
]}
```"#,
        ));
        let executor = StageExecutor::new(service.clone(), Duration::from_secs(5));
        let stage = CrewConfig::bundled().unwrap().architect_stage().unwrap();

        let directions = ArchitectSkill::run(
            &executor,
            &stage,
            &TaskRequest::new("Extract order dates"),
            3,
            &ModelConfig::default(),
        )
        .await
        .unwrap();

        let names: Vec<_> = directions.directions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Schema-first", "Few-shot", "Validator loop"]);
        assert!(service.calls()[0].prompt.contains("propose 3 distinct"));
    }
}
