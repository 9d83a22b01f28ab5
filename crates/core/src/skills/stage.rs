//! # Stage Executor
//!
//! Runs one named unit of work: binds the stage's task template, makes a
//! single call to the generation backend under a timeout, and parses the
//! answer into the stage's output type.
//!
//! ```text
//! StageDefinition + bindings ──bind──▶ GenerationRequest
//!        ──generate (timeout)──▶ raw text ──parse_output──▶ T
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::crew_config::AgentDefinition;
use super::prompts::OUTPUT_INSTRUCTIONS;
use super::schema::{parse_output, schema_of, StageOutput};
use super::template::{BindingPolicy, TaskTemplate};
use crate::error::StageError;
use crate::llm::{GenerationRequest, GenerationService};
use crate::models::ModelConfig;

/// Everything needed to run one stage: role, template and expected output
#[derive(Debug, Clone)]
pub struct StageDefinition {
    /// Stage name ("architect", "engineer_1", ...)
    pub name: String,
    /// Agent key in the crew config
    pub agent_key: String,
    pub agent: AgentDefinition,
    pub template: TaskTemplate,
    pub expected_output: TaskTemplate,
}

impl StageDefinition {
    /// Bind the templates and assemble the generation request for output `T`
    pub fn build_request<T: StageOutput>(
        &self,
        model: ModelConfig,
        bindings: &BTreeMap<String, String>,
        policy: BindingPolicy,
    ) -> Result<GenerationRequest, StageError> {
        let prompt = self.template.bind(&self.name, bindings, policy)?;
        let expected = self.expected_output.bind(&self.name, bindings, policy)?;
        let schema = schema_of::<T>();

        let mut system_prompt = self.agent.persona();
        if !expected.trim().is_empty() {
            system_prompt.push_str("\n\nExpected output: ");
            system_prompt.push_str(expected.trim());
        }
        system_prompt.push_str("\n\n");
        system_prompt.push_str(OUTPUT_INSTRUCTIONS);
        system_prompt.push('\n');
        system_prompt.push_str(&serde_json::to_string_pretty(&schema).unwrap_or_default());

        Ok(GenerationRequest {
            agent: self.agent_key.clone(),
            stage: self.name.clone(),
            model,
            system_prompt,
            prompt,
            schema,
        })
    }
}

/// Executes stages against a shared generation backend
#[derive(Clone)]
pub struct StageExecutor {
    service: Arc<dyn GenerationService>,
    timeout: Duration,
    policy: BindingPolicy,
}

impl StageExecutor {
    pub fn new(service: Arc<dyn GenerationService>, timeout: Duration) -> Self {
        Self {
            service,
            timeout,
            policy: BindingPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: BindingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run `stage` once and parse its output.
    ///
    /// Exactly one backend call is made unless binding fails first.
    pub async fn execute<T: StageOutput>(
        &self,
        stage: &StageDefinition,
        model: ModelConfig,
        bindings: &BTreeMap<String, String>,
    ) -> Result<T, StageError> {
        let request = stage.build_request::<T>(model, bindings, self.policy)?;

        tracing::debug!(
            stage = %stage.name,
            agent = %stage.agent_key,
            prompt_len = request.prompt.len(),
            "Executing stage"
        );

        let text = match tokio::time::timeout(self.timeout, self.service.generate(request)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(e.for_stage(&stage.name)),
            Err(_) => return Err(StageError::timeout(&stage.name, self.timeout)),
        };

        parse_output::<T>(&stage.name, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::{Script, ScriptedService};
    use crate::skills::artifact_registry::DirectionList;
    use crate::skills::crew_config::CrewConfig;
    use crate::task_request::TaskRequest;

    fn architect() -> StageDefinition {
        CrewConfig::bundled().unwrap().architect_stage().unwrap()
    }

    const TWO_DIRECTIONS: &str = r#"{"directions": [
        {"name": "A", "focus": "fa", "relevance": "ra"},
        {"name": "B", "focus": "fb", "relevance": "rb"}
    ]}"#;

    #[tokio::test]
    async fn test_execute_parses_output() {
        let service = Arc::new(ScriptedService::new().reply("architect", TWO_DIRECTIONS));
        let executor = StageExecutor::new(service.clone(), Duration::from_secs(5));

        let list: DirectionList = executor
            .execute(
                &architect(),
                ModelConfig::default(),
                &TaskRequest::new("Extract dates").bindings(),
            )
            .await
            .unwrap();

        assert_eq!(list.len(), 2);
        let calls = service.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].agent, "architect");
        assert!(calls[0].prompt.contains("Extract dates"));
        assert!(calls[0].system_prompt.contains("Prompt Solution Architect"));
        assert!(calls[0].system_prompt.contains("\"directions\""));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_stage_timeout() {
        let service = Arc::new(ScriptedService::new().on("architect", Script::Hang));
        let executor = StageExecutor::new(service, Duration::from_millis(20));

        let err = executor
            .execute::<DirectionList>(&architect(), ModelConfig::default(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, StageError::timeout("architect", Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let service =
            Arc::new(ScriptedService::new().on("architect", Script::Fail("HTTP 503".to_string())));
        let executor = StageExecutor::new(service, Duration::from_secs(5));

        let err = executor
            .execute::<DirectionList>(&architect(), ModelConfig::default(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, StageError::transport("architect", "HTTP 503"));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_schema_violation() {
        let service = Arc::new(ScriptedService::new().reply("architect", "I cannot help with that."));
        let executor = StageExecutor::new(service, Duration::from_secs(5));

        let err = executor
            .execute::<DirectionList>(&architect(), ModelConfig::default(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn test_strict_binding_fails_before_any_call() {
        let service = Arc::new(ScriptedService::new().reply("architect", TWO_DIRECTIONS));
        let executor = StageExecutor::new(service.clone(), Duration::from_secs(5))
            .with_policy(BindingPolicy::Strict);

        let err = executor
            .execute::<DirectionList>(&architect(), ModelConfig::default(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::TemplateBinding { .. }));
        assert!(service.calls().is_empty());
    }
}
