//! # Engineer Skill
//!
//! Expands one direction into a complete [`PromptArtifact`].
//!
//! Engineer `slot` (1-based) is bound to the direction at index `slot - 1`.
//! The full direction list is also offered as read-only reference unless the
//! coordinator disables it.

use std::collections::BTreeMap;

use super::artifact_registry::{Direction, DirectionList, PromptArtifact};
use super::stage::{StageDefinition, StageExecutor};
use crate::error::StageError;
use crate::models::ModelConfig;
use crate::task_request::TaskRequest;

/// Bound into `{directions_overview}` when the full list is withheld
pub const OVERVIEW_WITHHELD: &str = "[Other directions are not shared with this engineer]";

/// Inputs for one engineer stage
#[derive(Debug, Clone, Copy)]
pub struct EngineerAssignment<'a> {
    /// 1-based engineer slot
    pub slot: usize,
    pub direction: &'a Direction,
    pub all_directions: &'a DirectionList,
    pub share_full_analysis: bool,
}

pub struct EngineerSkill;

impl EngineerSkill {
    /// Template bindings for one engineer stage
    pub fn bindings(
        request: &TaskRequest,
        assignment: &EngineerAssignment<'_>,
    ) -> BTreeMap<String, String> {
        let mut bindings = request.bindings();
        bindings.insert(
            "direction".to_string(),
            serde_json::to_string_pretty(assignment.direction).unwrap_or_default(),
        );
        bindings.insert("direction_index".to_string(), assignment.slot.to_string());
        bindings.insert(
            "direction_name".to_string(),
            assignment.direction.name.clone(),
        );
        bindings.insert(
            "directions_overview".to_string(),
            if assignment.share_full_analysis {
                assignment.all_directions.overview()
            } else {
                OVERVIEW_WITHHELD.to_string()
            },
        );
        bindings.insert(
            "engineer_id".to_string(),
            format!("prompt_engineer_{}", assignment.slot),
        );
        bindings
    }

    /// SDK-style call for direct Coordinator integration.
    pub async fn run(
        executor: &StageExecutor,
        stage: &StageDefinition,
        request: &TaskRequest,
        assignment: EngineerAssignment<'_>,
        config: &ModelConfig,
    ) -> Result<PromptArtifact, StageError> {
        let bindings = Self::bindings(request, &assignment);
        let artifact: PromptArtifact = executor.execute(stage, config.clone(), &bindings).await?;

        tracing::info!(
            stage = %stage.name,
            direction = %assignment.direction.name,
            "Engineer produced prompt artifact"
        );
        Ok(artifact)
    }
}
