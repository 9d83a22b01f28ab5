//! # Result Set
//!
//! Ordered per-engineer outcomes of a run. Slot `i` always holds engineer
//! `i`'s outcome, whatever order the engineers finished in.

use serde::{Deserialize, Serialize};

use crate::error::{StageError, StageErrorKind};
use crate::skills::artifact_registry::{Direction, PromptArtifact};

/// Outcome of one engineer stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotOutcome {
    Ok { artifact: PromptArtifact },
    Failed { error: StageError },
}

impl SlotOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SlotOutcome::Ok { .. })
    }

    pub fn artifact(&self) -> Option<&PromptArtifact> {
        match self {
            SlotOutcome::Ok { artifact } => Some(artifact),
            SlotOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&StageError> {
        match self {
            SlotOutcome::Ok { .. } => None,
            SlotOutcome::Failed { error } => Some(error),
        }
    }
}

impl From<Result<PromptArtifact, StageError>> for SlotOutcome {
    fn from(result: Result<PromptArtifact, StageError>) -> Self {
        match result {
            Ok(artifact) => SlotOutcome::Ok { artifact },
            Err(error) => SlotOutcome::Failed { error },
        }
    }
}

/// One engineer's slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSlot {
    /// 1-based engineer slot
    pub index: usize,
    /// Agent key that ran this slot
    pub engineer_id: String,
    /// Themed display label
    pub codename: String,
    /// Direction this engineer was bound to
    pub direction: Direction,
    pub outcome: SlotOutcome,
}

/// All engineer slots in stage-definition order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub slots: Vec<ResultSlot>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot by 1-based index
    pub fn slot(&self, index: usize) -> Option<&ResultSlot> {
        index.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    pub fn succeeded(&self) -> usize {
        self.slots.iter().filter(|s| s.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Error kind per slot (`None` for successful slots)
    pub fn error_kinds(&self) -> Vec<Option<StageErrorKind>> {
        self.slots
            .iter()
            .map(|s| s.outcome.error().map(StageError::kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::artifact_registry::MethodChoice;

    fn artifact() -> PromptArtifact {
        PromptArtifact {
            role: "r".to_string(),
            task: "t".to_string(),
            rules_constraints: "c".to_string(),
            reasoning_method: MethodChoice::new("a", "b"),
            planning_method: MethodChoice::new("a", "b"),
            output_format: MethodChoice::new("a", "b"),
            explanation: "e".to_string(),
            usage_guidelines: "u".to_string(),
        }
    }

    fn slot(index: usize, outcome: SlotOutcome) -> ResultSlot {
        ResultSlot {
            index,
            engineer_id: format!("prompt_engineer_{}", index),
            codename: format!("C{}", index),
            direction: Direction::new("d", "f", "r"),
            outcome,
        }
    }

    #[test]
    fn test_counts_and_lookup() {
        let set = ResultSet {
            slots: vec![
                slot(1, Ok(artifact()).into()),
                slot(2, Err(StageError::schema_violation("engineer_2", "x")).into()),
                slot(3, Ok(artifact()).into()),
            ],
        };
        assert_eq!(set.succeeded(), 2);
        assert_eq!(set.failed(), 1);
        assert_eq!(set.slot(2).unwrap().index, 2);
        assert!(set.slot(0).is_none());
        assert_eq!(
            set.error_kinds(),
            vec![None, Some(StageErrorKind::SchemaViolation), None]
        );
    }

    #[test]
    fn test_slot_outcome_serialization() {
        let failed: SlotOutcome = Err(StageError::cancelled("engineer_1")).into();
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "cancelled");

        let ok: SlotOutcome = Ok(artifact()).into();
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["artifact"]["role"], "r");
    }
}
