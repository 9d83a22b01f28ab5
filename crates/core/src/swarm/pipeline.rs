//! # Pipeline Stages
//!
//! Defines the stages of the orchestration run.
//!
//! ```text
//! Idle → RunningArchitect → FanningOutEngineers → Aggregating → Done
//!              │                    │
//!              └────────┬───────────┘
//!                       ▼
//!                    Failed
//! ```

use serde::{Deserialize, Serialize};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Run created, nothing started
    #[default]
    Idle,
    /// Architect proposing directions
    RunningArchitect,
    /// Engineers expanding directions in parallel
    FanningOutEngineers,
    /// Building the result set
    Aggregating,
    /// Result set available
    Done,
    /// Run aborted without a result set
    Failed,
}

/// The pipeline state machine
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Current stage
    pub stage: PipelineStage,
}

impl Pipeline {
    /// Create a new pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next stage
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Idle => PipelineStage::RunningArchitect,
            PipelineStage::RunningArchitect => PipelineStage::FanningOutEngineers,
            PipelineStage::FanningOutEngineers => PipelineStage::Aggregating,
            PipelineStage::Aggregating => PipelineStage::Done,
            PipelineStage::Done => PipelineStage::Done,
            PipelineStage::Failed => PipelineStage::Failed,
        };
    }

    /// Fail the pipeline.
    ///
    /// Only the two working stages can fail; returns `false` and leaves the
    /// stage untouched otherwise.
    pub fn fail(&mut self) -> bool {
        match self.stage {
            PipelineStage::RunningArchitect | PipelineStage::FanningOutEngineers => {
                self.stage = PipelineStage::Failed;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut pipeline = Pipeline::new();
        assert_eq!(pipeline.stage, PipelineStage::Idle);

        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::RunningArchitect);

        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::FanningOutEngineers);

        pipeline.advance();
        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::Done);

        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::Done);
    }

    #[test]
    fn test_fail_only_from_working_stages() {
        let mut pipeline = Pipeline::new();
        assert!(!pipeline.fail());
        assert_eq!(pipeline.stage, PipelineStage::Idle);

        pipeline.advance();
        assert!(pipeline.fail());
        assert_eq!(pipeline.stage, PipelineStage::Failed);

        let mut pipeline = Pipeline {
            stage: PipelineStage::Aggregating,
        };
        assert!(!pipeline.fail());
        assert_eq!(pipeline.stage, PipelineStage::Aggregating);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut pipeline = Pipeline {
            stage: PipelineStage::FanningOutEngineers,
        };
        pipeline.fail();
        pipeline.advance();
        assert_eq!(pipeline.stage, PipelineStage::Failed);
    }
}
