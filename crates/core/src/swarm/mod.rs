//! # Swarm Orchestration
//!
//! Coordinates the crew for PromptCrew.
//!
//! ## Pipeline Flow
//!
//! ```text
//! TaskRequest → Architect → DirectionList ─┬─▶ Engineer 1 ─┐
//!                                          ├─▶ Engineer 2 ─┼─▶ ResultSet
//!                                          └─▶ Engineer N ─┘
//! ```

pub mod codenames;
pub mod coordinator;
pub mod events;
pub mod pipeline;
pub mod result_set;

pub use codenames::solution_codenames;
pub use coordinator::{CancelHandle, Coordinator, CoordinatorConfig, SwarmResult, MAX_ENGINEERS};
pub use events::{SwarmEvent, SwarmEventKind};
pub use pipeline::{Pipeline, PipelineStage};
pub use result_set::{ResultSet, ResultSlot, SlotOutcome};
