//! # PromptCrew Skills
//!
//! Stage-level building blocks for the crew.
//!
//! ## Architecture
//!
//! ```text
//! CrewConfig (agents.yaml + tasks.yaml)
//!   └── StageDefinition (role + TaskTemplate + expected output)
//!         └── StageExecutor (bind → GenerationService → parse_output)
//! ```
//!
//! ## Skills
//!
//! - `ArchitectSkill` - TaskRequest → DirectionList
//! - `EngineerSkill` - TaskRequest + one Direction → PromptArtifact

pub mod prompts;
pub mod schema;
pub mod template;

// Artifact Registry (structured stage outputs)
pub mod artifact_registry;

// Crew wiring
pub mod crew_config;
pub mod stage;

// Skills
pub mod architect_skill;
pub mod engineer_skill;

// Re-exports for convenience
pub use architect_skill::ArchitectSkill;
pub use artifact_registry::{Direction, DirectionList, MethodChoice, PromptArtifact};
pub use crew_config::{AgentDefinition, CrewConfig, TaskDefinition};
pub use engineer_skill::{EngineerAssignment, EngineerSkill};
pub use schema::StageOutput;
pub use stage::{StageDefinition, StageExecutor};
pub use template::{BindingPolicy, TaskTemplate};
