//! # PromptCrew Core
//!
//! The "Brain" of PromptCrew - turns a task request into several
//! ready-to-use prompts with a two-phase crew: one architect proposes
//! directions, then engineers expand each direction in parallel.
//!
//! ## Architecture
//!
//! - `task_request` - Normalized input for one run
//! - `models` - Centralized LLM provider configuration and model catalog
//! - `llm/` - `GenerationService` trait and the HTTP gateway
//! - `skills/` - Templates, stage execution, architect and engineer skills
//! - `swarm/` - Orchestration pipeline, events and result sets
//! - `error` - Stage and orchestration errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use promptcrew_core::{Coordinator, CoordinatorConfig, CrewConfig, HttpGateway, TaskRequest};
//! use std::sync::Arc;
//!
//! let crew = Arc::new(CrewConfig::bundled()?);
//! let mut coordinator =
//!     Coordinator::new(CoordinatorConfig::default(), crew, Arc::new(HttpGateway::new()));
//! let result = coordinator.run(TaskRequest::new("Extract order dates")).await?;
//! ```

pub mod error;
pub mod llm;
pub mod models;
pub mod skills;
pub mod swarm;
pub mod task_request;

pub use error::{OrchestrationError, StageError, StageErrorKind};
pub use llm::{GenerationRequest, GenerationService, HttpGateway};
pub use models::{LlmProvider, ModelConfig};
pub use skills::{BindingPolicy, CrewConfig, Direction, DirectionList, PromptArtifact};
pub use swarm::{
    CancelHandle, Coordinator, CoordinatorConfig, PipelineStage, ResultSet, SwarmEvent,
    SwarmResult, MAX_ENGINEERS,
};
pub use task_request::{ExamplePair, TaskCategory, TaskRequest, Tone};
