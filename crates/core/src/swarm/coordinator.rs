//! # Swarm Coordinator
//!
//! Orchestrates the crew from task request to result set.
//! Runs the architect once, checks it proposed enough directions, then fans
//! out one engineer per direction with configurable concurrency and
//! reassembles their outcomes by slot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{OrchestrationError, StageError, StageErrorKind};
use crate::llm::GenerationService;
use crate::models::{LlmProvider, ModelConfig};
use crate::skills::{
    ArchitectSkill, BindingPolicy, CrewConfig, DirectionList, EngineerAssignment, EngineerSkill,
    PromptArtifact, StageDefinition, StageExecutor,
};
use crate::task_request::TaskRequest;

use super::codenames::solution_codenames;
use super::events::{SwarmEvent, SwarmEventKind};
use super::pipeline::{Pipeline, PipelineStage};
use super::result_set::{ResultSet, ResultSlot, SlotOutcome};

const COORDINATOR: &str = "coordinator";

/// Upper bound on engineer stages per run
pub const MAX_ENGINEERS: usize = 16;

/// Configuration for the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of engineer stages (default: 3)
    pub engineer_count: usize,
    /// Maximum engineers running at once (default: 3)
    pub max_concurrent_engineers: usize,
    /// Architect timeout; expiry fails the run
    pub architect_timeout_secs: u64,
    /// Per-engineer timeout; expiry only fails that slot
    pub engineer_timeout_secs: u64,
    /// How unsupplied template placeholders are handled
    pub binding_policy: BindingPolicy,
    /// Give every engineer the full direction list as reference
    pub share_full_analysis: bool,
    /// Global LLM provider (default: Anthropic)
    pub global_provider: LlmProvider,
    /// Global model to use for all agents
    pub global_model: Option<String>,
    /// Base URL override for LLM API (for OpenAI-compatible endpoints)
    pub base_url: Option<String>,
    /// Per-agent model overrides (agent key -> model name)
    pub per_agent_models: HashMap<String, String>,
    /// Per-agent provider overrides (agent key -> provider)
    pub per_agent_providers: HashMap<String, LlmProvider>,
    /// Per-agent base URL overrides (agent key -> base_url, for OpenAI)
    pub per_agent_base_urls: HashMap<String, String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            engineer_count: 3,
            max_concurrent_engineers: 3,
            architect_timeout_secs: 120,
            engineer_timeout_secs: 120,
            binding_policy: BindingPolicy::Lenient,
            share_full_analysis: true,
            global_provider: LlmProvider::Anthropic,
            global_model: None,
            base_url: None,
            per_agent_models: HashMap::new(),
            per_agent_providers: HashMap::new(),
            per_agent_base_urls: HashMap::new(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        let problem = if self.engineer_count == 0 {
            Some("engineer_count must be at least 1")
        } else if self.engineer_count > MAX_ENGINEERS {
            Some("engineer_count exceeds MAX_ENGINEERS")
        } else if self.max_concurrent_engineers == 0 {
            Some("max_concurrent_engineers must be at least 1")
        } else if self.architect_timeout_secs == 0 || self.engineer_timeout_secs == 0 {
            Some("stage timeouts must be greater than zero")
        } else {
            None
        };
        match problem {
            Some(p) => Err(OrchestrationError::InvalidConfig(p.to_string())),
            None => Ok(()),
        }
    }

    /// Resolve the model for an agent: per-agent override, then global,
    /// then the provider's default.
    pub fn model_config_for(&self, agent_id: &str) -> ModelConfig {
        let provider = self
            .per_agent_providers
            .get(agent_id)
            .copied()
            .unwrap_or(self.global_provider);

        let model = self
            .per_agent_models
            .get(agent_id)
            .or(self.global_model.as_ref())
            .cloned()
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = if provider.supports_base_url() {
            self.per_agent_base_urls
                .get(agent_id)
                .or(self.base_url.as_ref())
                .cloned()
        } else {
            None
        };

        ModelConfig {
            provider,
            model,
            base_url,
        }
    }
}

/// Aborts a run, or single engineers within it, from outside the coordinator
#[derive(Debug, Clone)]
pub struct CancelHandle {
    root: CancellationToken,
    slots: Arc<Vec<CancellationToken>>,
}

impl CancelHandle {
    /// Cancel the whole run
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Cancel engineer `slot` (1-based). Returns `false` for an unknown slot.
    pub fn cancel_engineer(&self, slot: usize) -> bool {
        match slot.checked_sub(1).and_then(|i| self.slots.get(i)) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct SwarmResult {
    /// Directions the architect proposed (including any beyond the engineer count)
    pub directions: DirectionList,
    /// One slot per engineer, in slot order
    pub results: ResultSet,
    /// Events that occurred
    pub events: Vec<SwarmEvent>,
    /// Whether the run was cancelled during fan-out
    pub cancelled: bool,
}

/// The swarm coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    crew: Arc<CrewConfig>,
    service: Arc<dyn GenerationService>,
    pipeline: Pipeline,
    events: Vec<SwarmEvent>,
    event_tx: Option<mpsc::Sender<SwarmEvent>>,
    stage_tx: watch::Sender<PipelineStage>,
    cancel: CancelHandle,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        crew: Arc<CrewConfig>,
        service: Arc<dyn GenerationService>,
    ) -> Self {
        let root = CancellationToken::new();
        // Oversized counts are rejected by `run`; no tokens beyond the cap
        let slots = (0..config.engineer_count.min(MAX_ENGINEERS))
            .map(|_| root.child_token())
            .collect();
        let (stage_tx, _) = watch::channel(PipelineStage::Idle);
        Self {
            config,
            crew,
            service,
            pipeline: Pipeline::new(),
            events: Vec::new(),
            event_tx: None,
            stage_tx,
            cancel: CancelHandle {
                root,
                slots: Arc::new(slots),
            },
        }
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<SwarmEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Handle for cancelling this run from another task
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Receiver that observes every pipeline stage change
    pub fn stage_watch(&self) -> watch::Receiver<PipelineStage> {
        self.stage_tx.subscribe()
    }

    pub fn stage(&self) -> PipelineStage {
        self.pipeline.stage
    }

    pub fn events(&self) -> &[SwarmEvent] {
        &self.events
    }

    /// Emit an event
    async fn emit(&mut self, event: SwarmEvent) {
        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    fn advance(&mut self) {
        self.pipeline.advance();
        self.stage_tx.send_replace(self.pipeline.stage);
    }

    async fn fail(&mut self, error: OrchestrationError) -> OrchestrationError {
        if !self.pipeline.fail() {
            tracing::warn!(stage = ?self.pipeline.stage, "Run failed outside a working stage");
        }
        self.stage_tx.send_replace(self.pipeline.stage);
        tracing::warn!("Run failed: {}", error);
        self.emit(
            SwarmEvent::new(SwarmEventKind::PipelineFailed, COORDINATOR)
                .with_data(serde_json::json!({ "error": error.to_string() })),
        )
        .await;
        error
    }

    /// Run the crew on a task request
    #[tracing::instrument(skip(self, request), fields(task_preview = %request.description.chars().take(50).collect::<String>()))]
    pub async fn run(&mut self, request: TaskRequest) -> Result<SwarmResult, OrchestrationError> {
        if self.pipeline.stage != PipelineStage::Idle {
            return Err(OrchestrationError::InvalidConfig(
                "coordinator has already run".to_string(),
            ));
        }
        self.config.validate()?;
        let engineer_count = self.config.engineer_count;
        self.crew.validate(engineer_count)?;

        let architect_stage = self.crew.architect_stage()?;
        let engineer_stages = (1..=engineer_count)
            .map(|slot| self.crew.engineer_stage(slot))
            .collect::<Result<Vec<_>, _>>()?;

        self.emit(
            SwarmEvent::new(SwarmEventKind::PipelineStarted, COORDINATOR)
                .with_data(serde_json::json!({ "engineers": engineer_count })),
        )
        .await;

        // Stage 1: Architect
        self.advance();
        let directions = match self.run_architect(&architect_stage, &request).await {
            Ok(directions) => directions,
            Err(e) => return Err(self.fail(e).await),
        };

        if directions.len() < engineer_count {
            let error = OrchestrationError::InsufficientDirections {
                expected: engineer_count,
                actual: directions.len(),
            };
            return Err(self.fail(error).await);
        }
        if directions.len() > engineer_count {
            tracing::warn!(
                proposed = directions.len(),
                engineers = engineer_count,
                "Ignoring directions beyond the engineer count"
            );
        }

        self.emit(
            SwarmEvent::new(SwarmEventKind::DirectionsProposed, &architect_stage.name)
                .with_data(serde_json::to_value(&directions).unwrap_or_default()),
        )
        .await;

        // Stage 2: Engineers
        self.advance();
        let request = Arc::new(request);
        let shared_directions = Arc::new(directions);
        let outcomes = self
            .fan_out(engineer_stages.clone(), request.clone(), shared_directions.clone())
            .await;

        // Stage 3: Aggregate
        self.advance();
        let codenames = solution_codenames(&request.description, engineer_count);
        let slots = engineer_stages
            .into_iter()
            .zip(outcomes)
            .zip(codenames)
            .enumerate()
            .map(|(i, ((stage, outcome), codename))| ResultSlot {
                index: i + 1,
                engineer_id: stage.agent_key,
                codename,
                direction: shared_directions.directions[i].clone(),
                outcome: SlotOutcome::from(outcome),
            })
            .collect();
        let results = ResultSet { slots };

        // A cancel that lands after every engineer finished changes nothing
        let cancelled = self.cancel.is_cancelled()
            && results
                .error_kinds()
                .contains(&Some(StageErrorKind::Cancelled));
        if cancelled {
            self.emit(
                SwarmEvent::new(SwarmEventKind::RunCancelled, COORDINATOR)
                    .with_data(serde_json::json!({ "phase": "fan_out" })),
            )
            .await;
        }

        self.advance();
        self.emit(
            SwarmEvent::new(SwarmEventKind::PipelineCompleted, COORDINATOR).with_data(
                serde_json::json!({
                    "succeeded": results.succeeded(),
                    "failed": results.failed(),
                    "cancelled": cancelled,
                }),
            ),
        )
        .await;

        tracing::info!(
            succeeded = results.succeeded(),
            failed = results.failed(),
            "Run complete"
        );

        Ok(SwarmResult {
            directions: Arc::unwrap_or_clone(shared_directions),
            results,
            events: self.events.clone(),
            cancelled,
        })
    }

    async fn run_architect(
        &mut self,
        stage: &StageDefinition,
        request: &TaskRequest,
    ) -> Result<DirectionList, OrchestrationError> {
        self.emit(SwarmEvent::new(SwarmEventKind::AgentStarted, &stage.name))
            .await;

        let model = self.config.model_config_for(&stage.agent_key);
        let executor = StageExecutor::new(
            self.service.clone(),
            Duration::from_secs(self.config.architect_timeout_secs),
        )
        .with_policy(self.config.binding_policy);
        let cancel = self.cancel.root.clone();
        let engineer_count = self.config.engineer_count;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = ArchitectSkill::run(&executor, stage, request, engineer_count, &model) => Some(r),
        };

        match result {
            None => {
                self.emit(
                    SwarmEvent::new(SwarmEventKind::RunCancelled, &stage.name)
                        .with_data(serde_json::json!({ "phase": "architect" })),
                )
                .await;
                Err(OrchestrationError::Cancelled)
            }
            Some(Err(e)) => {
                self.emit(
                    SwarmEvent::new(SwarmEventKind::AgentFailed, &stage.name)
                        .with_data(serde_json::to_value(&e).unwrap_or_default()),
                )
                .await;
                Err(OrchestrationError::Stage(e))
            }
            Some(Ok(directions)) => {
                self.emit(
                    SwarmEvent::new(SwarmEventKind::AgentCompleted, &stage.name)
                        .with_data(serde_json::json!({ "directions": directions.len() })),
                )
                .await;
                Ok(directions)
            }
        }
    }

    /// Run every engineer and return their outcomes in slot order
    async fn fan_out(
        &mut self,
        stages: Vec<StageDefinition>,
        request: Arc<TaskRequest>,
        directions: Arc<DirectionList>,
    ) -> Vec<Result<PromptArtifact, StageError>> {
        let count = stages.len();
        self.emit(
            SwarmEvent::new(SwarmEventKind::FanOutStarted, COORDINATOR).with_data(
                serde_json::json!({
                    "engineers": count,
                    "max_concurrent": self.config.max_concurrent_engineers,
                }),
            ),
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_engineers.max(1)));
        let executor = StageExecutor::new(
            self.service.clone(),
            Duration::from_secs(self.config.engineer_timeout_secs),
        )
        .with_policy(self.config.binding_policy);
        let share_full_analysis = self.config.share_full_analysis;

        let mut set = JoinSet::new();
        for (i, stage) in stages.into_iter().enumerate() {
            let slot = i + 1;
            let token = self
                .cancel
                .slots
                .get(i)
                .cloned()
                .unwrap_or_else(|| self.cancel.root.child_token());
            let model = self.config.model_config_for(&stage.agent_key);

            self.emit(SwarmEvent::new(SwarmEventKind::AgentStarted, &stage.name).with_slot(slot))
                .await;

            let job = EngineerJob {
                index: i,
                stage,
                model,
                executor: executor.clone(),
                semaphore: semaphore.clone(),
                request: request.clone(),
                directions: directions.clone(),
                share_full_analysis,
            };

            set.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(StageError::cancelled(&job.stage.name)),
                    r = job.run() => r,
                };
                (i, job.stage.name, result)
            });
        }

        let mut outcomes: Vec<Option<Result<PromptArtifact, StageError>>> =
            (0..count).map(|_| None).collect();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, name, result)) => {
                    let slot = i + 1;
                    let event = match &result {
                        Ok(_) => SwarmEvent::new(SwarmEventKind::AgentCompleted, &name),
                        Err(e @ StageError::Cancelled { .. }) => {
                            SwarmEvent::new(SwarmEventKind::RunCancelled, &name)
                                .with_data(serde_json::to_value(e).unwrap_or_default())
                        }
                        Err(e) => SwarmEvent::new(SwarmEventKind::AgentFailed, &name)
                            .with_data(serde_json::to_value(e).unwrap_or_default()),
                    };
                    if let Err(e) = &result {
                        tracing::warn!(slot, "Engineer failed: {}", e);
                    }
                    self.emit(event.with_slot(slot)).await;
                    if let Some(entry) = outcomes.get_mut(i) {
                        *entry = Some(result);
                    }
                }
                Err(e) => tracing::warn!("Engineer task did not complete: {}", e),
            }
        }

        outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| {
                outcome.unwrap_or_else(|| {
                    Err(StageError::transport(
                        format!("engineer_{}", i + 1),
                        "engineer task terminated unexpectedly",
                    ))
                })
            })
            .collect()
    }
}

/// One engineer's share of the fan-out
struct EngineerJob {
    /// 0-based position; the slot is `index + 1`
    index: usize,
    stage: StageDefinition,
    model: ModelConfig,
    executor: StageExecutor,
    semaphore: Arc<Semaphore>,
    request: Arc<TaskRequest>,
    directions: Arc<DirectionList>,
    share_full_analysis: bool,
}

impl EngineerJob {
    async fn run(&self) -> Result<PromptArtifact, StageError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| StageError::cancelled(&self.stage.name))?;
        let direction = self.directions.get(self.index).ok_or_else(|| {
            StageError::transport(&self.stage.name, "no direction for this slot")
        })?;
        let assignment = EngineerAssignment {
            slot: self.index + 1,
            direction,
            all_directions: &self.directions,
            share_full_analysis: self.share_full_analysis,
        };
        EngineerSkill::run(
            &self.executor,
            &self.stage,
            &self.request,
            assignment,
            &self.model,
        )
        .await
    }
}
