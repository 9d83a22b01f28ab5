//! # Runs API
//!
//! Synchronous prompt generation, plus background runs that can be polled,
//! cancelled and followed over SSE.
//!
//! Every background run keeps its full event log. An SSE subscriber first
//! replays that log, then follows live events until the run finishes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use promptcrew_core::{
    CancelHandle, Coordinator, CoordinatorConfig, DirectionList, OrchestrationError,
    PipelineStage, ResultSet, SwarmEvent, SwarmResult, TaskRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::sync::broadcast::error::RecvError;
use utoipa::ToSchema;
use uuid::Uuid;

use super::config::PersistedConfig;
use super::{error_body, ApiError, ApiResponse, ErrorBody};
use crate::SharedState;

const HEARTBEAT: Duration = Duration::from_secs(15);

/// Body of a generate or start-run request
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Task request: description, category, model_preference, tone, context,
    /// sample_data, examples
    #[schema(value_type = Object)]
    pub task: TaskRequest,
    /// Per-request overrides on top of the persisted config
    #[serde(default)]
    pub settings: Option<PersistedConfig>,
}

/// Directions and per-engineer prompts of a finished run
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerateResponse {
    #[schema(value_type = Object)]
    pub directions: DirectionList,
    #[schema(value_type = Object)]
    pub results: ResultSet,
    pub cancelled: bool,
}

impl From<SwarmResult> for GenerateResponse {
    fn from(result: SwarmResult) -> Self {
        Self {
            directions: result.directions,
            results: result.results,
            cancelled: result.cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunCreated {
    pub run_id: String,
}

/// Snapshot of a background run
#[derive(Debug, Serialize, ToSchema)]
pub struct RunView {
    pub id: String,
    pub status: RunStatus,
    /// Pipeline stage: idle, running_architect, fanning_out_engineers,
    /// aggregating, done or failed
    #[schema(value_type = String)]
    pub stage: PipelineStage,
    pub cancel_requested: bool,
    pub event_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerateResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Default)]
struct RunRecord {
    status: RunStatus,
    events: Vec<SwarmEvent>,
    /// Live fan-out; dropped when the run finishes so subscribers see the end
    live: Option<broadcast::Sender<SwarmEvent>>,
    result: Option<GenerateResponse>,
    error: Option<ErrorBody>,
}

/// One background run
pub struct RunEntry {
    id: Uuid,
    cancel: CancelHandle,
    stage: watch::Receiver<PipelineStage>,
    record: RwLock<RunRecord>,
}

impl RunEntry {
    fn new(id: Uuid, cancel: CancelHandle, stage: watch::Receiver<PipelineStage>) -> Self {
        let (live, _) = broadcast::channel(256);
        Self {
            id,
            cancel,
            stage,
            record: RwLock::new(RunRecord {
                live: Some(live),
                ..RunRecord::default()
            }),
        }
    }

    async fn record_event(&self, event: SwarmEvent) {
        let mut record = self.record.write().await;
        if let Some(live) = &record.live {
            let _ = live.send(event.clone());
        }
        record.events.push(event);
    }

    async fn finish(&self, outcome: Result<SwarmResult, OrchestrationError>) {
        let mut record = self.record.write().await;
        match outcome {
            Ok(result) => {
                tracing::info!(
                    run_id = %self.id,
                    succeeded = result.results.succeeded(),
                    failed = result.results.failed(),
                    cancelled = result.cancelled,
                    "Run completed"
                );
                record.status = RunStatus::Completed;
                record.result = Some(result.into());
            }
            Err(e) => {
                tracing::warn!(run_id = %self.id, "Run failed: {}", e);
                record.status = RunStatus::Failed;
                record.error = Some(error_body(&e));
            }
        }
        record.live = None;
    }

    /// Logged events so far, plus a receiver for the rest (if still running)
    async fn subscribe(&self) -> (Vec<SwarmEvent>, Option<broadcast::Receiver<SwarmEvent>>) {
        let record = self.record.read().await;
        (
            record.events.clone(),
            record.live.as_ref().map(broadcast::Sender::subscribe),
        )
    }

    async fn view(&self) -> RunView {
        let record = self.record.read().await;
        RunView {
            id: self.id.to_string(),
            status: record.status,
            stage: *self.stage.borrow(),
            cancel_requested: self.cancel.is_cancelled(),
            event_count: record.events.len(),
            result: record.result.clone(),
            error: record.error.clone(),
        }
    }
}

/// Finished runs kept for polling; the oldest are dropped past this
pub const MAX_FINISHED_RUNS: usize = 64;

#[derive(Default)]
struct Runs {
    entries: HashMap<Uuid, Arc<RunEntry>>,
    /// Finished run ids, oldest first
    finished: VecDeque<Uuid>,
}

/// Background runs started by this process.
///
/// Running runs are always kept. At most `max_finished` finished runs stay
/// queryable.
pub struct RunRegistry {
    max_finished: usize,
    runs: RwLock<Runs>,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_max_finished(MAX_FINISHED_RUNS)
    }
}

impl RunRegistry {
    pub fn with_max_finished(max_finished: usize) -> Self {
        Self {
            max_finished,
            runs: RwLock::new(Runs::default()),
        }
    }

    async fn insert(&self, entry: Arc<RunEntry>) {
        self.runs.write().await.entries.insert(entry.id, entry);
    }

    async fn get(&self, id: &Uuid) -> Result<Arc<RunEntry>, ApiError> {
        self.runs
            .read()
            .await
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(format!("Run {} not found", id)))
    }

    /// Record that a run finished, evicting the oldest finished runs over the cap
    async fn mark_finished(&self, id: Uuid) {
        let mut runs = self.runs.write().await;
        runs.finished.push_back(id);
        while runs.finished.len() > self.max_finished {
            if let Some(oldest) = runs.finished.pop_front() {
                runs.entries.remove(&oldest);
                tracing::debug!(run_id = %oldest, "Evicted finished run");
            }
        }
    }
}

pub fn prompt_routes() -> Router<SharedState> {
    Router::new().route("/generate", post(generate))
}

pub fn run_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(start_run))
        .route("/:id", get(get_run))
        .route("/:id/cancel", post(cancel_run))
        .route("/:id/engineers/:slot/cancel", post(cancel_engineer))
        .route("/:id/events", get(run_events))
}

/// Persisted config with the request's overrides on top
async fn effective_config(
    state: &SharedState,
    overrides: Option<PersistedConfig>,
) -> Result<CoordinatorConfig, ApiError> {
    let mut persisted = PersistedConfig::load(&state.config_path)
        .await
        .map_err(ApiError::internal)?;
    if let Some(overrides) = overrides {
        persisted.merge(overrides);
    }
    let config = persisted
        .to_coordinator_config()
        .map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    state.crew.validate(config.engineer_count)?;
    Ok(config)
}

/// Run the crew and wait for the result
#[utoipa::path(
    post,
    path = "/api/v1/prompts/generate",
    tag = "prompts",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "One prompt per engineer slot", body = GenerateResponse),
        (status = 400, description = "Invalid configuration", body = ErrorBody),
        (status = 422, description = "Strict binding found an unsupplied placeholder", body = ErrorBody),
        (status = 502, description = "Architect output unusable or provider error", body = ErrorBody),
        (status = 504, description = "Architect timed out", body = ErrorBody)
    )
)]
pub async fn generate(
    State(state): State<SharedState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let config = effective_config(&state, req.settings).await?;
    let mut coordinator = Coordinator::new(config, state.crew.clone(), state.service.clone());
    let result = coordinator.run(req.task).await?;
    Ok(Json(result.into()))
}

/// Start a run in the background
#[utoipa::path(
    post,
    path = "/api/v1/runs",
    tag = "runs",
    request_body = GenerateRequest,
    responses(
        (status = 202, description = "Run started", body = RunCreated),
        (status = 400, description = "Invalid configuration", body = ErrorBody)
    )
)]
pub async fn start_run(
    State(state): State<SharedState>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<RunCreated>), ApiError> {
    let config = effective_config(&state, req.settings).await?;

    let (event_tx, mut event_rx) = mpsc::channel::<SwarmEvent>(100);
    let mut coordinator = Coordinator::new(config, state.crew.clone(), state.service.clone())
        .with_event_channel(event_tx);

    let id = Uuid::new_v4();
    let entry = Arc::new(RunEntry::new(
        id,
        coordinator.cancel_handle(),
        coordinator.stage_watch(),
    ));
    state.runs.insert(entry.clone()).await;

    // Bridge coordinator events into the run's log and live channel
    let bridge_entry = entry.clone();
    let bridge = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            bridge_entry.record_event(event).await;
        }
    });

    let task = req.task;
    tokio::spawn(async move {
        let outcome = coordinator.run(task).await;
        // Closes the event channel so the bridge drains and exits
        drop(coordinator);
        let _ = bridge.await;
        entry.finish(outcome).await;
        state.runs.mark_finished(id).await;
    });

    tracing::info!(run_id = %id, "Run started");
    Ok((
        StatusCode::ACCEPTED,
        Json(RunCreated {
            run_id: id.to_string(),
        }),
    ))
}

/// Status of a background run
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}",
    tag = "runs",
    params(("id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run status", body = RunView),
        (status = 404, description = "Unknown run", body = ErrorBody)
    )
)]
pub async fn get_run(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunView>, ApiError> {
    let entry = state.runs.get(&id).await?;
    Ok(Json(entry.view().await))
}

/// Abort a background run
#[utoipa::path(
    post,
    path = "/api/v1/runs/{id}/cancel",
    tag = "runs",
    params(("id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Cancellation requested", body = ApiResponse),
        (status = 404, description = "Unknown run", body = ErrorBody),
        (status = 409, description = "Run already finished", body = ErrorBody)
    )
)]
pub async fn cancel_run(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse>, ApiError> {
    let entry = state.runs.get(&id).await?;
    ensure_running(&entry).await?;
    entry.cancel.cancel_all();
    tracing::info!(run_id = %id, "Run cancellation requested");
    Ok(ApiResponse::ok(format!("Cancellation requested for run {}", id)))
}

/// Cancel one engineer of a background run
#[utoipa::path(
    post,
    path = "/api/v1/runs/{id}/engineers/{slot}/cancel",
    tag = "runs",
    params(
        ("id" = String, Path, description = "Run ID"),
        ("slot" = usize, Path, description = "1-based engineer slot")
    ),
    responses(
        (status = 200, description = "Cancellation requested", body = ApiResponse),
        (status = 404, description = "Unknown run or slot", body = ErrorBody),
        (status = 409, description = "Run already finished", body = ErrorBody)
    )
)]
pub async fn cancel_engineer(
    State(state): State<SharedState>,
    Path((id, slot)): Path<(Uuid, usize)>,
) -> Result<Json<ApiResponse>, ApiError> {
    let entry = state.runs.get(&id).await?;
    ensure_running(&entry).await?;
    if !entry.cancel.cancel_engineer(slot) {
        return Err(ApiError::not_found(format!(
            "Run {} has no engineer slot {}",
            id, slot
        )));
    }
    tracing::info!(run_id = %id, slot, "Engineer cancellation requested");
    Ok(ApiResponse::ok(format!(
        "Cancellation requested for engineer {} of run {}",
        slot, id
    )))
}

async fn ensure_running(entry: &RunEntry) -> Result<(), ApiError> {
    match entry.record.read().await.status {
        RunStatus::Running => Ok(()),
        _ => Err(ApiError::conflict(format!(
            "Run {} has already finished",
            entry.id
        ))),
    }
}

/// SSE stream of a run's events
#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}/events",
    tag = "runs",
    params(("id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "text/event-stream of SwarmEvents"),
        (status = 404, description = "Unknown run", body = ErrorBody)
    )
)]
pub async fn run_events(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let entry = state.runs.get(&id).await?;
    let (backlog, live) = entry.subscribe().await;
    let cursor = EventCursor {
        backlog: backlog.into(),
        live,
    };

    let stream = stream::unfold(cursor, |mut cursor| async move {
        if let Some(event) = cursor.backlog.pop_front() {
            return Some((Ok(sse_event(&event)), cursor));
        }
        let rx = cursor.live.as_mut()?;
        loop {
            match tokio::time::timeout(HEARTBEAT, rx.recv()).await {
                Ok(Ok(event)) => return Some((Ok(sse_event(&event)), cursor)),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!(skipped, "SSE subscriber lagged behind");
                }
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => return Some((Ok(Event::default().comment("heartbeat")), cursor)),
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

struct EventCursor {
    backlog: VecDeque<SwarmEvent>,
    live: Option<broadcast::Receiver<SwarmEvent>>,
}

fn sse_event(event: &SwarmEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().event("swarm_event").data(json)
}
