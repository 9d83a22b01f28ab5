//! # PromptCrew Server
//!
//! HTTP front end and CLI for the prompt crew.
//!
//! - `promptcrew serve` exposes the `/api/v1` routes
//! - `promptcrew run "<task>"` runs one crew in-process and prints the result set

mod api;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use clap::{Parser, Subcommand};
use promptcrew_core::{
    Coordinator, CrewConfig, GenerationService, HttpGateway, TaskCategory, TaskRequest, Tone,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

use api::config::{self as config_api, PersistedConfig, CONFIG_PATH};
use api::runs::{self as runs_api, RunRegistry};

/// Application state
pub struct AppState {
    pub crew: Arc<CrewConfig>,
    pub service: Arc<dyn GenerationService>,
    /// Location of the persisted config file
    pub config_path: PathBuf,
    pub runs: RunRegistry,
}

impl AppState {
    pub fn new(
        crew: Arc<CrewConfig>,
        service: Arc<dyn GenerationService>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            crew,
            service,
            config_path,
            runs: RunRegistry::default(),
        }
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "PromptCrew - multi-agent prompt generation")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Directory with agents.yaml and tasks.yaml overriding the bundled crew
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
    /// Run the crew once and print the result set as JSON
    Run {
        /// What the prompt should accomplish, or an existing prompt to optimize
        description: String,
        /// Task category, e.g. "data extraction"
        #[arg(long)]
        category: Option<String>,
        /// Output tone, e.g. "friendly"
        #[arg(long)]
        tone: Option<String>,
        /// Background information
        #[arg(long)]
        context: Option<String>,
        /// Sample data for the task
        #[arg(long)]
        sample_data: Option<String>,
        /// Target model preference (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,
        /// Input/output example as "INPUT=>OUTPUT" (repeatable)
        #[arg(long = "example")]
        examples: Vec<String>,
        /// Number of engineers, overriding the persisted config
        #[arg(long)]
        engineers: Option<usize>,
        /// Directory with agents.yaml and tasks.yaml overriding the bundled crew
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PromptCrew API",
        version = "1.0.0",
        description = "Architect/engineer crew that turns a task description into ready-to-use prompts"
    ),
    paths(
        runs_api::generate,
        runs_api::start_run,
        runs_api::get_run,
        runs_api::cancel_run,
        runs_api::cancel_engineer,
        runs_api::run_events,
        config_api::get_config,
        config_api::update_config,
        config_api::get_providers,
    ),
    components(schemas(
        api::ApiResponse,
        api::ErrorBody,
        runs_api::GenerateRequest,
        runs_api::GenerateResponse,
        runs_api::RunCreated,
        runs_api::RunStatus,
        runs_api::RunView,
        config_api::PersistedConfig,
        config_api::ConfigResponse,
        config_api::ConfigDefaults,
        config_api::ProviderInfo,
        config_api::ProvidersResponse,
    )),
    tags(
        (name = "prompts", description = "Synchronous prompt generation"),
        (name = "runs", description = "Background runs, cancellation and event streams"),
        (name = "config", description = "Persisted coordinator configuration"),
        (name = "providers", description = "Supported LLM providers")
    )
)]
struct ApiDoc;

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1/prompts", runs_api::prompt_routes())
        .nest("/api/v1/runs", runs_api::run_routes())
        .merge(config_api::config_routes())
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}

fn load_crew(config_dir: Option<&PathBuf>) -> Result<Arc<CrewConfig>> {
    let crew = match config_dir {
        Some(dir) => CrewConfig::from_dir(dir)
            .with_context(|| format!("Failed to load crew from {}", dir.display()))?,
        None => CrewConfig::bundled()?,
    };
    Ok(Arc::new(crew))
}

async fn run_server(port: u16, config_dir: Option<PathBuf>) -> Result<()> {
    let crew = load_crew(config_dir.as_ref())?;
    let state = Arc::new(AppState::new(
        crew,
        Arc::new(HttpGateway::new()),
        PathBuf::from(CONFIG_PATH),
    ));
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!(%addr, "PromptCrew server listening");
    tracing::info!("Prompts:   /api/v1/prompts/generate");
    tracing::info!("Runs:      /api/v1/runs, /runs/:id, /runs/:id/events, /runs/:id/cancel");
    tracing::info!("Config:    /api/v1/config (GET, PATCH), /api/v1/providers");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

struct RunOptions {
    description: String,
    category: Option<String>,
    tone: Option<String>,
    context: Option<String>,
    sample_data: Option<String>,
    models: Vec<String>,
    examples: Vec<String>,
    engineers: Option<usize>,
    config_dir: Option<PathBuf>,
}

impl RunOptions {
    fn task_request(&self) -> Result<TaskRequest> {
        let mut request = TaskRequest::new(self.description.clone()).with_models(self.models.clone());
        if let Some(category) = &self.category {
            let parsed = TaskCategory::parse(category)
                .with_context(|| format!("Unknown category '{}'", category))?;
            request = request.with_category(parsed);
        }
        if let Some(tone) = &self.tone {
            let parsed = Tone::parse(tone).with_context(|| format!("Unknown tone '{}'", tone))?;
            request = request.with_tone(parsed);
        }
        if let Some(context) = &self.context {
            request = request.with_context(context.clone());
        }
        if let Some(data) = &self.sample_data {
            request = request.with_sample_data(data.clone());
        }
        for example in &self.examples {
            let (input, output) = example
                .split_once("=>")
                .with_context(|| format!("Example '{}' is not of the form INPUT=>OUTPUT", example))?;
            request = request.with_example(input.trim(), output.trim());
        }
        Ok(request)
    }
}

async fn run_cli(options: RunOptions) -> Result<()> {
    let request = options.task_request()?;
    let crew = load_crew(options.config_dir.as_ref())?;

    let mut persisted = PersistedConfig::load(&PathBuf::from(CONFIG_PATH)).await?;
    if options.engineers.is_some() {
        persisted.engineer_count = options.engineers;
    }
    let config = persisted.to_coordinator_config()?;

    let mut coordinator = Coordinator::new(config, crew, Arc::new(HttpGateway::new()));
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            cancel.cancel_all();
        }
    });

    let result = coordinator.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&result.results)?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Args::parse();
    match args.command {
        None => run_server(8080, None).await,
        Some(CliCommand::Serve { port, config_dir }) => run_server(port, config_dir).await,
        Some(CliCommand::Run {
            description,
            category,
            tone,
            context,
            sample_data,
            models,
            examples,
            engineers,
            config_dir,
        }) => {
            run_cli(RunOptions {
                description,
                category,
                tone,
                context,
                sample_data,
                models,
                examples,
                engineers,
                config_dir,
            })
            .await
        }
    }
}
