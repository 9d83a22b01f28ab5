//! # Config API
//!
//! Persisted coordinator settings and the provider list.

use anyhow::{bail, Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use promptcrew_core::{BindingPolicy, CoordinatorConfig, LlmProvider};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;

use super::{ApiError, ErrorBody};
use crate::SharedState;

/// Default location of the persisted config, relative to the working directory
pub const CONFIG_PATH: &str = ".promptcrew/config.json";

/// Persisted configuration: every field optional, unset means "use the default"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, ToSchema)]
pub struct PersistedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_engineers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architect_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineer_timeout_secs: Option<u64>,
    /// "lenient" or "strict"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_full_analysis: Option<bool>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_base_urls: HashMap<String, String>,
}

impl PersistedConfig {
    /// Load from `path`; a missing file is an empty config
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Overlay every field set in `other`; map entries are merged key by key
    pub fn merge(&mut self, other: PersistedConfig) {
        if other.global_provider.is_some() {
            self.global_provider = other.global_provider;
        }
        if other.global_model.is_some() {
            self.global_model = other.global_model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.engineer_count.is_some() {
            self.engineer_count = other.engineer_count;
        }
        if other.max_concurrent_engineers.is_some() {
            self.max_concurrent_engineers = other.max_concurrent_engineers;
        }
        if other.architect_timeout_secs.is_some() {
            self.architect_timeout_secs = other.architect_timeout_secs;
        }
        if other.engineer_timeout_secs.is_some() {
            self.engineer_timeout_secs = other.engineer_timeout_secs;
        }
        if other.binding_policy.is_some() {
            self.binding_policy = other.binding_policy;
        }
        if other.share_full_analysis.is_some() {
            self.share_full_analysis = other.share_full_analysis;
        }
        self.per_agent_providers.extend(other.per_agent_providers);
        self.per_agent_models.extend(other.per_agent_models);
        self.per_agent_base_urls.extend(other.per_agent_base_urls);
    }

    /// Build the coordinator config this file describes
    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig> {
        let mut config = CoordinatorConfig::default();

        if let Some(id) = &self.global_provider {
            config.global_provider = parse_provider(id)?;
        }
        config.global_model = self.global_model.clone().or(config.global_model);
        config.base_url = self.base_url.clone().or(config.base_url);
        if let Some(n) = self.engineer_count {
            config.engineer_count = n;
        }
        if let Some(n) = self.max_concurrent_engineers {
            config.max_concurrent_engineers = n;
        }
        if let Some(secs) = self.architect_timeout_secs {
            config.architect_timeout_secs = secs;
        }
        if let Some(secs) = self.engineer_timeout_secs {
            config.engineer_timeout_secs = secs;
        }
        if let Some(policy) = &self.binding_policy {
            config.binding_policy = parse_binding_policy(policy)?;
        }
        if let Some(share) = self.share_full_analysis {
            config.share_full_analysis = share;
        }
        for (agent, id) in &self.per_agent_providers {
            config
                .per_agent_providers
                .insert(agent.clone(), parse_provider(id)?);
        }
        config.per_agent_models = self.per_agent_models.clone();
        config.per_agent_base_urls = self.per_agent_base_urls.clone();

        config.validate()?;
        Ok(config)
    }
}

fn parse_provider(id: &str) -> Result<LlmProvider> {
    match LlmProvider::from_id(id) {
        Some(provider) => Ok(provider),
        None => bail!("Unknown provider '{}'", id),
    }
}

fn parse_binding_policy(value: &str) -> Result<BindingPolicy> {
    match value.trim().to_lowercase().as_str() {
        "lenient" => Ok(BindingPolicy::Lenient),
        "strict" => Ok(BindingPolicy::Strict),
        other => bail!("Unknown binding policy '{}' (expected lenient or strict)", other),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    pub config: PersistedConfig,
    pub defaults: ConfigDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigDefaults {
    pub global_provider: String,
    pub engineer_count: usize,
    pub max_concurrent_engineers: usize,
    pub architect_timeout_secs: u64,
    pub engineer_timeout_secs: u64,
    pub binding_policy: String,
    pub share_full_analysis: bool,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        let config = CoordinatorConfig::default();
        Self {
            global_provider: config.global_provider.id().to_string(),
            engineer_count: config.engineer_count,
            max_concurrent_engineers: config.max_concurrent_engineers,
            architect_timeout_secs: config.architect_timeout_secs,
            engineer_timeout_secs: config.engineer_timeout_secs,
            binding_policy: match config.binding_policy {
                BindingPolicy::Lenient => "lenient",
                BindingPolicy::Strict => "strict",
            }
            .to_string(),
            share_full_analysis: config.share_full_analysis,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub default_model: String,
    pub supports_base_url: bool,
    pub env_var: String,
    /// Whether the API key variable is set in this process
    pub configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderInfo>,
}

fn provider_info() -> Vec<ProviderInfo> {
    LlmProvider::all()
        .into_iter()
        .map(|p| ProviderInfo {
            id: p.id().to_string(),
            name: p.display_name().to_string(),
            default_model: p.default_model().to_string(),
            supports_base_url: p.supports_base_url(),
            env_var: p.env_var().to_string(),
            configured: std::env::var(p.env_var())
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false),
        })
        .collect()
}

pub fn config_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/config", get(get_config).patch(update_config))
        .route("/api/v1/providers", get(get_providers))
}

/// Current persisted config
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Persisted config and defaults", body = ConfigResponse),
        (status = 500, description = "Config file unreadable", body = ErrorBody)
    )
)]
pub async fn get_config(
    State(state): State<SharedState>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config = PersistedConfig::load(&state.config_path)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}

/// Merge a partial config into the persisted one
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Config updated", body = ConfigResponse),
        (status = 400, description = "Merged config is invalid", body = ErrorBody)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(patch): Json<PersistedConfig>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut config = PersistedConfig::load(&state.config_path)
        .await
        .map_err(ApiError::internal)?;
    config.merge(patch);
    config
        .to_coordinator_config()
        .map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    config
        .save(&state.config_path)
        .await
        .map_err(ApiError::internal)?;

    tracing::info!(path = %state.config_path.display(), "Config updated");
    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}

/// Supported LLM providers
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    tag = "providers",
    responses(
        (status = 200, description = "List of supported LLM providers", body = ProvidersResponse)
    )
)]
pub async fn get_providers() -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: provider_info(),
    })
}
