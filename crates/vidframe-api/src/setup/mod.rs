//! Process setup shared by the gateway and the queue consumers

pub mod database;
pub mod queue;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use vidframe_core::{Config, ServiceRole};

/// Load the environment, install tracing and validate what `role` needs.
/// Fails fast on misconfiguration.
pub fn load_config(role: ServiceRole) -> Result<Config> {
    let config = Config::from_env()?;

    vidframe_infra::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    config
        .validate_for(role)
        .context("Configuration validation failed")?;

    tracing::info!(
        role = ?role,
        environment = %config.environment(),
        storage_backend = %config.storage_backend(),
        queue_backend = %config.queue_backend(),
        "Configuration loaded and validated successfully"
    );

    Ok(config)
}

/// Build the gateway: database, storage, queue, services and routes
pub async fn initialize_gateway(config: &Config) -> Result<(Arc<AppState>, axum::Router)> {
    let pool = database::setup_database(config).await?;
    let storage = storage::setup_storage(config).await?;
    let queue = queue::setup_queue(config, &pool, false).await?;

    let state = services::gateway_state(config, pool, storage, queue)?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
