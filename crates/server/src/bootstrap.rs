use std::sync::Arc;

use deskpilot_agent::AgentRuntime;
use deskpilot_core::config::{AppConfig, ConfigError};
use deskpilot_core::errors::UpstreamError;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    Client(#[source] UpstreamError),
}

#[cfg(test)]
pub fn bootstrap(
    options: deskpilot_core::config::LoadOptions,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let agent_runtime = AgentRuntime::from_config(&config).map_err(BootstrapError::Client)?;
    info!(
        event_name = "system.bootstrap.clients_ready",
        correlation_id = "bootstrap",
        transition_mode = ?config.workflow.transition_mode,
        step_limit = config.workflow.step_limit,
        "ticketing and language model clients initialized"
    );

    Ok(Application { config, agent_runtime: Arc::new(agent_runtime) })
}
