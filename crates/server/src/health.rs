use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use deskpilot_core::config::AppConfig;
use serde::Serialize;

/// Configured upstream endpoints; health never probes them over the network.
#[derive(Clone, Debug)]
pub struct HealthState {
    incident_url: String,
    kb_url: String,
    llm_base_url: String,
    llm_model: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            incident_url: config.ticketing.incident_url.clone(),
            kb_url: config.ticketing.kb_endpoint(),
            llm_base_url: config.llm.base_url.clone(),
            llm_model: config.llm.model.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub ticketing: HealthCheck,
    pub llm: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "deskpilot-server runtime initialized".to_string(),
        },
        ticketing: HealthCheck {
            status: "configured",
            detail: format!("incidents: {}; kb: {}", state.incident_url, state.kb_url),
        },
        llm: HealthCheck {
            status: "configured",
            detail: format!("model {} at {}", state.llm_model, state.llm_base_url),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
