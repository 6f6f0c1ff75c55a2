use std::time::Duration;

use async_trait::async_trait;
use deskpilot_core::config::TicketingConfig;
use deskpilot_core::domain::incident::IncidentNumber;
use deskpilot_core::domain::ticket::{KbArticle, TicketSummary, INCIDENT_FIELDS};
use deskpilot_core::errors::{UpstreamError, UpstreamService};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-sn-apikey";

/// Read-only access to the ticketing system's incident and KB tables.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// `Ok(None)` when no incident carries this number.
    async fn get_incident(
        &self,
        incident_number: &IncidentNumber,
    ) -> Result<Option<TicketSummary>, UpstreamError>;

    /// Articles whose short description contains any keyword, in backend order.
    async fn search_knowledge_base(
        &self,
        keywords: &[String],
        limit: u32,
    ) -> Result<Vec<KbArticle>, UpstreamError>;
}

#[derive(Debug, Default, Deserialize)]
struct TableResponse {
    #[serde(default)]
    result: Vec<Map<String, Value>>,
}

/// ServiceNow Table API client.
#[derive(Clone)]
pub struct ServiceNowClient {
    client: reqwest::Client,
    incident_url: String,
    kb_url: String,
    api_key: SecretString,
    timeout_secs: u64,
}

impl ServiceNowClient {
    pub fn from_config(config: &TicketingConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|error| UpstreamError::Transport {
                service: UpstreamService::Ticketing,
                message: error.to_string(),
            })?;

        Ok(Self {
            client,
            incident_url: config.incident_url.trim().to_string(),
            kb_url: config.kb_endpoint(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn incident_url(&self) -> &str {
        &self.incident_url
    }

    pub fn kb_url(&self) -> &str {
        &self.kb_url
    }

    async fn fetch_rows(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<Map<String, Value>>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .query(params)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "agent.ticketing.http_status",
                status = status.as_u16(),
                url = %url,
                "ticketing api returned a non-success status"
            );
            return Err(UpstreamError::Status {
                service: UpstreamService::Ticketing,
                status: status.as_u16(),
                body,
            });
        }

        let payload: TableResponse =
            response.json().await.map_err(|error| self.map_decode_error(error))?;
        Ok(payload.result)
    }

    fn map_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout { service: UpstreamService::Ticketing, after_secs: self.timeout_secs }
        } else {
            UpstreamError::Transport { service: UpstreamService::Ticketing, message: error.to_string() }
        }
    }

    fn map_decode_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            return self.map_error(error);
        }
        UpstreamError::Decode { service: UpstreamService::Ticketing, message: error.to_string() }
    }
}

#[async_trait]
impl TicketClient for ServiceNowClient {
    async fn get_incident(
        &self,
        incident_number: &IncidentNumber,
    ) -> Result<Option<TicketSummary>, UpstreamError> {
        let params = incident_query(incident_number);
        let rows = self.fetch_rows(&self.incident_url, &params).await?;

        debug!(
            event_name = "agent.ticketing.incident_fetched",
            incident_number = %incident_number,
            rows = rows.len(),
            "incident query completed"
        );
        Ok(rows.first().map(TicketSummary::from_row))
    }

    async fn search_knowledge_base(
        &self,
        keywords: &[String],
        limit: u32,
    ) -> Result<Vec<KbArticle>, UpstreamError> {
        let Some(params) = kb_query(keywords, limit) else {
            return Ok(Vec::new());
        };
        let rows = self.fetch_rows(&self.kb_url, &params).await?;

        debug!(
            event_name = "agent.ticketing.kb_searched",
            keywords = keywords.len(),
            rows = rows.len(),
            "knowledge base search completed"
        );
        Ok(rows.iter().map(KbArticle::from_row).collect())
    }
}

fn incident_query(incident_number: &IncidentNumber) -> Vec<(&'static str, String)> {
    vec![
        ("sysparm_query", format!("number={incident_number}")),
        ("sysparm_limit", "1".to_string()),
        ("sysparm_fields", INCIDENT_FIELDS.to_string()),
        ("sysparm_suppress_cache_control", "true".to_string()),
    ]
}

/// Encoded-query operators start with `^`; a doubled caret is a literal one.
fn escape_encoded_query(value: &str) -> String {
    value.replace('^', "^^")
}

/// `None` when no usable keyword remains, so no request is issued.
fn kb_query(keywords: &[String], limit: u32) -> Option<Vec<(&'static str, String)>> {
    let filter = keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| format!("short_descriptionLIKE{}", escape_encoded_query(keyword)))
        .collect::<Vec<_>>()
        .join("^OR");

    if filter.is_empty() {
        return None;
    }

    Some(vec![
        ("sysparm_query", filter),
        ("sysparm_type", "kb_knowledge_base".to_string()),
        ("sysparm_limit", limit.max(1).to_string()),
        ("sysparm_suppress_cache_control", "true".to_string()),
    ])
}
