//! REST implementation of the cloud backend.
//!
//! Talks to a PostgREST-style API: filtered ordered reads via query string,
//! single-row reads by id, JSON row writes, and RPC endpoints under `/rpc/`.

use std::env;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{AgencyType, IncidentId, IncidentStatus};
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{
    CloudBackend, CloudHistoryEntry, CloudIncident, IncidentPatch, NewIncident, StationAssignment,
};

const ENV_API_URL: &str = "IREPORT_API_URL";
const ENV_API_KEY: &str = "IREPORT_API_KEY";
const ENV_ACCESS_TOKEN: &str = "IREPORT_ACCESS_TOKEN";

/// Connection settings for the cloud REST API.
#[derive(Clone, PartialEq, Eq)]
pub struct CloudConfig {
    /// API base URL (e.g. `https://project.example.co`)
    pub base_url: String,
    /// Public API key sent with every request
    pub api_key: String,
    /// Per-user access token; falls back to the API key when absent
    pub access_token: Option<String>,
}

impl std::fmt::Debug for CloudConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CloudConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl CloudConfig {
    /// Create a configuration for an explicit endpoint and key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Attach a per-user access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Load cloud configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no cloud variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = normalize_text_option(env::var(ENV_API_URL).ok());
        let api_key = normalize_text_option(env::var(ENV_API_KEY).ok());

        match (base_url, api_key) {
            (None, None) => Ok(None),
            (Some(base_url), Some(api_key)) => Ok(Some(Self {
                base_url,
                api_key,
                access_token: normalize_text_option(env::var(ENV_ACCESS_TOKEN).ok()),
            })),
            _ => Err(Error::InvalidInput(format!(
                "Both {ENV_API_URL} and {ENV_API_KEY} must be set"
            ))),
        }
    }
}

/// reqwest-backed [`CloudBackend`] implementation.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl RestBackend {
    /// Build a backend from a [`CloudConfig`].
    pub fn new(config: CloudConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            api_key: config.api_key,
            access_token: config.access_token,
            client: reqwest::Client::builder().build()?,
        })
    }

    /// Returns the normalized API base URL used by this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{function}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header("Accept", "application/json")
    }
}

#[async_trait]
impl CloudBackend for RestBackend {
    async fn fetch_incidents_since(&self, watermark: i64) -> Result<Vec<CloudIncident>> {
        let url = format!(
            "{}?select=*&updated_at=gte.{watermark}&order=updated_at.asc",
            self.table_url("incidents")
        );
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check(response).await?;
        Ok(response.json::<Vec<CloudIncident>>().await?)
    }

    async fn fetch_updated_at(&self, id: &IncidentId) -> Result<Option<i64>> {
        let url = format!(
            "{}?select=updated_at&id=eq.{}",
            self.table_url("incidents"),
            urlencoding::encode(&id.as_str())
        );
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check(response).await?;
        let rows = response.json::<Vec<UpdatedAtRow>>().await?;
        Ok(rows.first().map(|row| row.updated_at))
    }

    async fn update_incident(&self, id: &IncidentId, patch: &IncidentPatch) -> Result<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.table_url("incidents"),
            urlencoding::encode(&id.as_str())
        );
        let response = self
            .authorize(self.client.patch(url))
            .json(patch)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn insert_incident(&self, incident: &NewIncident) -> Result<CloudIncident> {
        let response = self
            .authorize(self.client.post(self.table_url("incidents")))
            .header("Prefer", "return=representation")
            .json(incident)
            .send()
            .await?;
        let response = check(response).await?;
        let mut rows = response.json::<Vec<CloudIncident>>().await?;
        if rows.is_empty() {
            return Err(Error::Cloud(
                "Insert did not return the stored incident".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn insert_status_history(&self, entry: &CloudHistoryEntry) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.table_url("incident_status_history")))
            .json(entry)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn find_nearest_station(
        &self,
        latitude: f64,
        longitude: f64,
        agency: AgencyType,
    ) -> Result<Option<StationAssignment>> {
        let response = self
            .authorize(self.client.post(self.rpc_url("find_nearest_station")))
            .json(&serde_json::json!({
                "incident_lat": latitude,
                "incident_lon": longitude,
                "target_agency_id": agency.station_lookup_id(),
            }))
            .send()
            .await?;
        let response = check(response).await?;
        let rows = response.json::<Vec<StationAssignment>>().await?;
        Ok(rows.into_iter().next())
    }

    async fn assign_station(&self, id: &IncidentId, station_id: i64) -> Result<()> {
        let url = format!(
            "{}?id=eq.{}",
            self.table_url("incidents"),
            urlencoding::encode(&id.as_str())
        );
        let response = self
            .authorize(self.client.patch(url))
            .json(&serde_json::json!({
                "assigned_station_id": station_id,
                "status": IncidentStatus::Assigned,
            }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UpdatedAtRow {
    updated_at: i64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map a non-success response to [`Error::Cloud`] with a readable message.
async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Cloud(parse_api_error(status, &body)))
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base_url = normalize_text_option(Some(raw.to_string())).ok_or_else(|| {
        Error::InvalidInput("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("api.example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        let backend = RestBackend::new(CloudConfig::new("https://api.example.com/", "key")).unwrap();
        assert_eq!(backend.base_url(), "https://api.example.com");
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        let body = r#"{"message": "row level security", "error": "denied"}"#;
        let parsed = parse_api_error(StatusCode::FORBIDDEN, body);
        assert_eq!(parsed, "row level security (403)");
    }

    #[test]
    fn parse_api_error_falls_back_to_body() {
        let parsed = parse_api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(parsed, "upstream down (502)");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }

    #[test]
    fn cloud_config_debug_redacts_secrets() {
        let config = CloudConfig::new("https://api.example.com", "secret-key")
            .with_access_token("secret-token");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
