//! PostgREST client
//!
//! Thin request helper over `reqwest`: adds the service-role headers and maps
//! every failure onto [`StoreError`] so callers can tell "database is away"
//! (retry / fall back) from "database said no".

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use store_core::StoreError;

/// Connection settings
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,

    /// Service-role key (bypasses row level security)
    pub service_key: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// PostgREST error body
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PgError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Postgres / PostgREST codes meaning the schema is not provisioned
const MISSING_SCHEMA_CODES: &[&str] = &["42P01", "42883", "PGRST202", "PGRST205"];

/// Partial unique index holding one confirmed booking per slot
const CONFIRMED_SLOT_INDEX: &str = "coaching_bookings_confirmed_slot";

/// Map a non-success response onto the store taxonomy
pub(crate) fn classify(status: u16, body: &str) -> StoreError {
    let err: PgError = serde_json::from_str(body).unwrap_or_default();
    let code = err.code.as_deref().unwrap_or_default();
    let message = err.message.clone().unwrap_or_else(|| body.to_string());

    match (status, code, message.as_str()) {
        (_, _, "invalid_transition") => StoreError::InvalidTransition {
            from: err.details.unwrap_or_default(),
            to: err.hint.unwrap_or_default(),
        },
        (_, _, "not_found") => StoreError::NotFound(err.details.unwrap_or_else(|| message.clone())),
        (_, "23505", m) if m.contains(CONFIRMED_SLOT_INDEX) => {
            StoreError::SlotTaken(err.details.unwrap_or_else(|| message.clone()))
        }
        (409, _, _) | (_, "23505", _) => StoreError::Persistence(format!("conflicting row: {}", message)),
        (_, code, _) if MISSING_SCHEMA_CODES.contains(&code) => {
            StoreError::PersistenceUnavailable(format!("schema not provisioned: {}", message))
        }
        (401 | 403, _, _) => StoreError::PersistenceUnavailable(format!("database rejected credentials: {}", message)),
        (429 | 500..=599, _, _) => StoreError::PersistenceUnavailable(format!("database returned {}: {}", status, message)),
        _ => StoreError::Persistence(format!("database returned {}: {}", status, message)),
    }
}

/// Map a transport failure onto the store taxonomy
pub(crate) fn transport(err: &reqwest::Error) -> StoreError {
    if err.is_decode() {
        StoreError::Persistence(format!("unreadable database response: {}", err))
    } else {
        StoreError::PersistenceUnavailable(err.to_string())
    }
}

/// Authenticated PostgREST client
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    config: SupabaseConfig,
}

impl PostgrestClient {
    pub fn new(config: SupabaseConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, config }
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{}", self.config.url, path))
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    pub(crate) fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table)
    }

    pub(crate) fn rpc(&self, function: &str) -> RequestBuilder {
        self.request(Method::POST, &format!("rpc/{}", function))
    }

    /// Send and check status
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| transport(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "PostgREST request failed");
        Err(classify(status.as_u16(), &body))
    }

    /// Send, check status and decode the JSON body
    pub(crate) async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| transport(&e))
    }
}
