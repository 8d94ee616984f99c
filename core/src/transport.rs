//! Executing requests built by `RecordClient`, and the HTTP-backed store.
//!
//! # Design
//! `Transport` is the host half of the host-does-IO split: it turns an
//! `HttpRequest` into an `HttpResponse` and reports only failures where no
//! response exists. Status interpretation stays in `RecordClient`.
//! `UreqTransport` drives a blocking ureq agent on tokio's blocking pool so
//! the async callers never stall a runtime worker.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::client::RecordClient;
use crate::config::SyncConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::store::{AccountService, RecordStore};
use crate::types::{AccountStatus, PermissionStatus, QueryOutcome, Record, RecordId, UserIdentity};

/// Performs the network round-trip for a plain-data request.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send;
}

/// Blocking ureq agent run on the blocking thread pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Bound every request, connect to last body byte, by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Self {
        // 4xx/5xx come back as data so `RecordClient` can interpret them.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?
    }
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    let HttpRequest { method, path, body, .. } = request;
    let result = match (method, body) {
        (HttpMethod::Get, _) => agent.get(&path).call(),
        (HttpMethod::Delete, _) => agent.delete(&path).call(),
        (HttpMethod::Post, Some(body)) => agent
            .post(&path)
            .content_type("application/json")
            .send(body.as_bytes()),
        (HttpMethod::Post, None) => agent.post(&path).send_empty(),
        (HttpMethod::Put, Some(body)) => agent
            .put(&path)
            .content_type("application/json")
            .send(body.as_bytes()),
        (HttpMethod::Put, None) => agent.put(&path).send_empty(),
    };
    let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    Ok(HttpResponse::new(status, body))
}

/// `RecordStore` and `AccountService` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRecordStore<T = UreqTransport> {
    client: RecordClient,
    transport: T,
}

impl HttpRecordStore<UreqTransport> {
    pub fn connect(base_url: &str, timeout: Duration) -> Self {
        Self::new(RecordClient::new(base_url), UreqTransport::with_timeout(timeout))
    }

    /// Connect to `config.base_url`, bounding each request by `config.call_timeout`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::connect(&config.base_url, config.call_timeout)
    }
}

impl<T: Transport> HttpRecordStore<T> {
    pub fn new(client: RecordClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &RecordClient {
        &self.client
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");
        self.transport.execute(request).await
    }
}

impl<T: Transport> RecordStore for HttpRecordStore<T> {
    async fn query_all(&self, record_type: &str) -> Result<QueryOutcome, ApiError> {
        let response = self.send(self.client.build_query(record_type)).await?;
        self.client.parse_query(response)
    }

    async fn save(&self, record: Record) -> Result<Record, ApiError> {
        let request = self.client.build_save(&record)?;
        let response = self.send(request).await?;
        self.client.parse_save(response)
    }

    async fn delete(&self, id: RecordId) -> Result<RecordId, ApiError> {
        let response = self.send(self.client.build_delete(id)).await?;
        self.client.parse_delete(id, response)
    }
}

impl<T: Transport> AccountService for HttpRecordStore<T> {
    async fn account_status(&self) -> Result<AccountStatus, ApiError> {
        let response = self.send(self.client.build_account_status()).await?;
        self.client.parse_account_status(response)
    }

    async fn request_discoverability(&self) -> Result<PermissionStatus, ApiError> {
        let response = self.send(self.client.build_request_discoverability()).await?;
        self.client.parse_request_discoverability(response)
    }

    async fn fetch_user_record_id(&self) -> Result<RecordId, ApiError> {
        let response = self.send(self.client.build_user_record_id()).await?;
        self.client.parse_user_record_id(response)
    }

    async fn discover_user_identity(&self, user: RecordId) -> Result<Option<UserIdentity>, ApiError> {
        let response = self.send(self.client.build_discover_identity(user)).await?;
        self.client.parse_discover_identity(response)
    }
}
