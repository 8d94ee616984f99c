//! Stateless HTTP request builder and response parser for the record service.
//!
//! # Design
//! `RecordClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`. The
//! caller executes the round-trip, keeping this layer deterministic and free
//! of I/O.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    AccountStatus, AccountStatusBody, PermissionBody, PermissionStatus, QueryOutcome,
    QueryResponse, Record, RecordId, UserIdentity, UserRecordIdBody,
};

/// Everything outside the URL "unreserved" set gets escaped in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Synchronous, stateless client for the record service.
#[derive(Debug, Clone)]
pub struct RecordClient {
    base_url: String,
}

impl RecordClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query every record of `record_type`. The predicate is always "match all".
    pub fn build_query(&self, record_type: &str) -> HttpRequest {
        HttpRequest::bodyless(
            HttpMethod::Get,
            format!("{}/records?type={}", self.base_url, utf8_percent_encode(record_type, QUERY_VALUE)),
        )
    }

    /// Upsert `record`; the service creates or replaces by `record.id`.
    pub fn build_save(&self, record: &Record) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(record).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest::json(
            HttpMethod::Put,
            format!("{}/records/{}", self.base_url, record.id),
            body,
        ))
    }

    pub fn build_delete(&self, id: RecordId) -> HttpRequest {
        HttpRequest::bodyless(HttpMethod::Delete, format!("{}/records/{id}", self.base_url))
    }

    pub fn build_account_status(&self) -> HttpRequest {
        HttpRequest::bodyless(HttpMethod::Get, format!("{}/account/status", self.base_url))
    }

    pub fn build_request_discoverability(&self) -> HttpRequest {
        HttpRequest::bodyless(
            HttpMethod::Post,
            format!("{}/account/permissions/user-discoverability", self.base_url),
        )
    }

    pub fn build_user_record_id(&self) -> HttpRequest {
        HttpRequest::bodyless(HttpMethod::Get, format!("{}/account/user-record-id", self.base_url))
    }

    pub fn build_discover_identity(&self, user: RecordId) -> HttpRequest {
        HttpRequest::bodyless(HttpMethod::Get, format!("{}/users/{user}/identity", self.base_url))
    }

    pub fn parse_query(&self, response: HttpResponse) -> Result<QueryOutcome, ApiError> {
        check_status(&response, &[200])?;
        let body: QueryResponse = decode(&response)?;
        Ok(body.into())
    }

    /// Accepts 201 (created) and 200 (replaced); both carry the stored record.
    pub fn parse_save(&self, response: HttpResponse) -> Result<Record, ApiError> {
        check_status(&response, &[200, 201])?;
        decode(&response)
    }

    pub fn parse_delete(&self, id: RecordId, response: HttpResponse) -> Result<RecordId, ApiError> {
        check_status(&response, &[204])?;
        Ok(id)
    }

    pub fn parse_account_status(&self, response: HttpResponse) -> Result<AccountStatus, ApiError> {
        check_status(&response, &[200])?;
        decode::<AccountStatusBody>(&response).map(|body| body.status)
    }

    pub fn parse_request_discoverability(&self, response: HttpResponse) -> Result<PermissionStatus, ApiError> {
        check_status(&response, &[200])?;
        decode::<PermissionBody>(&response).map(|body| body.status)
    }

    pub fn parse_user_record_id(&self, response: HttpResponse) -> Result<RecordId, ApiError> {
        check_status(&response, &[200])?;
        decode::<UserRecordIdBody>(&response).map(|body| body.record_id)
    }

    /// An unknown user is not an error here: the identity is simply absent.
    pub fn parse_discover_identity(&self, response: HttpResponse) -> Result<Option<UserIdentity>, ApiError> {
        match check_status(&response, &[200]) {
            Ok(()) => decode(&response).map(Some),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map unexpected status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: &[u16]) -> Result<(), ApiError> {
    if expected.contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}
