//! Records and wire DTOs for the record service.
//!
//! # Design
//! A `Record` is schemaless on the wire: an identity, a record type and a bag
//! of JSON fields. The client mints the identity (UUID v4) when it creates a
//! record, so the service can treat every save as an upsert keyed by id.
//! These types are defined independently from the mock-server crate; the
//! integration tests catch schema drift between the two.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identity of a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A remote entity: identity, type, and named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// A record with a fresh identity and no fields.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            record_type: record_type.into(),
            fields: Map::new(),
        }
    }

    /// The value of `field` if it is present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }
}

/// Per-record failure reported inside a query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    #[serde(default)]
    pub record_id: Option<RecordId>,
    pub message: String,
}

/// One entry of a query response: a matched record or an error for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEntry {
    Record(Record),
    Error(RecordFailure),
}

/// Body of `GET /records?type=...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<QueryEntry>,
}

/// Result of a completed query: one entry per matched record, in service order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutcome {
    pub results: Vec<Result<Record, RecordFailure>>,
}

impl QueryOutcome {
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            results: records.into_iter().map(Ok).collect(),
        }
    }
}

impl From<QueryResponse> for QueryOutcome {
    fn from(response: QueryResponse) -> Self {
        let results = response
            .results
            .into_iter()
            .map(|entry| match entry {
                QueryEntry::Record(record) => Ok(record),
                QueryEntry::Error(failure) => Err(failure),
            })
            .collect();
        Self { results }
    }
}

/// Cloud account availability as reported by the account service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Available,
    NoAccount,
    CouldNotDetermine,
    Restricted,
    #[serde(other)]
    Unknown,
}

/// Outcome of an application permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    InitialState,
    CouldNotComplete,
    Denied,
    Granted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatusBody {
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionBody {
    pub status: PermissionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecordIdBody {
    pub record_id: RecordId,
}

/// Discoverable identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_str_ignores_non_strings() {
        let record = Record::new("Fruits").with("name", "Apple").with("count", 3);
        assert_eq!(record.get_str("name"), Some("Apple"));
        assert_eq!(record.get_str("count"), None);
        assert_eq!(record.get_str("missing"), None);
    }

    #[test]
    fn fresh_records_get_distinct_ids() {
        assert_ne!(Record::new("Fruits").id, Record::new("Fruits").id);
    }

    #[test]
    fn query_entry_uses_external_tags() {
        let raw = r#"{"results":[
            {"record":{"id":"00000000-0000-0000-0000-000000000001","record_type":"Fruits","fields":{"name":"Pear"}}},
            {"error":{"message":"zone busy"}}
        ]}"#;
        let outcome: QueryOutcome = serde_json::from_str::<QueryResponse>(raw).unwrap().into();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].as_ref().unwrap().get_str("name"), Some("Pear"));
        let failure = outcome.results[1].as_ref().unwrap_err();
        assert_eq!(failure.record_id, None);
        assert_eq!(failure.message, "zone busy");
    }

    #[test]
    fn record_without_fields_defaults_to_empty() {
        let raw = r#"{"id":"00000000-0000-0000-0000-000000000002","record_type":"Fruits"}"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn unrecognised_account_status_is_unknown() {
        let body: AccountStatusBody = serde_json::from_str(r#"{"status":"temporarily_unavailable"}"#).unwrap();
        assert_eq!(body.status, AccountStatus::Unknown);
        let body: AccountStatusBody = serde_json::from_str(r#"{"status":"no_account"}"#).unwrap();
        assert_eq!(body.status, AccountStatus::NoAccount);
    }
}
