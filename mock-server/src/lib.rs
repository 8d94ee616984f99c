//! In-memory stand-in for the remote record service and its account API.
//!
//! Records are kept in insertion order so query results are deterministic.
//! `MockConfig` seeds records, marks records the query should report as
//! unreadable, and fixes the answers of the account endpoints.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub record_type: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn named(record_type: &str, name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::from(name));
        Self {
            id: Uuid::new_v4(),
            record_type: record_type.to_string(),
            fields,
        }
    }
}

#[derive(Deserialize)]
pub struct QueryParams {
    #[serde(rename = "type")]
    pub record_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Fixed answers for the account endpoints.
#[derive(Clone, Debug)]
pub struct AccountFixture {
    pub status: String,
    pub permission: String,
    pub user_record_id: Option<Uuid>,
    pub identities: HashMap<Uuid, Identity>,
}

impl Default for AccountFixture {
    fn default() -> Self {
        let user = Uuid::new_v4();
        let identity = Identity {
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
        };
        Self {
            status: "available".to_string(),
            permission: "granted".to_string(),
            user_record_id: Some(user),
            identities: HashMap::from([(user, identity)]),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub records: Vec<Record>,
    /// Ids the query reports as per-record errors instead of returning them.
    pub unreadable: HashSet<Uuid>,
    pub account: AccountFixture,
}

#[derive(Clone)]
struct AppState {
    records: Arc<RwLock<Vec<Record>>>,
    unreadable: Arc<HashSet<Uuid>>,
    account: Arc<AccountFixture>,
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state = AppState {
        records: Arc::new(RwLock::new(config.records)),
        unreadable: Arc::new(config.unreadable),
        account: Arc::new(config.account),
    };
    Router::new()
        .route("/records", get(query_records))
        .route("/records/{id}", put(save_record).delete(delete_record))
        .route("/account/status", get(account_status))
        .route("/account/permissions/user-discoverability", post(request_permission))
        .route("/account/user-record-id", get(user_record_id))
        .route("/users/{id}/identity", get(discover_identity))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, MockConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

async fn query_records(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Json<Value> {
    let records = state.records.read().await;
    let results: Vec<Value> = records
        .iter()
        .filter(|r| r.record_type == params.record_type)
        .map(|r| {
            if state.unreadable.contains(&r.id) {
                json!({ "error": { "record_id": r.id, "message": "record could not be read" } })
            } else {
                json!({ "record": r })
            }
        })
        .collect();
    Json(json!({ "results": results }))
}

/// Upsert keyed by the path id: 201 when created, 200 when replaced.
async fn save_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(record): Json<Record>,
) -> Result<(StatusCode, Json<Record>), StatusCode> {
    if record.id != id {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut records = state.records.write().await;
    match records.iter_mut().find(|r| r.id == id) {
        Some(existing) => {
            *existing = record.clone();
            info!(%id, "record replaced");
            Ok((StatusCode::OK, Json(record)))
        }
        None => {
            records.push(record.clone());
            info!(%id, "record created");
            Ok((StatusCode::CREATED, Json(record)))
        }
    }
}

async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let mut records = state.records.write().await;
    let index = records.iter().position(|r| r.id == id).ok_or(StatusCode::NOT_FOUND)?;
    records.remove(index);
    info!(%id, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn account_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": state.account.status }))
}

async fn request_permission(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": state.account.permission }))
}

async fn user_record_id(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let id = state.account.user_record_id.ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "record_id": id })))
}

async fn discover_identity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Identity>, StatusCode> {
    state
        .account
        .identities
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_to_json() {
        let mut record = Record::named("Fruits", "Apple");
        record.id = Uuid::nil();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["record_type"], "Fruits");
        assert_eq!(json["fields"]["name"], "Apple");
    }

    #[test]
    fn record_fields_default_to_empty() {
        let record: Record = serde_json::from_str(
            r#"{"id":"00000000-0000-0000-0000-000000000000","record_type":"Fruits"}"#,
        )
        .unwrap();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn record_rejects_missing_type() {
        let result: Result<Record, _> =
            serde_json::from_str(r#"{"id":"00000000-0000-0000-0000-000000000000"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn default_fixture_can_discover_its_user() {
        let fixture = AccountFixture::default();
        let user = fixture.user_record_id.unwrap();
        assert_eq!(fixture.identities[&user].given_name.as_deref(), Some("Ada"));
    }
}
