use std::collections::HashSet;

use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, AccountFixture, MockConfig, Record};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- query ---

#[tokio::test]
async fn query_empty_collection() {
    let resp = app()
        .oneshot(empty_request("GET", "/records?type=Fruits"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn query_filters_by_type_and_keeps_insertion_order() {
    let config = MockConfig {
        records: vec![
            Record::named("Fruits", "Apple"),
            Record::named("Vegetables", "Leek"),
            Record::named("Fruits", "Banana"),
        ],
        ..MockConfig::default()
    };
    let resp = app_with(config)
        .oneshot(empty_request("GET", "/records?type=Fruits"))
        .await
        .unwrap();

    let body: Value = body_json(resp).await;
    let names: Vec<&str> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["record"]["fields"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Apple", "Banana"]);
}

#[tokio::test]
async fn query_reports_unreadable_records_as_errors() {
    let broken = Record::named("Fruits", "Cherry");
    let config = MockConfig {
        records: vec![Record::named("Fruits", "Apple"), broken.clone()],
        unreadable: HashSet::from([broken.id]),
        ..MockConfig::default()
    };
    let resp = app_with(config)
        .oneshot(empty_request("GET", "/records?type=Fruits"))
        .await
        .unwrap();

    let body: Value = body_json(resp).await;
    let results = body["results"].as_array().unwrap();
    assert!(results[0].get("record").is_some());
    assert_eq!(results[1]["error"]["record_id"], broken.id.to_string());
}

#[tokio::test]
async fn query_without_type_is_rejected() {
    let resp = app().oneshot(empty_request("GET", "/records")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- save ---

#[tokio::test]
async fn save_new_record_returns_201() {
    let id = Uuid::new_v4();
    let body = format!(r#"{{"id":"{id}","record_type":"Fruits","fields":{{"name":"Apple"}}}}"#);
    let resp = app()
        .oneshot(json_request("PUT", &format!("/records/{id}"), &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let record: Record = body_json(resp).await;
    assert_eq!(record.id, id);
    assert_eq!(record.fields["name"], "Apple");
}

#[tokio::test]
async fn save_with_mismatched_id_returns_400() {
    let body = format!(
        r#"{{"id":"{}","record_type":"Fruits","fields":{{}}}}"#,
        Uuid::new_v4()
    );
    let resp = app()
        .oneshot(json_request("PUT", &format!("/records/{}", Uuid::new_v4()), &body))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request(
            "PUT",
            &format!("/records/{}", Uuid::new_v4()),
            r#"{"fields":1}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn save_bad_uuid_returns_400() {
    let resp = app()
        .oneshot(json_request("PUT", "/records/not-a-uuid", "{}"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_record_not_found() {
    let resp = app()
        .oneshot(empty_request(
            "DELETE",
            "/records/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- account ---

#[tokio::test]
async fn account_endpoints_follow_fixture() {
    let user = Uuid::new_v4();
    let config = MockConfig {
        account: AccountFixture {
            status: "restricted".to_string(),
            permission: "denied".to_string(),
            user_record_id: Some(user),
            identities: Default::default(),
        },
        ..MockConfig::default()
    };
    let app = app_with(config);

    let resp = app.clone().oneshot(empty_request("GET", "/account/status")).await.unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["status"], "restricted");

    let resp = app
        .clone()
        .oneshot(empty_request("POST", "/account/permissions/user-discoverability"))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["status"], "denied");

    let resp = app
        .clone()
        .oneshot(empty_request("GET", "/account/user-record-id"))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["record_id"], user.to_string());

    let resp = app
        .oneshot(empty_request("GET", &format!("/users/{user}/identity")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();
    let id = Uuid::new_v4();

    // create
    let body = format!(r#"{{"id":"{id}","record_type":"Fruits","fields":{{"name":"Apple"}}}}"#);
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PUT", &format!("/records/{id}"), &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // replace the same id
    let body = format!(r#"{{"id":"{id}","record_type":"Fruits","fields":{{"name":"Pear"}}}}"#);
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("PUT", &format!("/records/{id}"), &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // query: one record, renamed
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/records?type=Fruits"))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["record"]["fields"]["name"], "Pear");

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/records/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // delete again: 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/records/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // query after delete: empty
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/records?type=Fruits"))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert!(body["results"].as_array().unwrap().is_empty());
}
