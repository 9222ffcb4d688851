// Shared test helpers for mock Airtable servers and warehouse setup.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use airtable_sync::initialization::{init_sqlite_pool, Unthrottled};
use airtable_sync::remote::RemoteClient;
use airtable_sync::warehouse::SqliteWarehouse;
use airtable_sync::Config;

pub const BASE: &str = "appTEST";
pub const TABLE: &str = "Contacts";

/// Path of the record endpoints for the test table.
pub fn records_path() -> String {
    format!("/v0/{BASE}/{TABLE}")
}

/// Configuration pointing at a mock server, with fast retries and no throttling.
pub fn test_config(server: &MockServer) -> Config {
    Config {
        api_url: server.uri(),
        api_key: "patTEST".to_string(),
        rate_limit_rps: 0,
        max_attempts: 3,
        retry_initial_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(40),
        ..Default::default()
    }
}

#[allow(dead_code)] // Used by other test files
pub fn test_client(server: &MockServer) -> RemoteClient {
    RemoteClient::new(&test_config(server), Arc::new(Unthrottled))
        .expect("Failed to build test client")
}

/// Creates an in-memory warehouse.
#[allow(dead_code)] // Used by other test files
pub async fn memory_warehouse() -> SqliteWarehouse {
    let pool = init_sqlite_pool("sqlite::memory:")
        .await
        .expect("Failed to create in-memory warehouse");
    SqliteWarehouse::new(pool)
}

/// Mounts the schema endpoint describing the test table.
///
/// `fields` are `(name, type)` pairs.
#[allow(dead_code)] // Used by other test files
pub async fn mount_schema(server: &MockServer, fields: &[(&str, &str)]) {
    let fields: Vec<Value> = fields
        .iter()
        .map(|(name, field_type)| json!({ "id": format!("fld{name}"), "name": name, "type": field_type }))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/v0/meta/bases/{BASE}/tables")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tables": [{ "id": "tblTEST", "name": TABLE, "fields": fields }]
        })))
        .mount(server)
        .await;
}

/// A record as the list endpoint returns it.
#[allow(dead_code)] // Used by other test files
pub fn record_json(id: &str, fields: Value) -> Value {
    json!({ "id": id, "createdTime": "2024-01-01T00:00:00.000Z", "fields": fields })
}

/// Airtable error body.
#[allow(dead_code)] // Used by other test files
pub fn error_json(error_type: &str, message: &str) -> Value {
    json!({ "error": { "type": error_type, "message": message } })
}

/// Answers create and update requests by echoing their records back.
///
/// Created records get ids `rec0`, `rec1`, ... in request order. Calls whose
/// index is in `fail_calls` get a 422 instead, and updates naming
/// `missing_id` get a `ROW_DOES_NOT_EXIST` error.
#[derive(Default)]
#[allow(dead_code)] // Used by other test files
pub struct EchoResponder {
    calls: AtomicUsize,
    created: AtomicUsize,
    fail_calls: Vec<usize>,
    missing_id: Option<String>,
}

#[allow(dead_code)] // Used by other test files
impl EchoResponder {
    /// Fails the calls at the given zero-based indices.
    pub fn failing(fail_calls: Vec<usize>) -> Self {
        Self {
            fail_calls,
            ..Default::default()
        }
    }

    /// Rejects any update naming `id`.
    pub fn missing(id: &str) -> Self {
        Self {
            missing_id: Some(id.to_string()),
            ..Default::default()
        }
    }
}

impl Respond for EchoResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return ResponseTemplate::new(422)
                .set_body_json(error_json("INVALID_VALUE_FOR_COLUMN", "Bad value"));
        }

        let body: Value = serde_json::from_slice(&request.body).expect("request body is JSON");
        let records = body["records"].as_array().cloned().unwrap_or_default();
        if let Some(missing) = &self.missing_id {
            if records.iter().any(|r| r["id"] == missing.as_str()) {
                return ResponseTemplate::new(422).set_body_json(error_json(
                    "ROW_DOES_NOT_EXIST",
                    &format!("Record ID {missing} does not exist in this table"),
                ));
            }
        }

        let echoed: Vec<Value> = records
            .into_iter()
            .map(|record| {
                let id = match record.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => format!("rec{}", self.created.fetch_add(1, Ordering::SeqCst)),
                };
                record_json(&id, record["fields"].clone())
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "records": echoed }))
    }
}
