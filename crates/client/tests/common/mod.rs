//! Fake platform API served by axum on an ephemeral port.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use peduli_client::{ClientConfig, HttpEntityApi};
use peduli_core::types::DbId;
use serde_json::{json, Value};

/// One request as the fake backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub resource: String,
    pub id: Option<DbId>,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

/// In-memory tables keyed by resource path.
#[derive(Default)]
pub struct Backend {
    tables: Mutex<HashMap<String, BTreeMap<DbId, Value>>>,
    failing: Mutex<HashSet<DbId>>,
    requests: Mutex<Vec<Recorded>>,
    delay: Mutex<Option<Duration>>,
}

impl Backend {
    pub fn seed(&self, resource: &str, rows: &[(DbId, Option<&str>)]) {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(resource.to_string()).or_default();
        for (id, status) in rows {
            table.insert(*id, json!({ "id": id, "status": status, "title": format!("row {id}") }));
        }
    }

    pub fn fail_on(&self, ids: &[DbId]) {
        self.failing.lock().unwrap().extend(ids.iter().copied());
    }

    pub fn delay_responses(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn row(&self, resource: &str, id: DbId) -> Option<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(resource)
            .and_then(|table| table.get(&id).cloned())
    }

    fn record(&self, recorded: Recorded) {
        self.requests.lock().unwrap().push(recorded);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn rejects(&self, id: DbId) -> bool {
        self.failing.lock().unwrap().contains(&id)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

async fn list_rows(
    State(backend): State<Arc<Backend>>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    backend.record(Recorded {
        method: "GET",
        resource: resource.clone(),
        id: None,
        query: query.clone(),
        authorization: bearer(&headers),
        body: None,
    });
    backend.pause().await;

    let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let tables = backend.tables.lock().unwrap();
    let matching: Vec<Value> = tables
        .get(&resource)
        .map(|table| {
            table
                .values()
                .filter(|row| match query.get("status") {
                    Some(status) => row["status"] == status.as_str(),
                    None => true,
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let total = matching.len();
    let items: Vec<Value> = matching.into_iter().skip(offset).take(limit).collect();
    Json(json!({ "data": { "items": items, "total": total } })).into_response()
}

async fn delete_row(
    State(backend): State<Arc<Backend>>,
    Path((resource, id)): Path<(String, DbId)>,
    headers: HeaderMap,
) -> Response {
    backend.record(Recorded {
        method: "DELETE",
        resource: resource.clone(),
        id: Some(id),
        query: HashMap::new(),
        authorization: bearer(&headers),
        body: None,
    });
    backend.pause().await;

    if backend.rejects(id) {
        return error(StatusCode::CONFLICT, "CONFLICT", "Row is referenced elsewhere");
    }
    let removed = backend
        .tables
        .lock()
        .unwrap()
        .get_mut(&resource)
        .and_then(|table| table.remove(&id));
    match removed {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found"),
    }
}

async fn update_row(
    State(backend): State<Arc<Backend>>,
    Path((resource, id)): Path<(String, DbId)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record(Recorded {
        method: "PUT",
        resource: resource.clone(),
        id: Some(id),
        query: HashMap::new(),
        authorization: bearer(&headers),
        body: Some(body.clone()),
    });
    if backend.rejects(id) {
        return error(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", "Invalid fields");
    }
    let mut tables = backend.tables.lock().unwrap();
    match tables.get_mut(&resource).and_then(|table| table.get_mut(&id)) {
        Some(row) => {
            if let (Some(row), Some(fields)) = (row.as_object_mut(), body.as_object()) {
                row.extend(fields.clone());
            }
            Json(json!({ "data": row })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found"),
    }
}

async fn patch_status(
    State(backend): State<Arc<Backend>>,
    Path((resource, id)): Path<(String, DbId)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    backend.record(Recorded {
        method: "PATCH",
        resource: resource.clone(),
        id: Some(id),
        query: HashMap::new(),
        authorization: bearer(&headers),
        body: Some(body.clone()),
    });
    backend.pause().await;

    if backend.rejects(id) {
        return error(StatusCode::CONFLICT, "CONFLICT", "Status changed concurrently");
    }
    let mut tables = backend.tables.lock().unwrap();
    match tables.get_mut(&resource).and_then(|table| table.get_mut(&id)) {
        Some(row) => {
            row["status"] = body["status"].clone();
            Json(json!({ "data": row })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found"),
    }
}

/// Start the fake backend and return it with its address.
pub async fn spawn_backend() -> (Arc<Backend>, SocketAddr) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/v1/{resource}", get(list_rows))
        .route(
            "/api/v1/{resource}/{id}",
            axum::routing::delete(delete_row).put(update_row),
        )
        .route("/api/v1/{resource}/{id}/status", patch(patch_status))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (backend, addr)
}

/// Client config pointing at `addr`.
pub fn test_config(addr: SocketAddr, token: Option<&str>) -> ClientConfig {
    ClientConfig {
        base_url: format!("http://{addr}"),
        token: token.map(str::to_string),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn client(addr: SocketAddr) -> Arc<HttpEntityApi> {
    Arc::new(HttpEntityApi::new(&test_config(addr, Some("admin-token"))).unwrap())
}
