//! In-process stand-in for the inventory API, used by the tests.
//!
//! Serves the list, create, patch and delete endpoints the converge step
//! touches, keeps its objects in memory and records every request line so
//! tests can assert which calls were made.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use shared::protocol::{
    DEVICES_ENDPOINT, IP_ADDRESSES_ENDPOINT, SERVICES_ENDPOINT, TOKEN_SCHEME,
    VIRTUAL_MACHINES_ENDPOINT,
};
use shared::types::Protocol;
use crate::config::Connection;
use crate::netbox::NetboxClient;

pub const MOCK_TOKEN: &str = "0123456789abcdef";

type Shared = Arc<Mutex<Inventory>>;

#[derive(Default)]
struct Inventory {
    devices: Vec<Value>,
    virtual_machines: Vec<Value>,
    ip_addresses: Vec<Value>,
    services: Vec<Value>,
    next_id: u64,
    requests: Vec<String>,
}

impl Inventory {
    fn seeded() -> Self {
        Self {
            devices: vec![
                json!({"id": 1, "name": "Test666"}),
                json!({"id": 2, "name": "Test777"}),
                json!({"id": 3, "name": "twin"}),
                json!({"id": 4, "name": "twin"}),
            ],
            virtual_machines: vec![json!({"id": 7, "name": "vm-01"})],
            ip_addresses: vec![
                json!({"id": 11, "address": "10.0.0.11/24"}),
                json!({"id": 12, "address": "10.0.0.12/24"}),
            ],
            next_id: 100,
            ..Self::default()
        }
    }

    fn admit(&mut self, line: String, headers: &HeaderMap) -> Result<(), Response> {
        self.requests.push(line);
        let expected = format!("{} {}", TOKEN_SCHEME, MOCK_TOKEN);
        match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(value) if value == expected => Ok(()),
            _ => Err((StatusCode::FORBIDDEN, Json(json!({"detail": "Invalid token"})))
                .into_response()),
        }
    }

    /// Expand a request body into the nested shape the API returns.
    fn apply(&self, record: &mut Value, body: &Value) {
        let (Some(record), Some(body)) = (record.as_object_mut(), body.as_object()) else {
            return;
        };
        for (key, value) in body {
            let stored = match key.as_str() {
                "device" => nested(&self.devices, value),
                "virtual_machine" => nested(&self.virtual_machines, value),
                "ipaddresses" => Value::Array(
                    value
                        .as_array()
                        .map(|ids| ids.iter().map(|id| nested(&self.ip_addresses, id)).collect())
                        .unwrap_or_default(),
                ),
                "protocol" => match value.as_u64().and_then(Protocol::from_code) {
                    Some(proto) => json!({"value": proto.code(), "label": proto.label()}),
                    None => value.clone(),
                },
                _ => value.clone(),
            };
            record.insert(key.clone(), stored);
        }
    }
}

fn nested(collection: &[Value], id: &Value) -> Value {
    if id.is_null() {
        return Value::Null;
    }
    collection
        .iter()
        .find(|item| item.get("id") == Some(id))
        .cloned()
        .unwrap_or_else(|| json!({"id": id}))
}

fn matches_query(item: &Value, query: &HashMap<String, String>) -> bool {
    query.iter().all(|(key, wanted)| {
        let field = match key.strip_suffix("_id") {
            Some(base) => item.get(base).and_then(|v| v.get("id")),
            None => item.get(key.as_str()),
        };
        match field {
            Some(Value::String(s)) => s == wanted,
            Some(Value::Number(n)) => n.to_string() == *wanted,
            _ => false,
        }
    })
}

#[derive(Clone, Copy)]
enum Collection {
    Devices,
    VirtualMachines,
    IpAddresses,
    Services,
}

impl Collection {
    fn path(self) -> &'static str {
        match self {
            Collection::Devices => DEVICES_ENDPOINT,
            Collection::VirtualMachines => VIRTUAL_MACHINES_ENDPOINT,
            Collection::IpAddresses => IP_ADDRESSES_ENDPOINT,
            Collection::Services => SERVICES_ENDPOINT,
        }
    }

    fn items(self, inventory: &Inventory) -> &[Value] {
        match self {
            Collection::Devices => &inventory.devices,
            Collection::VirtualMachines => &inventory.virtual_machines,
            Collection::IpAddresses => &inventory.ip_addresses,
            Collection::Services => &inventory.services,
        }
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route(DEVICES_ENDPOINT, get(list_devices))
        .route(VIRTUAL_MACHINES_ENDPOINT, get(list_virtual_machines))
        .route(IP_ADDRESSES_ENDPOINT, get(list_ip_addresses))
        .route(SERVICES_ENDPOINT, get(list_services).post(create_service))
        .route("/api/ipam/services/:id/", patch(update_service).delete(delete_service))
        .with_state(state)
}

fn list(state: &Shared, collection: Collection, headers: &HeaderMap, query: &HashMap<String, String>) -> Response {
    let mut inventory = state.lock().unwrap();
    if let Err(denied) = inventory.admit(format!("GET {}", collection.path()), headers) {
        return denied;
    }
    let results: Vec<Value> = collection
        .items(&inventory)
        .iter()
        .filter(|item| matches_query(item, query))
        .cloned()
        .collect();
    Json(json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results,
    }))
    .into_response()
}

async fn list_devices(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    list(&state, Collection::Devices, &headers, &query)
}

async fn list_virtual_machines(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    list(&state, Collection::VirtualMachines, &headers, &query)
}

async fn list_ip_addresses(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    list(&state, Collection::IpAddresses, &headers, &query)
}

async fn list_services(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    list(&state, Collection::Services, &headers, &query)
}

async fn create_service(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut inventory = state.lock().unwrap();
    if let Err(denied) = inventory.admit(format!("POST {}", SERVICES_ENDPOINT), &headers) {
        return denied;
    }
    inventory.next_id += 1;
    let mut record = json!({
        "id": inventory.next_id,
        "name": null,
        "device": null,
        "virtual_machine": null,
        "port": null,
        "protocol": null,
        "ipaddresses": [],
        "description": "",
        "custom_fields": {},
    });
    inventory.apply(&mut record, &body);
    inventory.services.push(record.clone());
    (StatusCode::CREATED, Json(record)).into_response()
}

async fn update_service(
    State(state): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut inventory = state.lock().unwrap();
    if let Err(denied) = inventory.admit(format!("PATCH {}{}/", SERVICES_ENDPOINT, id), &headers) {
        return denied;
    }
    let Some(pos) = inventory.services.iter().position(|s| s["id"] == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    let mut record = inventory.services[pos].clone();
    inventory.apply(&mut record, &body);
    inventory.services[pos] = record.clone();
    Json(record).into_response()
}

async fn delete_service(
    State(state): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let mut inventory = state.lock().unwrap();
    if let Err(denied) = inventory.admit(format!("DELETE {}{}/", SERVICES_ENDPOINT, id), &headers) {
        return denied;
    }
    match inventory.services.iter().position(|s| s["id"] == id) {
        Some(pos) => {
            inventory.services.remove(pos);
            StatusCode::NO_CONTENT.into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

/// Handle to a running mock server.
#[derive(Clone)]
pub struct MockNetbox {
    pub url: String,
    inventory: Shared,
}

impl MockNetbox {
    pub async fn start() -> Self {
        let inventory = Arc::new(Mutex::new(Inventory::seeded()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock listener address");
        let app = router(inventory.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });
        Self {
            url: format!("http://{}", addr),
            inventory,
        }
    }

    pub fn client(&self) -> NetboxClient {
        NetboxClient::new(&Connection {
            url: self.url.clone(),
            token: MOCK_TOKEN.to_string(),
            validate_certs: true,
            timeout: Duration::from_secs(5),
        })
        .expect("mock client")
    }

    /// Every request line received so far, e.g. `POST /api/ipam/services/`.
    pub fn requests(&self) -> Vec<String> {
        self.inventory.lock().unwrap().requests.clone()
    }

    /// Requests other than lookups.
    pub fn mutations(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|line| !line.starts_with("GET "))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.inventory.lock().unwrap().requests.clear();
    }

    pub fn services(&self) -> Vec<Value> {
        self.inventory.lock().unwrap().services.clone()
    }

    /// Store a service as-is, bypassing request expansion.
    pub fn seed_service(&self, record: Value) {
        self.inventory.lock().unwrap().services.push(record);
    }
}
