//! Shared test utilities for signoz-provider integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use signoz_provider::apis::{ProviderConfig, ProviderCredentials, Secret, SecretKeySelector};
use signoz_provider::store::{MemoryStore, ResourceStore};

pub const API_KEY: &str = "test-key";
pub const PROVIDER_CONFIG: &str = "default";

/// Allocate an available port for testing.
pub fn allocate_port() -> u16 {
    portpicker::pick_unused_port().expect("No available port")
}

/// A request received by the mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub api_key: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    requests: Vec<Recorded>,
    collections: BTreeMap<String, BTreeMap<String, Value>>,
    next_id: u64,
    fail_with: Option<(u16, String)>,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process stand-in for the SigNoz REST API.
pub struct MockSignoz {
    pub addr: SocketAddr,
    state: Shared,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockSignoz {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let router = Router::new().fallback(handle).with_state(state.clone());

        let addr: SocketAddr = format!("127.0.0.1:{}", allocate_port()).parse().unwrap();
        let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests other than reads.
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != "GET")
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    /// Answer every request with the given status and body.
    pub fn fail_with(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fail_with = Some((status, body.to_string()));
    }

    pub fn stored(&self, collection: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned()
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

fn not_found(path: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "error": format!("{} not found", path) })),
    )
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let path = uri.path().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let mut state = state.lock().unwrap();
    state.requests.push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        api_key: header("SIGNOZ-API-KEY"),
        content_type: header("content-type"),
        body: body.clone(),
    });

    if let Some((status, text)) = state.fail_with.clone() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, text).into_response();
    }

    let Some(rest) = path.strip_prefix("/api/v1/") else {
        return not_found(&path).into_response();
    };
    let parts: Vec<&str> = rest.split('/').collect();

    match (method.as_str(), parts.as_slice()) {
        ("POST", ["testChannel"]) => Json(json!({ "status": "success" })).into_response(),
        ("GET", [collection]) => {
            let items: Vec<Value> = state
                .collections
                .get(*collection)
                .map(|c| c.values().cloned().collect())
                .unwrap_or_default();
            envelope(Value::Array(items)).into_response()
        }
        ("POST", [collection]) => {
            state.next_id += 1;
            let n = state.next_id;
            // Channels use integer ids, the other collections strings.
            let id = if *collection == "channels" {
                json!(n)
            } else {
                json!(n.to_string())
            };
            let mut stored = body;
            if let Value::Object(map) = &mut stored {
                map.insert("id".to_string(), id);
                map.insert("created_at".to_string(), json!("2024-05-01T10:00:00Z"));
                map.insert("updated_at".to_string(), json!("2024-05-01T10:00:00Z"));
            }
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(n.to_string(), stored.clone());
            envelope(stored).into_response()
        }
        ("GET", [collection, id]) => {
            match state.collections.get(*collection).and_then(|c| c.get(*id)) {
                Some(item) => envelope(item.clone()).into_response(),
                None => not_found(&path).into_response(),
            }
        }
        ("PUT", [collection, id]) => {
            let Some(existing) = state
                .collections
                .get_mut(*collection)
                .and_then(|c| c.get_mut(*id))
            else {
                return not_found(&path).into_response();
            };
            let mut updated = body;
            if let (Value::Object(map), Value::Object(old)) = (&mut updated, &*existing) {
                for field in ["id", "created_at"] {
                    if let Some(v) = old.get(field) {
                        map.insert(field.to_string(), v.clone());
                    }
                }
                map.insert("updated_at".to_string(), json!("2024-05-02T10:00:00Z"));
            }
            *existing = updated.clone();
            envelope(updated).into_response()
        }
        ("DELETE", [collection, id]) => {
            let removed = state
                .collections
                .get_mut(*collection)
                .and_then(|c| c.remove(*id))
                .is_some();
            if removed {
                Json(json!({ "status": "success" })).into_response()
            } else {
                not_found(&path).into_response()
            }
        }
        _ => not_found(&path).into_response(),
    }
}

pub fn selector(namespace: &str, name: &str, key: &str) -> SecretKeySelector {
    SecretKeySelector {
        name: name.to_string(),
        namespace: namespace.to_string(),
        key: key.to_string(),
    }
}

/// Seed the default provider config pointing at `endpoint`, with its
/// credentials secret.
pub async fn seed_provider_config(store: &MemoryStore, endpoint: &str) {
    seed_provider_config_with(store, endpoint, &json!({ "apiKey": API_KEY }).to_string()).await;
}

pub async fn seed_provider_config_with(store: &MemoryStore, endpoint: &str, credentials: &str) {
    store
        .apply(Secret::new("crossplane-system", "signoz-creds").with_entry("credentials", credentials))
        .await
        .unwrap();
    store
        .apply(ProviderConfig::new(
            PROVIDER_CONFIG,
            Some(endpoint),
            ProviderCredentials {
                secret_ref: Some(selector("crossplane-system", "signoz-creds", "credentials")),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
}

pub async fn get<T: signoz_provider::apis::Object>(store: &MemoryStore, key: &str) -> Option<T> {
    ResourceStore::<T>::get(store, key).await.unwrap()
}

/// Poll `check` until it holds or five seconds pass.
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
