//! In-process stand-in for a Chroma v2 server and Ollama's `/api/embed`,
//! served by axum on a background thread.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

const COLLECTIONS: &str = "/api/v2/tenants/{tenant}/databases/{database}/collections";

#[derive(Clone)]
struct Record {
    id: String,
    document: Value,
    metadata: Value,
    embedding: Vec<f32>,
}

#[derive(Clone, Default)]
pub struct MockState {
    collections: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    metadata: Arc<Mutex<HashMap<String, Value>>>,
    add_calls: Arc<Mutex<usize>>,
}

impl MockState {
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.lock().unwrap().contains_key(name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn ids(&self, name: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .collections
            .lock()
            .unwrap()
            .get(name)
            .map(|records| records.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Metadata sent when the collection was first created.
    pub fn collection_metadata(&self, name: &str) -> Option<Value> {
        self.metadata.lock().unwrap().get(name).cloned()
    }

    pub fn add_calls(&self) -> usize {
        *self.add_calls.lock().unwrap()
    }
}

pub struct MockServer {
    pub url: String,
    pub state: MockState,
}

/// Bind an ephemeral port and serve the mock until the test process exits.
pub fn start_mock() -> MockServer {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let state = MockState::default();

    let app = Router::new()
        .route(COLLECTIONS, post(create_collection))
        .route(
            &format!("{}/{{name}}", COLLECTIONS),
            get(get_collection).delete(delete_collection),
        )
        .route(&format!("{}/{{id}}/add", COLLECTIONS), post(add))
        .route(&format!("{}/{{id}}/query", COLLECTIONS), post(query))
        .route("/api/embed", post(embed))
        .with_state(state.clone());

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    MockServer { url, state }
}

fn collection_id(name: &str) -> String {
    format!("c-{}", name)
}

fn collection_name(id: &str) -> &str {
    id.strip_prefix("c-").unwrap_or(id)
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFoundError",
            "message": format!("Collection [{}] does not exist", name)
        })),
    )
        .into_response()
}

async fn create_collection(
    State(state): State<MockState>,
    Path(_): Path<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    state
        .metadata
        .lock()
        .unwrap()
        .entry(name.clone())
        .or_insert_with(|| body["metadata"].clone());
    state
        .collections
        .lock()
        .unwrap()
        .entry(name.clone())
        .or_default();
    Json(json!({ "id": collection_id(&name), "name": name })).into_response()
}

async fn get_collection(
    State(state): State<MockState>,
    Path(params): Path<HashMap<String, String>>,
) -> Response {
    let name = params.get("name").cloned().unwrap_or_default();
    if !state.has_collection(&name) {
        return not_found(&name);
    }
    Json(json!({ "id": collection_id(&name), "name": name })).into_response()
}

async fn delete_collection(
    State(state): State<MockState>,
    Path(params): Path<HashMap<String, String>>,
) -> Response {
    let name = params.get("name").cloned().unwrap_or_default();
    match state.collections.lock().unwrap().remove(&name) {
        Some(_) => Json(json!({})).into_response(),
        None => not_found(&name),
    }
}

async fn add(
    State(state): State<MockState>,
    Path(params): Path<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let id = params.get("id").cloned().unwrap_or_default();
    let name = collection_name(&id).to_string();
    *state.add_calls.lock().unwrap() += 1;

    let mut collections = state.collections.lock().unwrap();
    let Some(records) = collections.get_mut(&name) else {
        return not_found(&name);
    };

    let ids = body["ids"].as_array().cloned().unwrap_or_default();
    for (i, id) in ids.iter().enumerate() {
        let id = id.as_str().unwrap_or_default().to_string();
        let embedding: Vec<f32> = body["embeddings"][i]
            .as_array()
            .map(|v| v.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
            .unwrap_or_default();
        records.retain(|r| r.id != id);
        records.push(Record {
            id,
            document: body["documents"][i].clone(),
            metadata: body["metadatas"][i].clone(),
            embedding,
        });
    }
    (StatusCode::CREATED, Json(json!({}))).into_response()
}

async fn query(
    State(state): State<MockState>,
    Path(params): Path<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let id = params.get("id").cloned().unwrap_or_default();
    let name = collection_name(&id).to_string();
    let collections = state.collections.lock().unwrap();
    let Some(records) = collections.get(&name) else {
        return not_found(&name);
    };

    let n = body["n_results"].as_u64().unwrap_or(10) as usize;
    let query: Vec<f32> = body["query_embeddings"][0]
        .as_array()
        .map(|v| v.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
        .unwrap_or_default();

    let mut scored: Vec<(f32, &Record)> = records
        .iter()
        .map(|r| (distance(&query, &r.embedding), r))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    scored.truncate(n);

    Json(json!({
        "ids": [scored.iter().map(|(_, r)| r.id.clone()).collect::<Vec<_>>()],
        "documents": [scored.iter().map(|(_, r)| r.document.clone()).collect::<Vec<_>>()],
        "metadatas": [scored.iter().map(|(_, r)| r.metadata.clone()).collect::<Vec<_>>()],
        "distances": [scored.iter().map(|(d, _)| *d).collect::<Vec<_>>()],
        "embeddings": null
    }))
    .into_response()
}

/// Letter-frequency vector, normalized. Similar words land close together.
fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0f32; 26];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    v.iter().map(|x| x / norm).collect()
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 - dot
}

async fn embed(Json(body): Json<Value>) -> Json<Value> {
    let inputs: Vec<String> = match &body["input"] {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect(),
        _ => Vec::new(),
    };
    let embeddings: Vec<Vec<f32>> = inputs.iter().map(|t| embed_text(t)).collect();
    Json(json!({
        "model": body["model"],
        "embeddings": embeddings
    }))
}

pub fn cls_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cls");
    path
}

/// Write a config pointing both the store and the embedder at `url`.
pub fn write_config(dir: &FsPath, url: &str, extra: &str) -> PathBuf {
    let path = dir.join("cls.toml");
    let content = format!(
        r#"[store]
url = "{url}"
timeout_secs = 5

[embedding]
url = "{url}"
max_retries = 0
timeout_secs = 5

{extra}
"#
    );
    fs::write(&path, content).unwrap();
    path
}

pub fn run_cls(config_path: &FsPath, args: &[&str]) -> (String, String, bool) {
    let binary = cls_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cls binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}
