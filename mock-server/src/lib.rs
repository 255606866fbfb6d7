//! In-memory search cluster speaking a subset of the 7.x REST API.
//!
//! Documents live in a `HashMap` of indices guarded by a `RwLock`. Errors use
//! the cluster's error document shape (`{"error": {...}, "status": N}`) so
//! clients can be exercised against realistic failure responses. Search
//! supports `match_all` and single-field `term`/`match` equality only.
//!
//! Typed document routes (`/{index}/{type}/{id}`) are accepted alongside the
//! 7.x `_doc` routes so 6.x-style clients can run against the same store; the
//! type segment is ignored. `GET /_slow?ms=N` answers after a delay.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

/// Version reported by `GET /`.
pub const VERSION: &str = "7.10.2";

/// Largest request body accepted, matching the cluster's `http.max_content_length`.
pub const MAX_CONTENT_LENGTH: usize = 100 * 1024 * 1024;

#[derive(Clone, Debug, Default)]
pub struct Index {
    pub docs: BTreeMap<String, Document>,
}

#[derive(Clone, Debug)]
pub struct Document {
    pub source: Value,
    pub version: u64,
}

pub type Db = Arc<RwLock<HashMap<String, Index>>>;

/// Query-string options understood by `_search`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

// Struct extractors pick parameters by name, so the same handler serves the
// `_doc` and typed routes.
#[derive(Debug, Deserialize)]
struct IndexPath {
    index: String,
}

#[derive(Debug, Deserialize)]
struct DocPath {
    index: String,
    id: String,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/", get(info))
        .route("/_cluster/health", get(health))
        .route("/_search", get(search_all).post(search_all))
        .route("/_count", get(count_all).post(count_all))
        .route("/_bulk", post(bulk_all).put(bulk_all))
        .route("/_msearch", get(msearch_all).post(msearch_all))
        .route("/_slow", get(slow))
        .route("/{index}", get(get_index).put(create_index).delete(delete_index))
        .route("/{index}/_search", get(search_index).post(search_index))
        .route("/{index}/_msearch", get(msearch_index).post(msearch_index))
        .route("/{index}/_count", get(count_index).post(count_index))
        .route("/{index}/_bulk", post(bulk_index).put(bulk_index))
        .route("/{index}/_refresh", get(refresh).post(refresh))
        .route("/{index}/_doc", post(index_auto_id))
        .route(
            "/{index}/_doc/{id}",
            get(get_doc).put(index_doc).post(index_doc).delete(delete_doc),
        )
        .route("/{index}/_create/{id}", put(create_doc).post(create_doc))
        .route("/{index}/_update/{id}", post(update_doc))
        // 6.x typed paths
        .route("/{index}/{type}", post(index_auto_id))
        .route("/{index}/{type}/_search", get(search_index).post(search_index))
        .route("/{index}/{type}/_count", get(count_index).post(count_index))
        .route("/{index}/{type}/_bulk", post(bulk_index).put(bulk_index))
        .route(
            "/{index}/{type}/{id}",
            get(get_doc).put(index_doc).post(index_doc).delete(delete_doc),
        )
        .route("/{index}/{type}/{id}/_update", post(update_doc))
        .layer(DefaultBodyLimit::max(MAX_CONTENT_LENGTH))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Error document in the cluster's wire shape.
pub fn error_response(status: StatusCode, kind: &str, reason: impl Into<String>) -> Response {
    (status, Json(error_body(status, kind, &reason.into()))).into_response()
}

fn error_body(status: StatusCode, kind: &str, reason: &str) -> Value {
    json!({
        "error": {
            "root_cause": [{"type": kind, "reason": reason}],
            "type": kind,
            "reason": reason,
        },
        "status": status.as_u16(),
    })
}

fn index_not_found_body(index: &str) -> Value {
    error_body(
        StatusCode::NOT_FOUND,
        "index_not_found_exception",
        &format!("no such index [{index}]"),
    )
}

fn index_not_found(index: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(index_not_found_body(index))).into_response()
}

fn parse_optional_body(body: &str) -> Result<Value, Response> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, "parse_exception", e.to_string()))
}

// --- cluster ---

async fn info() -> Json<Value> {
    Json(json!({
        "name": "mock-node",
        "cluster_name": "mock-cluster",
        "version": {"number": VERSION, "build_flavor": "oss"},
        "tagline": "You Know, for Search",
    }))
}

async fn slow(Query(params): Query<SlowParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(json!({"slept_ms": params.ms}))
}

async fn health(State(db): State<Db>) -> Json<Value> {
    let indices = db.read().await.len();
    Json(json!({
        "cluster_name": "mock-cluster",
        "status": "green",
        "number_of_nodes": 1,
        "active_primary_shards": indices,
    }))
}

// --- indices ---

async fn create_index(State(db): State<Db>, Path(index): Path<String>) -> Response {
    let mut indices = db.write().await;
    if indices.contains_key(&index) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "resource_already_exists_exception",
            format!("index [{index}] already exists"),
        );
    }
    indices.insert(index.clone(), Index::default());
    debug!(%index, "created index");
    Json(json!({"acknowledged": true, "shards_acknowledged": true, "index": index})).into_response()
}

async fn get_index(State(db): State<Db>, Path(index): Path<String>) -> Response {
    let indices = db.read().await;
    match indices.get(&index) {
        Some(_) => Json(json!({ index: {"aliases": {}, "mappings": {}, "settings": {}} })).into_response(),
        None => index_not_found(&index),
    }
}

async fn delete_index(State(db): State<Db>, Path(index): Path<String>) -> Response {
    match db.write().await.remove(&index) {
        Some(_) => {
            debug!(%index, "deleted index");
            Json(json!({"acknowledged": true})).into_response()
        }
        None => index_not_found(&index),
    }
}

async fn refresh(State(db): State<Db>, Path(index): Path<String>) -> Response {
    if !db.read().await.contains_key(&index) {
        return index_not_found(&index);
    }
    Json(json!({"_shards": {"total": 1, "successful": 1, "failed": 0}})).into_response()
}

// --- documents ---

fn write_result(index: &str, id: &str, version: u64, created: bool) -> Response {
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let body = json!({
        "_index": index,
        "_id": id,
        "_version": version,
        "result": if created { "created" } else { "updated" },
    });
    (status, Json(body)).into_response()
}

/// Insert or replace a document; returns `(version, created)`.
fn put_document(indices: &mut HashMap<String, Index>, index: &str, id: &str, source: Value) -> (u64, bool) {
    let docs = &mut indices.entry(index.to_string()).or_default().docs;
    let version = docs.get(id).map_or(1, |doc| doc.version + 1);
    docs.insert(id.to_string(), Document { source, version });
    (version, version == 1)
}

async fn index_doc(
    State(db): State<Db>,
    Path(DocPath { index, id }): Path<DocPath>,
    Json(source): Json<Value>,
) -> Response {
    let (version, created) = put_document(&mut *db.write().await, &index, &id, source);
    write_result(&index, &id, version, created)
}

async fn index_auto_id(
    State(db): State<Db>,
    Path(IndexPath { index }): Path<IndexPath>,
    Json(source): Json<Value>,
) -> Response {
    let id = Uuid::new_v4().simple().to_string();
    let (version, created) = put_document(&mut *db.write().await, &index, &id, source);
    write_result(&index, &id, version, created)
}

async fn create_doc(
    State(db): State<Db>,
    Path(DocPath { index, id }): Path<DocPath>,
    Json(source): Json<Value>,
) -> Response {
    let mut indices = db.write().await;
    if indices.get(&index).is_some_and(|i| i.docs.contains_key(&id)) {
        return error_response(
            StatusCode::CONFLICT,
            "version_conflict_engine_exception",
            format!("[{id}]: version conflict, document already exists"),
        );
    }
    let (version, created) = put_document(&mut indices, &index, &id, source);
    write_result(&index, &id, version, created)
}

async fn update_doc(
    State(db): State<Db>,
    Path(DocPath { index, id }): Path<DocPath>,
    Json(update): Json<Value>,
) -> Response {
    let mut indices = db.write().await;
    let Some(doc) = indices.get_mut(&index).and_then(|i| i.docs.get_mut(&id)) else {
        return error_response(
            StatusCode::NOT_FOUND,
            "document_missing_exception",
            format!("[{id}]: document missing"),
        );
    };
    if let (Some(target), Some(Value::Object(patch))) = (doc.source.as_object_mut(), update.get("doc")) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
    doc.version += 1;
    write_result(&index, &id, doc.version, false)
}

async fn get_doc(State(db): State<Db>, Path(DocPath { index, id }): Path<DocPath>) -> Response {
    let indices = db.read().await;
    let Some(idx) = indices.get(&index) else {
        return index_not_found(&index);
    };
    match idx.docs.get(&id) {
        Some(doc) => Json(json!({
            "_index": index,
            "_id": id,
            "_version": doc.version,
            "found": true,
            "_source": doc.source,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"_index": index, "_id": id, "found": false})),
        )
            .into_response(),
    }
}

async fn delete_doc(State(db): State<Db>, Path(DocPath { index, id }): Path<DocPath>) -> Response {
    let mut indices = db.write().await;
    let Some(idx) = indices.get_mut(&index) else {
        return index_not_found(&index);
    };
    let (status, result) = match idx.docs.remove(&id) {
        Some(_) => (StatusCode::OK, "deleted"),
        None => (StatusCode::NOT_FOUND, "not_found"),
    };
    (status, Json(json!({"_index": index, "_id": id, "result": result}))).into_response()
}

// --- bulk ---

async fn bulk_all(State(db): State<Db>, body: String) -> Response {
    bulk(db, None, &body).await
}

async fn bulk_index(
    State(db): State<Db>,
    Path(IndexPath { index }): Path<IndexPath>,
    body: String,
) -> Response {
    bulk(db, Some(index), &body).await
}

async fn bulk(db: Db, default_index: Option<String>, body: &str) -> Response {
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());
    let mut items = Vec::new();
    let mut indices = db.write().await;

    while let Some(line) = lines.next() {
        let action: Map<String, Value> = match serde_json::from_str(line) {
            Ok(action) => action,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "parse_exception", e.to_string()),
        };
        let Some((op, meta)) = action.into_iter().next() else {
            return error_response(StatusCode::BAD_REQUEST, "action_request_validation_exception", "empty action");
        };
        let index = meta
            .get("_index")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| default_index.clone());
        let Some(index) = index else {
            return error_response(StatusCode::BAD_REQUEST, "action_request_validation_exception", "index is missing");
        };
        let id = meta
            .get("_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let item = match op.as_str() {
            "index" | "create" => {
                let source = match lines.next().map(serde_json::from_str::<Value>) {
                    Some(Ok(source)) => source,
                    _ => {
                        return error_response(StatusCode::BAD_REQUEST, "parse_exception", "missing document source")
                    }
                };
                let (version, created) = put_document(&mut indices, &index, &id, source);
                json!({"_index": index, "_id": id, "_version": version,
                       "result": if created { "created" } else { "updated" },
                       "status": if created { 201 } else { 200 }})
            }
            "delete" => {
                let removed = indices.get_mut(&index).and_then(|i| i.docs.remove(&id)).is_some();
                json!({"_index": index, "_id": id,
                       "result": if removed { "deleted" } else { "not_found" },
                       "status": if removed { 200 } else { 404 }})
            }
            other => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "illegal_argument_exception",
                    format!("unsupported bulk action [{other}]"),
                )
            }
        };
        items.push(json!({ op: item }));
    }

    Json(json!({"took": 1, "errors": false, "items": items})).into_response()
}

// --- search ---

fn matches(query: Option<&Value>, source: &Value) -> bool {
    let Some(query) = query else {
        return true;
    };
    if query.get("match_all").is_some() {
        return true;
    }
    let clause = query.get("term").or_else(|| query.get("match"));
    let Some((field, expected)) = clause.and_then(Value::as_object).and_then(|c| c.iter().next()) else {
        return false;
    };
    let expected = expected.get("query").or_else(|| expected.get("value")).unwrap_or(expected);
    source.get(field) == Some(expected)
}

fn hits(indices: &HashMap<String, Index>, names: &[String], request: &Value) -> Vec<Value> {
    let query = request.get("query");
    names
        .iter()
        .filter_map(|name| indices.get(name).map(|idx| (name, idx)))
        .flat_map(|(name, idx)| {
            idx.docs
                .iter()
                .filter(move |(_, doc)| matches(query, &doc.source))
                .map(move |(id, doc)| json!({"_index": name, "_id": id, "_score": 1.0, "_source": doc.source}))
        })
        .collect()
}

/// Resolve a comma-separated index list; `Err` carries the first missing name.
fn target_indices(indices: &HashMap<String, Index>, index: Option<String>) -> Result<Vec<String>, String> {
    match index {
        Some(index) => {
            let names: Vec<String> = index.split(',').map(str::to_string).collect();
            match names.iter().find(|n| !indices.contains_key(*n)) {
                Some(missing) => Err(missing.clone()),
                None => Ok(names),
            }
        }
        None => {
            let mut names: Vec<String> = indices.keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }
}

async fn search(db: Db, index: Option<String>, params: SearchParams, body: &str) -> Response {
    let request = match parse_optional_body(body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    let indices = db.read().await;
    let names = match target_indices(&indices, index) {
        Ok(names) => names,
        Err(missing) => return index_not_found(&missing),
    };
    Json(search_page(&indices, &names, &request, params.size)).into_response()
}

fn search_page(indices: &HashMap<String, Index>, names: &[String], request: &Value, size: Option<usize>) -> Value {
    let found = hits(indices, names, request);
    let total = found.len();
    let size = size
        .or_else(|| request.get("size").and_then(Value::as_u64).map(|s| s as usize))
        .unwrap_or(10);
    let page: Vec<Value> = found.into_iter().take(size).collect();

    json!({
        "took": 1,
        "timed_out": false,
        "hits": {"total": {"value": total, "relation": "eq"}, "max_score": 1.0, "hits": page},
    })
}

/// Header/body line pairs; a missing index fails only its own entry.
async fn msearch(db: Db, default_index: Option<String>, body: &str) -> Response {
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());
    let indices = db.read().await;
    let mut responses = Vec::new();

    while let Some(line) = lines.next() {
        let header: Value = match serde_json::from_str(line) {
            Ok(header) => header,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, "parse_exception", e.to_string()),
        };
        let request = match lines.next().map(serde_json::from_str::<Value>) {
            Some(Ok(request)) => request,
            _ => return error_response(StatusCode::BAD_REQUEST, "parse_exception", "missing search body"),
        };
        let index = header
            .get("index")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| default_index.clone());
        let entry = match target_indices(&indices, index) {
            Ok(names) => {
                let mut page = search_page(&indices, &names, &request, None);
                page["status"] = json!(200);
                page
            }
            Err(missing) => index_not_found_body(&missing),
        };
        responses.push(entry);
    }

    Json(json!({"took": 1, "responses": responses})).into_response()
}

async fn count(db: Db, index: Option<String>, body: &str) -> Response {
    let request = match parse_optional_body(body) {
        Ok(request) => request,
        Err(resp) => return resp,
    };
    let indices = db.read().await;
    let names = match target_indices(&indices, index) {
        Ok(names) => names,
        Err(missing) => return index_not_found(&missing),
    };
    Json(json!({"count": hits(&indices, &names, &request).len()})).into_response()
}

async fn search_all(State(db): State<Db>, Query(params): Query<SearchParams>, body: String) -> Response {
    search(db, None, params, &body).await
}

async fn search_index(
    State(db): State<Db>,
    Path(IndexPath { index }): Path<IndexPath>,
    Query(params): Query<SearchParams>,
    body: String,
) -> Response {
    search(db, Some(index), params, &body).await
}

async fn count_all(State(db): State<Db>, body: String) -> Response {
    count(db, None, &body).await
}

async fn count_index(
    State(db): State<Db>,
    Path(IndexPath { index }): Path<IndexPath>,
    body: String,
) -> Response {
    count(db, Some(index), &body).await
}

async fn msearch_all(State(db): State<Db>, body: String) -> Response {
    msearch(db, None, &body).await
}

async fn msearch_index(
    State(db): State<Db>,
    Path(IndexPath { index }): Path<IndexPath>,
    body: String,
) -> Response {
    msearch(db, Some(index), &body).await
}
