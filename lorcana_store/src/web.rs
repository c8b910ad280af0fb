//! HTTP API for the card catalog, collections and data management
//!
//! Every JSON endpoint answers with the same envelope:
//! `{success, data?, error?, count?}`.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::catalog::{CardCatalog, CardFilters};
use crate::collections::{CollectionService, LineItemOutcome};
use crate::config::StoreConfig;
use crate::error::{ErrorCategory, StoreError};
use crate::ids::IdGenerator;
use crate::lifecycle::{DataLifecycle, DataStats, ImportResult, RestoreResult, EXPORT_FORMAT};
use crate::models::{
    now_timestamp, Card, CardSet, CatalogCard, CatalogStats, Collection, CollectionDraft,
    CollectionPatch, CollectionStats,
};
use crate::normalize::ImportKind;
use crate::store::Records;

/// Largest accepted import or restore upload
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state (the three services over one record store)
#[derive(Clone)]
pub struct AppState {
    catalog: CardCatalog,
    collections: CollectionService,
    lifecycle: DataLifecycle,
}

impl AppState {
    pub fn new(records: Records, ids: Arc<dyn IdGenerator>, config: StoreConfig) -> Self {
        Self {
            catalog: CardCatalog::new(records.clone(), ids.clone()),
            collections: CollectionService::new(records.clone(), ids.clone()),
            lifecycle: DataLifecycle::new(records, ids, config),
        }
    }
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            count: None,
        })
    }

    fn counted(data: T, count: usize) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            count: Some(count),
        })
    }
}

/// Error answer: status code plus the envelope's `error` message
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err.category() {
            ErrorCategory::IoFailure => {
                log::error!("Storage error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCategory::Validation
            | ErrorCategory::UnsupportedFormat
            | ErrorCategory::InvalidBackupFormat => {
                log::warn!("Rejected request: {}", err);
                StatusCode::BAD_REQUEST
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            count: None,
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Deserialize)]
struct SetParams {
    language: Option<String>,
}

#[derive(Deserialize)]
struct ExportParams {
    format: Option<String>,
}

/// Body of `POST /api/collections/{id}/cards`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCardRequest {
    card_id: Option<String>,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Deserialize)]
struct QuantityRequest {
    quantity: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupCreated {
    backup_path: String,
    timestamp: String,
}

/// GET /api/health
async fn health_handler() -> Json<Value> {
    Json(json!({"status": "OK", "timestamp": now_timestamp()}))
}

/// GET /api/cards?set&color&rarity&search&language
async fn list_cards_handler(
    State(state): State<AppState>,
    Query(filters): Query<CardFilters>,
) -> ApiResult<Vec<CatalogCard>> {
    let cards = state.catalog.list_cards(&filters);
    let count = cards.len();
    Ok(ApiResponse::counted(cards, count))
}

/// GET /api/cards/{id}
async fn get_card_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CatalogCard> {
    match state.catalog.get_card_by_id(&id) {
        Some(card) => Ok(ApiResponse::ok(card)),
        None => Err(ApiError::not_found("Card not found")),
    }
}

/// POST /api/cards
async fn create_card_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<Card>>), ApiError> {
    let card = state.catalog.add_card(&body)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(card)))
}

/// PUT /api/cards/{id}
async fn update_card_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Card> {
    match state.catalog.update_card(&id, &body)? {
        Some(card) => Ok(ApiResponse::ok(card)),
        None => Err(ApiError::not_found("Card not found")),
    }
}

/// DELETE /api/cards/{id}
async fn delete_card_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    if state.catalog.delete_card(&id)? {
        Ok(ApiResponse::ok(json!({"message": "Card deleted"})))
    } else {
        Err(ApiError::not_found("Card not found"))
    }
}

/// GET /api/cards/meta/sets?language
async fn list_sets_handler(
    State(state): State<AppState>,
    Query(params): Query<SetParams>,
) -> ApiResult<Vec<CardSet>> {
    let language = params.language.as_deref().filter(|l| !l.is_empty());
    Ok(ApiResponse::ok(state.catalog.list_sets(language)))
}

/// GET /api/cards/meta/stats
async fn catalog_stats_handler(State(state): State<AppState>) -> ApiResult<CatalogStats> {
    Ok(ApiResponse::ok(state.catalog.stats()))
}

/// GET /api/collections
async fn list_collections_handler(State(state): State<AppState>) -> ApiResult<Vec<Collection>> {
    let collections = state.collections.list()?;
    let count = collections.len();
    Ok(ApiResponse::counted(collections, count))
}

/// POST /api/collections
async fn create_collection_handler(
    State(state): State<AppState>,
    Json(draft): Json<CollectionDraft>,
) -> Result<(StatusCode, Json<ApiResponse<Collection>>), ApiError> {
    let collection = state.collections.create(draft)?;
    Ok((StatusCode::CREATED, ApiResponse::ok(collection)))
}

/// GET /api/collections/{id}
async fn get_collection_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Collection> {
    state
        .collections
        .get(&id)?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Collection not found"))
}

/// PUT /api/collections/{id}
async fn update_collection_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CollectionPatch>,
) -> ApiResult<Collection> {
    state
        .collections
        .update(&id, patch)?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Collection not found"))
}

/// DELETE /api/collections/{id}
async fn delete_collection_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    if state.collections.delete(&id)? {
        Ok(ApiResponse::ok(json!({"message": "Collection deleted"})))
    } else {
        Err(ApiError::not_found("Collection not found"))
    }
}

/// GET /api/collections/{id}/stats
async fn collection_stats_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CollectionStats> {
    state
        .collections
        .stats(&id)?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Collection not found"))
}

/// POST /api/collections/{id}/cards
async fn add_collection_card_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AddCardRequest>,
) -> ApiResult<Collection> {
    let card_id = request
        .card_id
        .filter(|card_id| !card_id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Card ID is required"))?;

    state
        .collections
        .add_card(&id, &card_id, request.quantity)?
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found("Collection not found"))
}

/// PUT /api/collections/{id}/cards/{card_id}
async fn set_collection_card_handler(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(String, String)>,
    Json(request): Json<QuantityRequest>,
) -> ApiResult<Collection> {
    line_item_response(state.collections.set_quantity(&id, &card_id, request.quantity)?)
}

/// DELETE /api/collections/{id}/cards/{card_id}
async fn remove_collection_card_handler(
    State(state): State<AppState>,
    Path((id, card_id)): Path<(String, String)>,
) -> ApiResult<Collection> {
    line_item_response(state.collections.remove_card(&id, &card_id)?)
}

fn line_item_response(outcome: LineItemOutcome) -> ApiResult<Collection> {
    match outcome {
        LineItemOutcome::Updated(collection) => Ok(ApiResponse::ok(collection)),
        LineItemOutcome::CollectionNotFound => Err(ApiError::not_found("Collection not found")),
        LineItemOutcome::CardNotInCollection => {
            Err(ApiError::not_found("Card not found in collection"))
        }
    }
}

/// Uploaded file: the `field` part of a multipart form, or the raw body
///
/// An empty result means the form had no such part.
async fn read_upload(request: Request, field: &str) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        return Bytes::from_request(request, &())
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()));
    }

    let mut form = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    while let Some(part) = form
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if part.name() == Some(field) {
            return part.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()));
        }
    }
    Ok(Bytes::new())
}

/// POST /api/data/import/{kind}
///
/// Takes the JSON document as a `<kind>File` form upload or as the raw body.
async fn import_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    request: Request,
) -> ApiResult<ImportResult> {
    let kind: ImportKind = kind
        .parse()
        .map_err(|other| ApiError::bad_request(format!("Unknown import type: {}", other)))?;
    let body = read_upload(request, &format!("{}File", kind)).await?;
    if body.is_empty() {
        return Err(ApiError::bad_request(format!("{} file is required", kind)));
    }

    let upload = state.lifecycle.spool_upload(&body)?;
    Ok(ApiResponse::ok(state.lifecycle.import_file(kind, &upload)?))
}

/// GET /api/data/export?format=json - downloads the export file
async fn export_handler(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format = params.format.as_deref().unwrap_or(EXPORT_FORMAT);
    let path = state.lifecycle.export(format)?;
    let body = std::fs::read(&path).map_err(|e| StoreError::io(&path, e))?;

    let date = now_timestamp();
    let disposition = format!(
        "attachment; filename=\"lorcana-data-{}.{}\"",
        date.split('T').next().unwrap_or(&date),
        format
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// GET /api/data/stats
async fn data_stats_handler(State(state): State<AppState>) -> ApiResult<DataStats> {
    Ok(ApiResponse::ok(state.lifecycle.data_stats()?))
}

/// POST /api/data/backup
async fn backup_handler(State(state): State<AppState>) -> ApiResult<BackupCreated> {
    let path = state.lifecycle.backup()?;
    Ok(ApiResponse::ok(BackupCreated {
        backup_path: path.display().to_string(),
        timestamp: now_timestamp(),
    }))
}

/// POST /api/data/restore with the backup as a `backupFile` form upload or the raw body
async fn restore_handler(State(state): State<AppState>, request: Request) -> ApiResult<RestoreResult> {
    let body = read_upload(request, "backupFile").await?;
    if body.is_empty() {
        return Err(ApiError::bad_request("Backup file is required"));
    }

    let upload = state.lifecycle.spool_upload(&body)?;
    match state.lifecycle.restore(&upload) {
        Ok(result) => Ok(ApiResponse::ok(result)),
        Err(e) => {
            // restore only consumes the file on success
            if let Err(cleanup) = std::fs::remove_file(&upload) {
                log::warn!("Failed to remove upload {}: {}", upload.display(), cleanup);
            }
            Err(e.into())
        }
    }
}

/// Build the web server router
///
/// With `public_dir`, unknown paths are served from that directory and fall
/// back to its `index.html`.
pub fn create_router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/cards", get(list_cards_handler).post(create_card_handler))
        .route("/api/cards/meta/sets", get(list_sets_handler))
        .route("/api/cards/meta/stats", get(catalog_stats_handler))
        .route(
            "/api/cards/{id}",
            get(get_card_handler)
                .put(update_card_handler)
                .delete(delete_card_handler),
        )
        .route(
            "/api/collections",
            get(list_collections_handler).post(create_collection_handler),
        )
        .route(
            "/api/collections/{id}",
            get(get_collection_handler)
                .put(update_collection_handler)
                .delete(delete_collection_handler),
        )
        .route("/api/collections/{id}/stats", get(collection_stats_handler))
        .route("/api/collections/{id}/cards", post(add_collection_card_handler))
        .route(
            "/api/collections/{id}/cards/{card_id}",
            put(set_collection_card_handler).delete(remove_collection_card_handler),
        )
        .route("/api/data/import/{kind}", post(import_handler))
        .route("/api/data/export", get(export_handler))
        .route("/api/data/stats", get(data_stats_handler))
        .route("/api/data/backup", post(backup_handler))
        .route("/api/data/restore", post(restore_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state);

    match public_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            api.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => api,
    }
}

/// Start the web server (async)
///
/// Binds to `bind:port`; use 0.0.0.0 to work with Docker port mapping.
pub async fn serve(
    state: AppState,
    public_dir: Option<PathBuf>,
    bind: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state, public_dir);
    let addr = format!("{}:{}", bind, port);

    log::info!("Lorcana API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    log::info!("Shutting down");
}
