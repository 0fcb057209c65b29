use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use grabbit_core::downloads::TorrentDescriptor;
use grabbit_core::{
    AddedTorrent, BuildInfo, ErrorKind, GrabOutcome, OperationError, PurgeOptions, PurgeReport,
    SanitizedConfig, SearchPlugin, SearchResultRecord,
};

use crate::metrics::encode_metrics;
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub qbittorrent: BuildInfo,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub pattern: String,
    pub count: usize,
    pub results: Vec<SearchResultRecord>,
}

#[derive(Debug, Serialize)]
pub struct GrabResponse {
    pub message: String,
    pub grabbed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit: Option<SearchResultRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent: Option<AddedTorrent>,
}

#[derive(Debug, Serialize)]
pub struct PluginsResponse {
    pub plugins: Vec<SearchPlugin>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurgeParams {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub keep_files: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddTorrentParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTorrentUrlRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AddTorrentResponse {
    pub message: String,
    pub torrent: AddedTorrent,
}

/// Body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub kind: ErrorKind,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Log the failure and collapse it to a 500 that still names its kind.
fn failure(operation: &str, err: OperationError) -> ApiError {
    let kind = err.kind();
    error!(operation, kind = %kind, error = %err, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: format!("{} failed", operation),
            kind,
        }),
    )
}

/// Extractor rejections are reported like any other validation failure.
fn invalid_request(operation: &str, detail: String) -> ApiError {
    failure(operation, OperationError::Validation(detail))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /version
///
/// Front-end version plus the build info reported by qBittorrent.
pub async fn version(
    State(state): State<Arc<AppState>>,
) -> Result<Json<VersionResponse>, ApiError> {
    let qbittorrent = state
        .service()
        .build_info()
        .await
        .map_err(|e| failure("Version", e))?;

    Ok(Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        qbittorrent,
    }))
}

/// GET /metrics
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

/// GET /search/{term}
///
/// Runs a search job and waits for it to finish. Shutdown cancels the wait.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(term): Path<String>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = state
        .service()
        .query(&term)
        .map_err(|e| failure("Search", e))?;

    let results = state
        .service()
        .search_with(&query, state.shutdown_token())
        .await
        .map_err(|e| failure("Search", e))?;

    Ok(Json(SearchResponse {
        pattern: query.pattern,
        count: results.len(),
        results,
    }))
}

/// POST /grab/{term}
///
/// Searches and adds the first hit. An empty search is not a failure.
pub async fn grab(
    State(state): State<Arc<AppState>>,
    Path(term): Path<String>,
) -> Result<Json<GrabResponse>, ApiError> {
    let outcome = state
        .service()
        .grab(&term, state.shutdown_token())
        .await
        .map_err(|e| failure("Grab", e))?;

    let response = match outcome {
        GrabOutcome::Added { hit, torrent } => GrabResponse {
            message: format!("Added {}", hit.name),
            grabbed: true,
            hit: Some(hit),
            torrent: Some(torrent),
        },
        GrabOutcome::NoResults { .. } => GrabResponse {
            message: "No results found to grab".to_string(),
            grabbed: false,
            hit: None,
            torrent: None,
        },
    };

    Ok(Json(response))
}

/// GET /plugins
pub async fn plugins(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PluginsResponse>, ApiError> {
    let plugins = state
        .service()
        .plugins()
        .await
        .map_err(|e| failure("Listing plugins", e))?;

    Ok(Json(PluginsResponse {
        count: plugins.len(),
        plugins,
    }))
}

/// DELETE /purge/{days}
///
/// Removes torrents completed more than `days` ago. `?dry_run=true` only
/// reports the selection, `?keep_files=true` leaves the data on disk.
pub async fn purge(
    State(state): State<Arc<AppState>>,
    Path(days): Path<String>,
    params: Result<Query<PurgeParams>, QueryRejection>,
) -> Result<Json<PurgeReport>, ApiError> {
    let Query(params) = params.map_err(|e| invalid_request("Purge", e.body_text()))?;
    let retention_days = days.trim().parse::<u32>().map_err(|_| {
        failure(
            "Purge",
            OperationError::Validation(format!(
                "retention days must be a whole number of 0 or more, got '{}'",
                days
            )),
        )
    })?;

    let options = PurgeOptions::new(retention_days)
        .with_dry_run(params.dry_run)
        .with_delete_files(!params.keep_files);

    let report = state
        .service()
        .purge(&options)
        .await
        .map_err(|e| failure("Purge", e))?;

    Ok(Json(report))
}

/// POST /add_torrent?url=...
pub async fn add_torrent(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AddTorrentParams>, QueryRejection>,
) -> Result<Json<AddTorrentResponse>, ApiError> {
    let Query(params) = params.map_err(|e| invalid_request("Adding torrent", e.body_text()))?;
    add_descriptor(&state, &params.url).await
}

/// POST /add_torrent_url
pub async fn add_torrent_url(
    State(state): State<Arc<AppState>>,
    request: Result<Json<AddTorrentUrlRequest>, JsonRejection>,
) -> Result<Json<AddTorrentResponse>, ApiError> {
    let Json(request) =
        request.map_err(|e| invalid_request("Adding torrent", e.body_text()))?;
    add_descriptor(&state, &request.url).await
}

/// Only magnet links and http(s) URLs are accepted over HTTP, never server-side paths.
async fn add_descriptor(state: &AppState, url: &str) -> Result<Json<AddTorrentResponse>, ApiError> {
    let url = url.trim();
    if !matches!(TorrentDescriptor::parse(url), TorrentDescriptor::Url(_)) {
        return Err(failure(
            "Adding torrent",
            OperationError::Validation(format!("not a magnet link or http(s) URL: {}", url)),
        ));
    }

    let torrent = state
        .service()
        .add_torrent(url)
        .await
        .map_err(|e| failure("Adding torrent", e))?;

    Ok(Json(AddTorrentResponse {
        message: "Torrent added".to_string(),
        torrent,
    }))
}

/// POST /add_torrent_file
///
/// Multipart upload with the .torrent in field `file`. The upload is staged
/// in a temporary directory that is removed once the client has it.
pub async fn add_torrent_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AddTorrentResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|e| invalid_request("Adding torrent file", e.body_text()))?;
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(invalid_request(
                    "Adding torrent file",
                    format!("malformed multipart body: {}", e.body_text()),
                ))
            }
        };
        if field.name() != Some("file") {
            continue;
        }
        let filename = upload_filename(field.file_name());
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes.to_vec())),
            Err(e) => {
                return Err(failure(
                    "Adding torrent file",
                    OperationError::Validation(format!("failed to read upload: {}", e)),
                ))
            }
        }
    }

    let Some((filename, data)) = upload else {
        return Err(failure(
            "Adding torrent file",
            OperationError::Validation("missing multipart field 'file'".to_string()),
        ));
    };

    let staging = tempfile::Builder::new()
        .prefix("grabbit-upload-")
        .tempdir_in(state.upload_dir())
        .map_err(|e| {
            failure(
                "Adding torrent file",
                OperationError::Validation(format!("cannot stage upload: {}", e)),
            )
        })?;
    let path = staging.path().join(&filename);
    tokio::fs::write(&path, &data).await.map_err(|e| {
        failure(
            "Adding torrent file",
            OperationError::Validation(format!("cannot stage upload: {}", e)),
        )
    })?;
    info!(file = %filename, bytes = data.len(), "Staged torrent upload");

    let result = state.service().add_torrent_path(&path).await;

    if let Err(e) = staging.close() {
        warn!(error = %e, "Failed to remove staged upload");
    }

    let torrent = result.map_err(|e| failure("Adding torrent file", e))?;
    Ok(Json(AddTorrentResponse {
        message: "Torrent added".to_string(),
        torrent,
    }))
}

/// File name of an upload, stripped of any directory part.
fn upload_filename(name: Option<&str>) -> String {
    name.and_then(|name| FsPath::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "upload.torrent".to_string())
}
