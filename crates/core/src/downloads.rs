//! Adding torrents to the remote client.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DownloadConfig, ReannounceScope};
use crate::error::OperationError;
use crate::metrics;
use crate::torrent_client::{AddTorrentRequest, HashSelector, TorrentClient};

/// A torrent accepted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedTorrent {
    /// What was submitted: the URL, the magnet link or the file name.
    pub source: String,
    /// Display name, when known before the client fetched metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Info hash, when it can be read off the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// How a user-supplied descriptor is handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorrentDescriptor<'a> {
    /// Magnet link or HTTP(S) URL, fetched by the client itself.
    Url(&'a str),
    /// Local .torrent file, uploaded by us.
    File(&'a Path),
}

impl<'a> TorrentDescriptor<'a> {
    pub fn parse(descriptor: &'a str) -> Self {
        let lower = descriptor.to_ascii_lowercase();
        if lower.starts_with("magnet:") || lower.starts_with("http://") || lower.starts_with("https://")
        {
            TorrentDescriptor::Url(descriptor)
        } else {
            TorrentDescriptor::File(Path::new(descriptor))
        }
    }
}

/// Add a torrent from a URL, magnet link or local .torrent path.
pub async fn add_torrent(
    client: &dyn TorrentClient,
    descriptor: &str,
    config: &DownloadConfig,
) -> Result<AddedTorrent, OperationError> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        return Err(OperationError::Validation(
            "torrent URL or path cannot be empty".to_string(),
        ));
    }

    match TorrentDescriptor::parse(descriptor) {
        TorrentDescriptor::Url(url) => add_url(client, url, None, config).await,
        TorrentDescriptor::File(path) => add_torrent_path(client, path, config).await,
    }
}

/// Add a torrent the client downloads from `url`.
pub async fn add_url(
    client: &dyn TorrentClient,
    url: &str,
    name: Option<String>,
    config: &DownloadConfig,
) -> Result<AddedTorrent, OperationError> {
    let request = AddTorrentRequest::url(url);
    submit(client, request, url.to_string(), name, config).await
}

/// Upload a .torrent file from disk.
pub async fn add_torrent_path(
    client: &dyn TorrentClient,
    path: &Path,
    config: &DownloadConfig,
) -> Result<AddedTorrent, OperationError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        OperationError::Validation(format!("cannot read torrent file {}: {}", path.display(), e))
    })?;
    if data.is_empty() {
        return Err(OperationError::Validation(format!(
            "torrent file {} is empty",
            path.display()
        )));
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let source = filename
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    let request = AddTorrentRequest::torrent_file(data, filename);

    submit(client, request, source, None, config).await
}

async fn submit(
    client: &dyn TorrentClient,
    request: AddTorrentRequest,
    source: String,
    name: Option<String>,
    config: &DownloadConfig,
) -> Result<AddedTorrent, OperationError> {
    let kind = request.source.kind();
    let request = request
        .with_save_path(config.save_path.clone())
        .with_category(config.category.clone())
        .with_content_layout(config.content_layout);

    let result = client.add_torrent(request).await.map_err(|e| {
        warn!(source = %source, error = %e, "Failed to add torrent");
        OperationError::AddFailed(e)
    })?;

    info!(source = %source, hash = ?result.hash, kind, "Torrent added");
    metrics::TORRENTS_ADDED.with_label_values(&[kind]).inc();

    reannounce(client, config.reannounce, result.hash.as_deref()).await;

    Ok(AddedTorrent {
        source,
        name,
        hash: result.hash,
    })
}

/// Ask trackers for peers right away. A failure here does not undo the add.
async fn reannounce(client: &dyn TorrentClient, scope: ReannounceScope, hash: Option<&str>) {
    let selector = match (scope, hash) {
        (ReannounceScope::None, _) => return,
        (ReannounceScope::All, _) => HashSelector::All,
        (ReannounceScope::Added, Some(hash)) => HashSelector::hashes([hash]),
        (ReannounceScope::Added, None) => {
            debug!("Hash of the added torrent is unknown, skipping reannounce");
            return;
        }
    };

    if let Err(e) = client.reannounce(&selector).await {
        warn!(hashes = %selector.as_param(), error = %e, "Reannounce failed");
    }
}
