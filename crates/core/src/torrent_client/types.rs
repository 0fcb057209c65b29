//! Types for torrent client operations.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ContentLayout, PluginSelector};

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("Rejected by client: {0}")]
    Rejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Downloading from peers.
    Downloading,
    /// Download complete, seeding to peers.
    Seeding,
    /// Stopped (paused) by the user or a rule.
    Stopped,
    /// Checking file integrity.
    Checking,
    /// Queued for download.
    Queued,
    /// Stalled (no peers).
    Stalled,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Stopped => "stopped",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a torrent as reported by the client.
///
/// Snapshots are never cached: every operation fetches a fresh list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// When the torrent was added (epoch seconds).
    pub added_on: i64,
    /// When the torrent finished downloading (epoch seconds, 0 = never).
    pub completion_on: i64,
    /// Save path on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    /// Category/label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TorrentInfo {
    /// Completion time, or `None` if the torrent never completed.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        timestamp_to_datetime(self.completion_on)
    }
}

/// Convert Unix timestamp to DateTime<Utc>; non-positive values mean "unset".
pub fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

/// Target of a bulk torrent command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashSelector {
    /// Every torrent known to the client.
    All,
    /// Exactly these torrents. An empty list selects nothing.
    Hashes(Vec<String>),
}

impl HashSelector {
    /// Select the given hashes (normalized to lowercase).
    pub fn hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        HashSelector::Hashes(
            hashes
                .into_iter()
                .map(|h| h.as_ref().to_lowercase())
                .collect(),
        )
    }

    /// True if the selector matches no torrent at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, HashSelector::Hashes(h) if h.is_empty())
    }

    /// Value for the WebUI `hashes` form field.
    pub fn as_param(&self) -> String {
        match self {
            HashSelector::All => "all".to_string(),
            HashSelector::Hashes(hashes) => hashes.join("|"),
        }
    }
}

/// Where the torrent to add comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Magnet URI or HTTP(S) link the client fetches itself.
    Url(String),
    /// Raw .torrent file bytes.
    File {
        data: Vec<u8>,
        /// Original filename (for logging).
        filename: Option<String>,
    },
}

impl TorrentSource {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TorrentSource::Url(url) if url.starts_with("magnet:") => "magnet",
            TorrentSource::Url(_) => "url",
            TorrentSource::File { .. } => "file",
        }
    }
}

/// Request to add a new torrent.
#[derive(Debug, Clone)]
pub struct AddTorrentRequest {
    pub source: TorrentSource,
    /// Optional save path override.
    pub save_path: Option<String>,
    /// Optional category/label.
    pub category: Option<String>,
    pub content_layout: ContentLayout,
}

impl AddTorrentRequest {
    /// Create a URL/magnet request with default options.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(TorrentSource::Url(url.into()))
    }

    /// Create a torrent file request with default options.
    pub fn torrent_file(data: Vec<u8>, filename: Option<String>) -> Self {
        Self::new(TorrentSource::File { data, filename })
    }

    fn new(source: TorrentSource) -> Self {
        Self {
            source,
            save_path: None,
            category: None,
            content_layout: ContentLayout::Original,
        }
    }

    /// Set the save path.
    pub fn with_save_path(mut self, path: Option<String>) -> Self {
        self.save_path = path;
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Set the content layout.
    pub fn with_content_layout(mut self, layout: ContentLayout) -> Self {
        self.content_layout = layout;
        self
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent, when it can be derived from the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Identifier the client assigns to a search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchJobId(pub i64);

impl fmt::Display for SearchJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of a search job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text pattern, sent as-is.
    pub pattern: String,
    pub plugins: PluginSelector,
    pub category: String,
}

impl SearchQuery {
    /// Search every enabled plugin in every category.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            plugins: PluginSelector::Enabled,
            category: "all".to_string(),
        }
    }

    pub fn with_plugins(mut self, plugins: PluginSelector) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Append a quality token (e.g. "*1080p*") to the pattern.
    pub fn with_suffix(mut self, suffix: Option<&str>) -> Self {
        if let Some(suffix) = suffix.map(str::trim).filter(|s| !s.is_empty()) {
            self.pattern = format!("{}{}", self.pattern, suffix);
        }
        self
    }
}

/// Whether a search job is still collecting results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Running,
    Completed,
}

/// Status of a search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchJobStatus {
    pub id: SearchJobId,
    pub state: SearchState,
    /// Results accumulated so far.
    pub total: u64,
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultRecord {
    /// Display name of the torrent.
    pub name: String,
    /// Magnet link or .torrent URL to hand to `add_torrent`.
    pub download_url: String,
    /// Size in bytes (None when the plugin does not report it).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    /// Site the plugin searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    /// Details page of the hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_url: Option<String>,
}

/// Category a search plugin supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCategory {
    pub id: String,
    pub name: String,
}

/// An installed search plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlugin {
    pub name: String,
    pub full_name: String,
    pub enabled: bool,
    pub version: String,
    pub url: String,
    pub categories: Vec<PluginCategory>,
}

/// Client version and library build information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub app_version: String,
    pub web_api_version: String,
    /// Library versions (qt, libtorrent, boost, openssl, ...).
    pub details: BTreeMap<String, String>,
}

/// Connection handle to a remote torrent client.
///
/// One handle is created per process and passed explicitly to every
/// operation. Implementations must tolerate sequential reuse; concurrent use
/// is allowed only if the implementation says so.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Client and Web API versions.
    async fn build_info(&self) -> Result<BuildInfo, TorrentClientError>;

    /// Every torrent known to the client.
    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// RSS auto-download rules, keyed by rule name.
    async fn rss_rules(&self) -> Result<serde_json::Value, TorrentClientError>;

    /// Installed search plugins.
    async fn search_plugins(&self) -> Result<Vec<SearchPlugin>, TorrentClientError>;

    /// Submit a search job.
    async fn start_search(&self, query: &SearchQuery) -> Result<SearchJobId, TorrentClientError>;

    /// Current status of a search job.
    async fn search_status(&self, id: SearchJobId) -> Result<SearchJobStatus, TorrentClientError>;

    /// Results accumulated by a search job, in the order the client reports them.
    async fn search_results(
        &self,
        id: SearchJobId,
    ) -> Result<Vec<SearchResultRecord>, TorrentClientError>;

    /// Stop a running search job.
    async fn stop_search(&self, id: SearchJobId) -> Result<(), TorrentClientError>;

    /// Forget a search job and its results.
    async fn delete_search(&self, id: SearchJobId) -> Result<(), TorrentClientError>;

    /// Add a new torrent.
    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError>;

    /// Stop torrents.
    async fn stop_torrents(&self, selector: &HashSelector) -> Result<(), TorrentClientError>;

    /// Remove torrents.
    /// If `delete_files` is true, also delete downloaded files.
    async fn delete_torrents(
        &self,
        selector: &HashSelector,
        delete_files: bool,
    ) -> Result<(), TorrentClientError>;

    /// Re-announce torrents to their trackers.
    async fn reannounce(&self, selector: &HashSelector) -> Result<(), TorrentClientError>;
}

/// Extract info hash from a magnet URI.
pub fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.strip_prefix("magnet:")?.split_once('?')?;
    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .filter(|hash| !hash.is_empty())
        .map(|hash| hash.to_lowercase())
}
