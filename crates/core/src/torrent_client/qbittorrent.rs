//! qBittorrent WebUI (API v2) client implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, BuildInfo, HashSelector,
    PluginCategory, SearchJobId, SearchJobStatus, SearchPlugin, SearchQuery, SearchResultRecord,
    SearchState, TorrentClient, TorrentClientError, TorrentInfo, TorrentSource,
    TorrentState,
};

/// qBittorrent client implementation.
///
/// Safe to share between tasks: the session flag is behind a lock and the
/// cookie jar is owned by the inner `reqwest::Client`.
pub struct QBittorrentClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    /// Session marker (cleared when the WebUI answers 403).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client. No request is sent until first use.
    pub fn new(config: &QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            session: Arc::new(RwLock::new(None)),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .header(reqwest::header::REFERER, &self.base_url)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::FORBIDDEN {
            return Err(TorrentClientError::AuthenticationFailed(
                "Too many failed login attempts, client IP is banned".to_string(),
            ));
        }

        match body.trim() {
            "Ok." => {
                debug!(url = %self.base_url, "qBittorrent login successful");
                // Session cookie is stored by the cookie jar
                let mut session = self.session.write().await;
                *session = Some("authenticated".to_string());
                Ok(())
            }
            "Fails." => Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            )),
            other => Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response (HTTP {}): {}",
                status,
                other.chars().take(100).collect::<String>()
            ))),
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Send an authenticated request, logging in again once if the session
    /// expired. `build` is called once per attempt.
    async fn send<F>(&self, endpoint: &str, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn(String) -> Result<RequestBuilder, TorrentClientError>,
    {
        self.ensure_authenticated().await?;

        let response = build(self.url(endpoint))?
            .send()
            .await
            .map_err(transport_error)?;

        let response = if response.status() == StatusCode::FORBIDDEN {
            warn!(endpoint, "qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            build(self.url(endpoint))?
                .send()
                .await
                .map_err(transport_error)?
        } else {
            response
        };

        read_body(endpoint, response).await
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        self.send(endpoint, |url| Ok(self.client.get(url))).await
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.send(endpoint, |url| Ok(self.client.post(url).form(params)))
            .await
    }

    /// Make an authenticated POST request with multipart data.
    async fn post_multipart<F>(
        &self,
        endpoint: &str,
        form: F,
    ) -> Result<String, TorrentClientError>
    where
        F: Fn() -> Result<multipart::Form, TorrentClientError>,
    {
        self.send(endpoint, |url| Ok(self.client.post(url).multipart(form()?)))
            .await
    }

    fn add_torrent_form(
        &self,
        request: &AddTorrentRequest,
    ) -> Result<multipart::Form, TorrentClientError> {
        let mut form = match &request.source {
            TorrentSource::Url(url) => multipart::Form::new().text("urls", url.clone()),
            TorrentSource::File { data, filename } => {
                let file_part = multipart::Part::bytes(data.clone())
                    .file_name(
                        filename
                            .clone()
                            .unwrap_or_else(|| "upload.torrent".to_string()),
                    )
                    .mime_str("application/x-bittorrent")
                    .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
                multipart::Form::new().part("torrents", file_part)
            }
        };

        if let Some(path) = &request.save_path {
            form = form.text("savepath", path.clone());
        }
        if let Some(cat) = &request.category {
            form = form.text("category", cat.clone());
        }
        form = form.text("contentLayout", request.content_layout.as_param());

        Ok(form)
    }
}

fn transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// Map the WebUI status codes to client errors and return the body.
async fn read_body(endpoint: &str, response: Response) -> Result<String, TorrentClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let detail = if body.trim().is_empty() {
        format!("{} (HTTP {})", endpoint, status)
    } else {
        format!("{} (HTTP {}): {}", endpoint, status, body.trim())
    };

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TorrentClientError::AuthenticationFailed(detail)
        }
        StatusCode::NOT_FOUND => TorrentClientError::NotFound(detail),
        StatusCode::CONFLICT => TorrentClientError::Rejected(detail),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => TorrentClientError::InvalidTorrent(detail),
        _ => TorrentClientError::ApiError(detail),
    })
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, TorrentClientError> {
    serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            added_on: self.added_on,
            completion_on: self.completion_on,
            save_path: if self.save_path.is_empty() {
                None
            } else {
                Some(self.save_path)
            },
            category: if self.category.is_empty() {
                None
            } else {
                Some(self.category)
            },
        }
    }
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" | "allocating" => {
            TorrentState::Downloading
        }
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Stopped,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct QBSearchStart {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct QBSearchStatus {
    id: i64,
    status: String,
    #[serde(default)]
    total: i64,
}

impl QBSearchStatus {
    fn into_status(self) -> SearchJobStatus {
        SearchJobStatus {
            id: SearchJobId(self.id),
            // Anything but "Running" means the job will not produce more results
            state: if self.status == "Running" {
                SearchState::Running
            } else {
                SearchState::Completed
            },
            total: self.total.max(0) as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QBSearchResults {
    #[serde(default)]
    results: Vec<QBSearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QBSearchResult {
    file_name: String,
    file_url: String,
    #[serde(default = "unknown")]
    file_size: i64,
    #[serde(default = "unknown")]
    nb_seeders: i64,
    #[serde(default = "unknown")]
    nb_leechers: i64,
    #[serde(default)]
    site_url: String,
    #[serde(default)]
    descr_link: String,
}

fn unknown() -> i64 {
    -1
}

fn known_count(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl QBSearchResult {
    fn into_record(self) -> SearchResultRecord {
        SearchResultRecord {
            name: self.file_name,
            download_url: self.file_url,
            size_bytes: u64::try_from(self.file_size).ok(),
            seeders: known_count(self.nb_seeders),
            leechers: known_count(self.nb_leechers),
            site_url: non_empty(self.site_url),
            description_url: non_empty(self.descr_link),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QBSearchPlugin {
    name: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    version: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    supported_categories: Vec<QBPluginCategory>,
}

/// Older WebUI versions list categories as plain names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QBPluginCategory {
    Named { id: String, name: String },
    Plain(String),
}

impl QBSearchPlugin {
    fn into_plugin(self) -> SearchPlugin {
        SearchPlugin {
            name: self.name,
            full_name: self.full_name,
            enabled: self.enabled,
            version: self.version,
            url: self.url,
            categories: self
                .supported_categories
                .into_iter()
                .map(|c| match c {
                    QBPluginCategory::Named { id, name } => PluginCategory { id, name },
                    QBPluginCategory::Plain(name) => PluginCategory {
                        id: name.clone(),
                        name,
                    },
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    async fn build_info(&self) -> Result<BuildInfo, TorrentClientError> {
        let app_version = self.get("/api/v2/app/version").await?;
        let web_api_version = self.get("/api/v2/app/webapiVersion").await?;
        let raw: serde_json::Map<String, serde_json::Value> =
            parse_json(&self.get("/api/v2/app/buildInfo").await?)?;

        let details: BTreeMap<String, String> = raw
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();

        Ok(BuildInfo {
            app_version: app_version.trim().to_string(),
            web_api_version: web_api_version.trim().to_string(),
            details,
        })
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let torrents: Vec<QBTorrentInfo> = parse_json(&self.get("/api/v2/torrents/info").await?)?;
        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }

    async fn rss_rules(&self) -> Result<serde_json::Value, TorrentClientError> {
        parse_json(&self.get("/api/v2/rss/rules").await?)
    }

    async fn search_plugins(&self) -> Result<Vec<SearchPlugin>, TorrentClientError> {
        let plugins: Vec<QBSearchPlugin> = parse_json(&self.get("/api/v2/search/plugins").await?)?;
        Ok(plugins.into_iter().map(|p| p.into_plugin()).collect())
    }

    async fn start_search(&self, query: &SearchQuery) -> Result<SearchJobId, TorrentClientError> {
        let plugins = query.plugins.as_param();
        let body = self
            .post_form(
                "/api/v2/search/start",
                &[
                    ("pattern", query.pattern.as_str()),
                    ("plugins", plugins.as_str()),
                    ("category", query.category.as_str()),
                ],
            )
            .await?;

        let started: QBSearchStart = parse_json(&body)?;
        debug!(id = started.id, pattern = %query.pattern, "Search job started");
        Ok(SearchJobId(started.id))
    }

    async fn search_status(&self, id: SearchJobId) -> Result<SearchJobStatus, TorrentClientError> {
        let id_str = id.to_string();
        let body = self
            .post_form("/api/v2/search/status", &[("id", id_str.as_str())])
            .await?;
        let statuses: Vec<QBSearchStatus> = parse_json(&body)?;

        statuses
            .into_iter()
            .find(|s| s.id == id.0)
            .map(QBSearchStatus::into_status)
            .ok_or_else(|| TorrentClientError::NotFound(format!("search job {}", id)))
    }

    async fn search_results(
        &self,
        id: SearchJobId,
    ) -> Result<Vec<SearchResultRecord>, TorrentClientError> {
        let id_str = id.to_string();
        let body = self
            .post_form("/api/v2/search/results", &[("id", id_str.as_str())])
            .await?;
        let response: QBSearchResults = parse_json(&body)?;
        Ok(response
            .results
            .into_iter()
            .map(QBSearchResult::into_record)
            .collect())
    }

    async fn stop_search(&self, id: SearchJobId) -> Result<(), TorrentClientError> {
        let id_str = id.to_string();
        self.post_form("/api/v2/search/stop", &[("id", id_str.as_str())])
            .await?;
        Ok(())
    }

    async fn delete_search(&self, id: SearchJobId) -> Result<(), TorrentClientError> {
        let id_str = id.to_string();
        self.post_form("/api/v2/search/delete", &[("id", id_str.as_str())])
            .await?;
        Ok(())
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let body = self
            .post_multipart("/api/v2/torrents/add", || self.add_torrent_form(&request))
            .await?;

        if body.trim() == "Fails." {
            return Err(TorrentClientError::Rejected(
                "qBittorrent refused the torrent (invalid or already added)".to_string(),
            ));
        }

        // The hash of an uploaded file is only known once qBittorrent parsed it
        let hash = match &request.source {
            TorrentSource::Url(url) => extract_hash_from_magnet(url),
            TorrentSource::File { .. } => None,
        };

        Ok(AddTorrentResult { hash })
    }

    async fn stop_torrents(&self, selector: &HashSelector) -> Result<(), TorrentClientError> {
        if selector.is_empty() {
            return Ok(());
        }
        let hashes = selector.as_param();
        match self
            .post_form("/api/v2/torrents/stop", &[("hashes", hashes.as_str())])
            .await
        {
            Err(TorrentClientError::NotFound(_)) => {
                // qBittorrent before 5.0 only knows "pause"
                debug!("torrents/stop not available, falling back to torrents/pause");
                self.post_form("/api/v2/torrents/pause", &[("hashes", hashes.as_str())])
                    .await?;
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    async fn delete_torrents(
        &self,
        selector: &HashSelector,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        if selector.is_empty() {
            return Ok(());
        }
        let hashes = selector.as_param();
        let delete_str = if delete_files { "true" } else { "false" };

        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", hashes.as_str()), ("deleteFiles", delete_str)],
        )
        .await?;

        Ok(())
    }

    async fn reannounce(&self, selector: &HashSelector) -> Result<(), TorrentClientError> {
        if selector.is_empty() {
            return Ok(());
        }
        let hashes = selector.as_param();
        self.post_form("/api/v2/torrents/reannounce", &[("hashes", hashes.as_str())])
            .await?;
        Ok(())
    }
}
