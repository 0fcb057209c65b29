//! Mock torrent client for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::torrent_client::{
    extract_hash_from_magnet, AddTorrentRequest, AddTorrentResult, BuildInfo, HashSelector,
    SearchJobId, SearchJobStatus, SearchPlugin, SearchQuery, SearchResultRecord, SearchState,
    TorrentClient, TorrentClientError, TorrentInfo, TorrentSource, TorrentState,
};

/// Trait methods, as recorded by [`MockTorrentClient::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    BuildInfo,
    ListTorrents,
    RssRules,
    SearchPlugins,
    StartSearch,
    SearchStatus,
    SearchResults,
    StopSearch,
    DeleteSearch,
    AddTorrent,
    StopTorrents,
    DeleteTorrents,
    Reannounce,
}

#[derive(Debug, Default)]
struct MockState {
    torrents: BTreeMap<String, TorrentInfo>,
    plugins: Vec<SearchPlugin>,
    rss_rules: serde_json::Value,
    search_results: Vec<SearchResultRecord>,
    /// Status checks answered "running" before a job completes.
    running_cycles: u32,
    next_job_id: i64,
    /// Status checks seen per job.
    status_checks: HashMap<i64, u32>,

    calls: Vec<MockCall>,
    started: Vec<SearchQuery>,
    added: Vec<AddTorrentRequest>,
    stopped: Vec<HashSelector>,
    deleted: Vec<(HashSelector, bool)>,
    reannounced: Vec<HashSelector>,

    next_error: Option<TorrentClientError>,
    errors_on: HashMap<MockCall, TorrentClientError>,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Search jobs that stay running for a configurable number of checks
/// - Recorded adds, stops, deletes and reannounces for assertions
/// - An inventory that stop/delete act on
/// - One-shot failures, either for the next call or for a given method
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.set_running_cycles(3).await;
/// client.set_search_results(vec![fixtures::search_hit("Heat", "abc")]).await;
///
/// let results = search_and_wait(&client, &query, &policy, CancelToken::never()).await?;
/// assert_eq!(client.status_checks().await, 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTorrentClient {
    state: Arc<RwLock<MockState>>,
}

impl MockTorrentClient {
    /// Create a new mock torrent client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Results every search job returns once completed.
    pub async fn set_search_results(&self, results: Vec<SearchResultRecord>) {
        self.state.write().await.search_results = results;
    }

    /// Number of status checks that report a job as running.
    pub async fn set_running_cycles(&self, cycles: u32) {
        self.state.write().await.running_cycles = cycles;
    }

    pub async fn set_plugins(&self, plugins: Vec<SearchPlugin>) {
        self.state.write().await.plugins = plugins;
    }

    pub async fn set_rss_rules(&self, rules: serde_json::Value) {
        self.state.write().await.rss_rules = rules;
    }

    /// Pre-populate a torrent.
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.state
            .write()
            .await
            .torrents
            .insert(info.hash.clone(), info);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        self.state.write().await.next_error = Some(error);
    }

    /// Configure the next call of `call` to fail with the given error.
    pub async fn set_error_on(&self, call: MockCall, error: TorrentClientError) {
        self.state.write().await.errors_on.insert(call, error);
    }

    /// Every trait call made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    /// Total status checks across all search jobs.
    pub async fn status_checks(&self) -> u32 {
        self.state.read().await.status_checks.values().sum()
    }

    pub async fn started_searches(&self) -> Vec<SearchQuery> {
        self.state.read().await.started.clone()
    }

    /// Get all recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<AddTorrentRequest> {
        self.state.read().await.added.clone()
    }

    pub async fn stopped(&self) -> Vec<HashSelector> {
        self.state.read().await.stopped.clone()
    }

    pub async fn deleted(&self) -> Vec<(HashSelector, bool)> {
        self.state.read().await.deleted.clone()
    }

    pub async fn reannounced(&self) -> Vec<HashSelector> {
        self.state.read().await.reannounced.clone()
    }

    /// Check if a torrent exists.
    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.state.read().await.torrents.contains_key(hash)
    }

    /// Record the call and take a pending error, if any.
    async fn enter(
        &self,
        call: MockCall,
    ) -> Result<RwLockWriteGuard<'_, MockState>, TorrentClientError> {
        let mut state = self.state.write().await;
        state.calls.push(call);
        if let Some(err) = state.next_error.take() {
            return Err(err);
        }
        if let Some(err) = state.errors_on.remove(&call) {
            return Err(err);
        }
        Ok(state)
    }
}

fn selects(selector: &HashSelector, hash: &str) -> bool {
    match selector {
        HashSelector::All => true,
        HashSelector::Hashes(hashes) => hashes.iter().any(|h| h == hash),
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    async fn build_info(&self) -> Result<BuildInfo, TorrentClientError> {
        self.enter(MockCall::BuildInfo).await?;
        Ok(BuildInfo {
            app_version: "v5.0.0-mock".to_string(),
            web_api_version: "2.11.2".to_string(),
            details: BTreeMap::from([("libtorrent".to_string(), "2.0.10.0".to_string())]),
        })
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let state = self.enter(MockCall::ListTorrents).await?;
        Ok(state
            .torrents
            .values()
            .cloned()
            .collect())
    }

    async fn rss_rules(&self) -> Result<serde_json::Value, TorrentClientError> {
        let state = self.enter(MockCall::RssRules).await?;
        Ok(if state.rss_rules.is_null() {
            serde_json::json!({})
        } else {
            state.rss_rules.clone()
        })
    }

    async fn search_plugins(&self) -> Result<Vec<SearchPlugin>, TorrentClientError> {
        let state = self.enter(MockCall::SearchPlugins).await?;
        Ok(state.plugins.clone())
    }

    async fn start_search(&self, query: &SearchQuery) -> Result<SearchJobId, TorrentClientError> {
        let mut state = self.enter(MockCall::StartSearch).await?;
        state.next_job_id += 1;
        let id = state.next_job_id;
        state.started.push(query.clone());
        state.status_checks.insert(id, 0);
        Ok(SearchJobId(id))
    }

    async fn search_status(&self, id: SearchJobId) -> Result<SearchJobStatus, TorrentClientError> {
        let mut state = self.enter(MockCall::SearchStatus).await?;
        let running_cycles = state.running_cycles;
        let total = state.search_results.len() as u64;
        let checks = state
            .status_checks
            .get_mut(&id.0)
            .ok_or_else(|| TorrentClientError::NotFound(format!("search job {}", id)))?;
        *checks += 1;

        let job_state = if *checks > running_cycles {
            SearchState::Completed
        } else {
            SearchState::Running
        };
        Ok(SearchJobStatus {
            id,
            state: job_state,
            total,
        })
    }

    async fn search_results(
        &self,
        id: SearchJobId,
    ) -> Result<Vec<SearchResultRecord>, TorrentClientError> {
        let state = self.enter(MockCall::SearchResults).await?;
        if !state.status_checks.contains_key(&id.0) {
            return Err(TorrentClientError::NotFound(format!("search job {}", id)));
        }
        Ok(state.search_results.clone())
    }

    async fn stop_search(&self, _id: SearchJobId) -> Result<(), TorrentClientError> {
        self.enter(MockCall::StopSearch).await?;
        Ok(())
    }

    async fn delete_search(&self, id: SearchJobId) -> Result<(), TorrentClientError> {
        let mut state = self.enter(MockCall::DeleteSearch).await?;
        state.status_checks.remove(&id.0);
        Ok(())
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let mut state = self.enter(MockCall::AddTorrent).await?;

        let hash = match &request.source {
            TorrentSource::Url(url) => extract_hash_from_magnet(url),
            TorrentSource::File { .. } => None,
        };

        if let Some(hash) = &hash {
            state.torrents.insert(
                hash.clone(),
                TorrentInfo {
                    hash: hash.clone(),
                    name: format!("Mock Torrent {}", hash),
                    state: TorrentState::Downloading,
                    progress: 0.0,
                    size_bytes: 100 * 1024 * 1024, // 100 MB default
                    added_on: chrono::Utc::now().timestamp(),
                    completion_on: 0,
                    save_path: request.save_path.clone(),
                    category: request.category.clone(),
                },
            );
        }
        state.added.push(request);

        Ok(AddTorrentResult { hash })
    }

    async fn stop_torrents(&self, selector: &HashSelector) -> Result<(), TorrentClientError> {
        let mut state = self.enter(MockCall::StopTorrents).await?;
        for torrent in state.torrents.values_mut() {
            if selects(selector, &torrent.hash) {
                torrent.state = TorrentState::Stopped;
            }
        }
        state.stopped.push(selector.clone());
        Ok(())
    }

    async fn delete_torrents(
        &self,
        selector: &HashSelector,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let mut state = self.enter(MockCall::DeleteTorrents).await?;
        state.torrents.retain(|hash, _| !selects(selector, hash));
        state.deleted.push((selector.clone(), delete_files));
        Ok(())
    }

    async fn reannounce(&self, selector: &HashSelector) -> Result<(), TorrentClientError> {
        let mut state = self.enter(MockCall::Reannounce).await?;
        state.reannounced.push(selector.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_search_job_runs_for_configured_cycles() {
        let client = MockTorrentClient::new();
        client.set_running_cycles(2).await;

        let id = client.start_search(&SearchQuery::new("x")).await.unwrap();
        assert_eq!(
            client.search_status(id).await.unwrap().state,
            SearchState::Running
        );
        assert_eq!(
            client.search_status(id).await.unwrap().state,
            SearchState::Running
        );
        assert_eq!(
            client.search_status(id).await.unwrap().state,
            SearchState::Completed
        );
        assert_eq!(client.status_checks().await, 3);
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let client = MockTorrentClient::new();
        let result = client.search_status(SearchJobId(42)).await;
        assert!(matches!(result, Err(TorrentClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_magnet_registers_torrent() {
        let client = MockTorrentClient::new();
        let result = client
            .add_torrent(AddTorrentRequest::url("magnet:?xt=urn:btih:ABC&dn=x"))
            .await
            .unwrap();

        assert_eq!(result.hash.as_deref(), Some("abc"));
        assert!(client.has_torrent("abc").await);
        assert_eq!(client.added_torrents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_and_delete_act_on_inventory() {
        let client = MockTorrentClient::new();
        client
            .add_mock_torrent(fixtures::torrent("aaa", "A", 100))
            .await;
        client
            .add_mock_torrent(fixtures::torrent("bbb", "B", 100))
            .await;

        let selector = HashSelector::hashes(["aaa"]);
        client.stop_torrents(&selector).await.unwrap();
        let listed = client.list_torrents().await.unwrap();
        assert_eq!(listed[0].state, TorrentState::Stopped);
        assert_eq!(listed[1].state, TorrentState::Seeding);

        client.delete_torrents(&selector, true).await.unwrap();
        assert!(!client.has_torrent("aaa").await);
        assert!(client.has_torrent("bbb").await);
    }

    #[tokio::test]
    async fn test_errors_are_one_shot() {
        let client = MockTorrentClient::new();
        client
            .set_error_on(MockCall::SearchPlugins, TorrentClientError::Timeout)
            .await;

        assert!(client.search_plugins().await.is_err());
        assert!(client.search_plugins().await.is_ok());
        assert_eq!(
            client.calls().await,
            vec![MockCall::SearchPlugins, MockCall::SearchPlugins]
        );
    }
}
