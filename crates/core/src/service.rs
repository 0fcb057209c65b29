//! Entry point shared by the command line and the HTTP front-end.

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::downloads::{self, AddedTorrent};
use crate::error::OperationError;
use crate::retention::{self, PurgeOptions, PurgeReport};
use crate::searcher::{self, CancelToken, GrabOutcome, PollPolicy};
use crate::torrent_client::{
    BuildInfo, QBittorrentClient, SearchPlugin, SearchQuery, SearchResultRecord, TorrentClient,
    TorrentInfo,
};

/// A client handle plus the configuration every operation reads.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct TorrentService {
    client: Arc<dyn TorrentClient>,
    config: Arc<Config>,
}

impl TorrentService {
    pub fn new(client: Arc<dyn TorrentClient>, config: Config) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Build a service talking to the qBittorrent WebUI named in `config`.
    pub fn connect(config: Config) -> Result<Self, OperationError> {
        let client = QBittorrentClient::new(&config.qbittorrent).map_err(OperationError::Remote)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn client(&self) -> &dyn TorrentClient {
        self.client.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A query for `pattern` with the configured plugins, category and suffix.
    pub fn query(&self, pattern: &str) -> Result<SearchQuery, OperationError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(OperationError::Validation(
                "search pattern cannot be empty".to_string(),
            ));
        }

        let search = &self.config.search;
        Ok(SearchQuery::new(pattern)
            .with_plugins(search.plugins.clone())
            .with_category(search.category.clone())
            .with_suffix(search.pattern_suffix.as_deref()))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.config.search)
    }

    /// Search with the configured defaults.
    pub async fn search(
        &self,
        pattern: &str,
        cancel: CancelToken,
    ) -> Result<Vec<SearchResultRecord>, OperationError> {
        let query = self.query(pattern)?;
        self.search_with(&query, cancel).await
    }

    /// Search with an explicit query.
    pub async fn search_with(
        &self,
        query: &SearchQuery,
        cancel: CancelToken,
    ) -> Result<Vec<SearchResultRecord>, OperationError> {
        searcher::search_and_wait(self.client(), query, &self.poll_policy(), cancel).await
    }

    /// Search with the configured defaults and add the first hit.
    pub async fn grab(
        &self,
        pattern: &str,
        cancel: CancelToken,
    ) -> Result<GrabOutcome, OperationError> {
        let query = self.query(pattern)?;
        self.grab_with(&query, cancel).await
    }

    pub async fn grab_with(
        &self,
        query: &SearchQuery,
        cancel: CancelToken,
    ) -> Result<GrabOutcome, OperationError> {
        searcher::grab(
            self.client(),
            query,
            &self.poll_policy(),
            &self.config.downloads,
            cancel,
        )
        .await
    }

    pub async fn plugins(&self) -> Result<Vec<SearchPlugin>, OperationError> {
        searcher::list_plugins(self.client()).await
    }

    /// Add a URL, magnet link or local .torrent path.
    pub async fn add_torrent(&self, descriptor: &str) -> Result<AddedTorrent, OperationError> {
        downloads::add_torrent(self.client(), descriptor, &self.config.downloads).await
    }

    /// Upload a .torrent file from disk.
    pub async fn add_torrent_path(&self, path: &Path) -> Result<AddedTorrent, OperationError> {
        downloads::add_torrent_path(self.client(), path, &self.config.downloads).await
    }

    pub async fn purge(&self, options: &PurgeOptions) -> Result<PurgeReport, OperationError> {
        retention::purge(self.client(), options).await
    }

    pub async fn build_info(&self) -> Result<BuildInfo, OperationError> {
        self.client.build_info().await.map_err(OperationError::Remote)
    }

    pub async fn torrents(&self) -> Result<Vec<TorrentInfo>, OperationError> {
        self.client
            .list_torrents()
            .await
            .map_err(OperationError::Remote)
    }

    pub async fn rss_rules(&self) -> Result<serde_json::Value, OperationError> {
        self.client.rss_rules().await.map_err(OperationError::Remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, PluginSelector};
    use crate::testing::{fixtures, MockTorrentClient};

    fn service(toml_extra: &str) -> (TorrentService, Arc<MockTorrentClient>) {
        let config = load_config_from_str(&format!(
            r#"
[qbittorrent]
host = "localhost"
port = 8080

{}
"#,
            toml_extra
        ))
        .unwrap();
        let client = Arc::new(MockTorrentClient::new());
        (TorrentService::new(client.clone(), config), client)
    }

    #[test]
    fn test_query_uses_configured_defaults() {
        let (service, _) = service(
            r#"
[search]
plugins = { named = ["yts_mx"] }
category = "movies"
pattern_suffix = "*1080p*"
"#,
        );

        let query = service.query("  Heat 1995 ").unwrap();
        assert_eq!(query.pattern, "Heat 1995*1080p*");
        assert_eq!(query.plugins, PluginSelector::Named(vec!["yts_mx".into()]));
        assert_eq!(query.category, "movies");
    }

    #[test]
    fn test_query_without_suffix_is_untouched() {
        let (service, _) = service("");
        let query = service.query("Heat 1995").unwrap();
        assert_eq!(query.pattern, "Heat 1995");
        assert_eq!(query.plugins, PluginSelector::Enabled);
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let (service, _) = service("");
        assert!(matches!(
            service.query("   "),
            Err(OperationError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_grab_through_service_uses_download_config() {
        let (service, client) = service(
            r#"
[downloads]
save_path = "/srv/downloads/yify"
content_layout = "subfolder"
"#,
        );
        client
            .set_search_results(vec![fixtures::search_hit("Heat", "aaa")])
            .await;

        let outcome = service.grab("Heat", CancelToken::never()).await.unwrap();
        assert!(outcome.is_added());

        let added = client.added_torrents().await;
        assert_eq!(added[0].save_path.as_deref(), Some("/srv/downloads/yify"));
        assert_eq!(
            added[0].content_layout,
            crate::config::ContentLayout::Subfolder
        );
    }

    #[tokio::test]
    async fn test_passthroughs() {
        let (service, client) = service("");
        client
            .add_mock_torrent(fixtures::torrent("aaa", "A", 0))
            .await;
        client
            .set_rss_rules(serde_json::json!({"Movies": {"enabled": true}}))
            .await;

        assert_eq!(service.torrents().await.unwrap().len(), 1);
        assert_eq!(service.rss_rules().await.unwrap()["Movies"]["enabled"], true);
        assert_eq!(
            service.build_info().await.unwrap().web_api_version,
            "2.11.2"
        );
    }
}
