//! Testing utilities and mock implementations.
//!
//! This module provides an in-memory [`MockTorrentClient`] so operations and
//! the front-ends can be exercised without a running qBittorrent.
//!
//! # Example
//!
//! ```rust,ignore
//! use grabbit_core::testing::{fixtures, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//!
//! // Configure mock responses
//! client.set_search_results(vec![fixtures::search_hit("Heat 1995", "abc")]).await;
//! client.add_mock_torrent(fixtures::torrent("def", "Old", 1_600_000_000)).await;
//!
//! // Use in AppState...
//! ```

mod mock_torrent_client;

pub use mock_torrent_client::{MockCall, MockTorrentClient};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::torrent_client::{
        PluginCategory, SearchPlugin, SearchResultRecord, TorrentInfo, TorrentState,
    };

    /// A torrent snapshot with reasonable defaults.
    /// `completion_on` is epoch seconds, 0 for "never completed".
    pub fn torrent(hash: &str, name: &str, completion_on: i64) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: name.to_string(),
            state: if completion_on > 0 {
                TorrentState::Seeding
            } else {
                TorrentState::Downloading
            },
            progress: if completion_on > 0 { 1.0 } else { 0.4 },
            size_bytes: 1024 * 1024 * 700, // 700 MB
            added_on: if completion_on > 0 {
                completion_on - 3600
            } else {
                1_700_000_000
            },
            completion_on,
            save_path: Some("/downloads".to_string()),
            category: None,
        }
    }

    /// A search hit whose download link is a magnet for `hash`.
    pub fn search_hit(name: &str, hash: &str) -> SearchResultRecord {
        SearchResultRecord {
            name: name.to_string(),
            download_url: format!("magnet:?xt=urn:btih:{}", hash),
            size_bytes: Some(1024 * 1024 * 1024 * 2), // 2 GB
            seeders: Some(120),
            leechers: Some(8),
            site_url: Some("https://yts.mx".to_string()),
            description_url: None,
        }
    }

    /// An installed search plugin.
    pub fn plugin(name: &str, enabled: bool) -> SearchPlugin {
        SearchPlugin {
            name: name.to_string(),
            full_name: name.to_uppercase(),
            enabled,
            version: "1.0".to_string(),
            url: format!("https://{}.example", name),
            categories: vec![PluginCategory {
                id: "movies".to_string(),
                name: "Movies".to_string(),
            }],
        }
    }
}
