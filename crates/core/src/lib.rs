pub mod config;
pub mod crypt;
pub mod downloads;
pub mod error;
pub mod metrics;
pub mod retention;
pub mod searcher;
pub mod service;
pub mod testing;
pub mod torrent_client;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ContentLayout,
    DownloadConfig, PluginSelector, ReannounceScope, SanitizedConfig, SearchConfig,
};
pub use crypt::{Cipher, CryptError};
pub use downloads::{add_torrent, AddedTorrent};
pub use error::{ErrorKind, OperationError};
pub use retention::{purge, PurgeOptions, PurgeReport};
pub use searcher::{
    grab, list_plugins, search_and_wait, CancelHandle, CancelToken, GrabOutcome, PollPolicy,
};
pub use service::TorrentService;
pub use torrent_client::{
    BuildInfo, HashSelector, QBittorrentClient, SearchPlugin, SearchQuery, SearchResultRecord,
    TorrentClient, TorrentClientError, TorrentInfo, TorrentState,
};
