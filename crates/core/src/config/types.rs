use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub qbittorrent: QBittorrentConfig,
    /// Fernet key used to decrypt `enc:` prefixed credentials.
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
}

/// Connection parameters for the qBittorrent WebUI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Hostname or URL (e.g., "localhost" or "https://qbit.example.com").
    pub host: String,
    /// WebUI port; omitted when the host URL already routes to the WebUI.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

impl QBittorrentConfig {
    /// Base URL of the WebUI without trailing slash.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let mut url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }
        url
    }
}

/// HTTP front-end configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When set, every route except `/health` requires this key.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Where uploaded .torrent files are staged (default: OS temp dir).
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            upload_dir: None,
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// Which search plugins a search job runs against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PluginSelector {
    /// Every installed plugin, enabled or not.
    All,
    /// Only enabled plugins.
    #[default]
    Enabled,
    /// An explicit list of plugin names.
    Named(Vec<String>),
}

impl PluginSelector {
    /// Value for the WebUI `plugins` form field.
    pub fn as_param(&self) -> String {
        match self {
            PluginSelector::All => "all".to_string(),
            PluginSelector::Enabled => "enabled".to_string(),
            PluginSelector::Named(names) => names.join("|"),
        }
    }

    /// Build a selector from plugin names; an empty list means enabled plugins.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            PluginSelector::Enabled
        } else if names.len() == 1 && names[0] == "all" {
            PluginSelector::All
        } else if names.len() == 1 && names[0] == "enabled" {
            PluginSelector::Enabled
        } else {
            PluginSelector::Named(names)
        }
    }
}

/// Search-and-wait configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub plugins: PluginSelector,
    #[serde(default = "default_category")]
    pub category: String,
    /// Delay between two status checks of a running search job.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Waits allowed before the search is abandoned.
    #[serde(default = "default_max_wait_cycles")]
    pub max_wait_cycles: u32,
    /// Opt-in token appended to every pattern (e.g. "*1080p*").
    #[serde(default)]
    pub pattern_suffix: Option<String>,
}

fn default_category() -> String {
    "all".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_wait_cycles() -> u32 {
    300
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            plugins: PluginSelector::default(),
            category: default_category(),
            poll_interval_ms: default_poll_interval(),
            max_wait_cycles: default_max_wait_cycles(),
            pattern_suffix: None,
        }
    }
}

/// How qBittorrent lays out the content of an added torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentLayout {
    /// Keep the structure found in the torrent.
    #[default]
    Original,
    Subfolder,
    NoSubfolder,
}

impl ContentLayout {
    /// Value for the WebUI `contentLayout` form field.
    pub fn as_param(&self) -> &'static str {
        match self {
            ContentLayout::Original => "Original",
            ContentLayout::Subfolder => "Subfolder",
            ContentLayout::NoSubfolder => "NoSubfolder",
        }
    }
}

/// Which torrents get re-announced after an add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReannounceScope {
    /// Every torrent known to the client.
    #[default]
    All,
    /// Only the torrent just added (skipped when its hash is unknown).
    Added,
    None,
}

/// Add-torrent configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DownloadConfig {
    /// Save path handed to qBittorrent; its own default applies when unset.
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default)]
    pub content_layout: ContentLayout,
    #[serde(default)]
    pub reannounce: ReannounceScope,
    #[serde(default)]
    pub category: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub qbittorrent: SanitizedQBittorrentConfig,
    pub encryption_key_configured: bool,
    pub server: SanitizedServerConfig,
    pub search: SearchConfig,
    pub downloads: DownloadConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQBittorrentConfig {
    pub url: String,
    pub username_configured: bool,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            qbittorrent: SanitizedQBittorrentConfig {
                url: config.qbittorrent.base_url(),
                username_configured: !config.qbittorrent.username.is_empty(),
                password_configured: !config.qbittorrent.password.is_empty(),
                timeout_secs: config.qbittorrent.timeout_secs,
            },
            encryption_key_configured: config.encryption_key.is_some(),
            server: SanitizedServerConfig {
                host: config.server.host,
                port: config.server.port,
                api_key_configured: config.server.api_key.is_some(),
            },
            search: config.search.clone(),
            downloads: config.downloads.clone(),
        }
    }
}
