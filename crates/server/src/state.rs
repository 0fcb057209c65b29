use std::path::PathBuf;

use grabbit_core::{CancelToken, SanitizedConfig, TorrentService};

/// Shared application state
pub struct AppState {
    service: TorrentService,
    shutdown: CancelToken,
}

impl AppState {
    pub fn new(service: TorrentService, shutdown: CancelToken) -> Self {
        Self { service, shutdown }
    }

    pub fn service(&self) -> &TorrentService {
        &self.service
    }

    /// Token fired when the server starts shutting down.
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(self.service.config())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.service
            .config()
            .server
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }

    /// Directory uploaded .torrent files are staged in.
    pub fn upload_dir(&self) -> PathBuf {
        self.service
            .config()
            .server
            .upload_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
