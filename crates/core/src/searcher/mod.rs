//! Search jobs on the remote client.
//!
//! A search is an asynchronous job on the qBittorrent side: it is submitted,
//! polled until it stops running, then its results are read back.
//! [`search_and_wait`] bounds that wait with a [`PollPolicy`] and a
//! [`CancelToken`]; [`grab`] builds on it to add the first hit.

mod cancel;
mod types;
mod wait;

pub use cancel::{CancelHandle, CancelToken};
pub use types::*;
pub use wait::{grab, search_and_wait};

use tracing::warn;

use crate::error::OperationError;
use crate::torrent_client::{SearchPlugin, TorrentClient};

/// Installed search plugins, enabled or not.
pub async fn list_plugins(client: &dyn TorrentClient) -> Result<Vec<SearchPlugin>, OperationError> {
    client.search_plugins().await.map_err(|e| {
        warn!(error = %e, "Failed to list search plugins");
        OperationError::Remote(e)
    })
}
