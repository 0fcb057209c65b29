//! Torrent client abstraction.
//!
//! The [`TorrentClient`] trait is the only seam between the operations and
//! the remote qBittorrent WebUI. [`QBittorrentClient`] talks to the real
//! thing; `testing::MockTorrentClient` stands in for it in tests.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
