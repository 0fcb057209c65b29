//! Types for search-and-wait and grab.

use std::time::Duration;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::downloads::AddedTorrent;
use crate::error::OperationError;
use crate::torrent_client::SearchResultRecord;

/// How long and how often to wait for a running search job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two status checks.
    pub interval: Duration,
    /// Sleeps allowed before the job is abandoned.
    pub max_wait_cycles: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait_cycles: u32) -> Self {
        Self {
            interval,
            max_wait_cycles,
        }
    }

    /// Upper bound of the time spent sleeping.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_wait_cycles
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for PollPolicy {
    fn from(config: &SearchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_interval_ms),
            config.max_wait_cycles,
        )
    }
}

/// What a grab ended up doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrabOutcome {
    /// The first search hit was submitted.
    Added {
        hit: SearchResultRecord,
        torrent: AddedTorrent,
    },
    /// The search returned nothing; no torrent was submitted.
    NoResults { pattern: String },
}

impl GrabOutcome {
    /// Treat an empty search as an error.
    pub fn into_added(self) -> Result<AddedTorrent, OperationError> {
        match self {
            GrabOutcome::Added { torrent, .. } => Ok(torrent),
            GrabOutcome::NoResults { pattern } => Err(OperationError::NoResults { pattern }),
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, GrabOutcome::Added { .. })
    }
}
