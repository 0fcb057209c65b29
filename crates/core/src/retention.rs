//! Retention purge: remove torrents that completed too long ago.
//!
//! A torrent is expired when its completion time is set (strictly positive)
//! and strictly earlier than `now - retention_days`. A completion time of
//! zero means "never completed", never "completed in 1970".
//!
//! Stop and delete are two separate remote calls. If the process dies in
//! between, the torrents stay stopped and the next purge selects them again.

use chrono::{DateTime, Days, Duration, Local, TimeZone};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::OperationError;
use crate::metrics;
use crate::torrent_client::{HashSelector, TorrentClient, TorrentInfo};

/// Parameters of a purge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOptions {
    pub retention_days: u32,
    /// Remove downloaded data along with the torrents.
    pub delete_files: bool,
    /// Report the selection without touching anything.
    pub dry_run: bool,
}

impl PurgeOptions {
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention_days,
            delete_files: true,
            dry_run: false,
        }
    }

    pub fn with_delete_files(mut self, delete_files: bool) -> Self {
        self.delete_files = delete_files;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What a purge selected (and removed, unless it was a dry run).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurgeReport {
    pub retention_days: u32,
    pub cutoff: DateTime<Local>,
    pub dry_run: bool,
    pub torrents: Vec<TorrentInfo>,
}

/// `now - days`, counted in calendar days on the wall clock.
///
/// A wall-clock time repeated when clocks go back resolves to its earlier
/// instant. One skipped when clocks go forward falls back to `days * 24h`.
pub fn retention_cutoff<Tz: TimeZone>(
    now: DateTime<Tz>,
    days: u32,
) -> Result<DateTime<Tz>, OperationError> {
    let out_of_range =
        || OperationError::Validation(format!("retention of {} days is out of range", days));

    let wall_clock = now
        .naive_local()
        .checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(out_of_range)?;

    match now.timezone().from_local_datetime(&wall_clock).earliest() {
        Some(cutoff) => Ok(cutoff),
        None => now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(out_of_range),
    }
}

/// Torrents that completed strictly before `cutoff` (epoch seconds).
pub fn select_expired(torrents: Vec<TorrentInfo>, cutoff: i64) -> Vec<TorrentInfo> {
    torrents
        .into_iter()
        .filter(|t| t.completion_on > 0 && t.completion_on < cutoff)
        .collect()
}

/// Purge relative to the current local time.
pub async fn purge(
    client: &dyn TorrentClient,
    options: &PurgeOptions,
) -> Result<PurgeReport, OperationError> {
    purge_at(client, options, Local::now()).await
}

/// Purge relative to `now`.
pub async fn purge_at(
    client: &dyn TorrentClient,
    options: &PurgeOptions,
    now: DateTime<Local>,
) -> Result<PurgeReport, OperationError> {
    let cutoff = retention_cutoff(now, options.retention_days)?;

    let torrents = client
        .list_torrents()
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to list torrents for purge");
            OperationError::PurgeFailed(e)
        })?;
    let known = torrents.len();

    let expired = select_expired(torrents, cutoff.timestamp());
    info!(
        retention_days = options.retention_days,
        cutoff = %cutoff,
        known,
        expired = expired.len(),
        dry_run = options.dry_run,
        "Retention purge selection"
    );

    if !expired.is_empty() && !options.dry_run {
        let selector = HashSelector::hashes(expired.iter().map(|t| t.hash.as_str()));

        client.stop_torrents(&selector).await.map_err(|e| {
            warn!(error = %e, "Failed to stop expired torrents");
            OperationError::PurgeFailed(e)
        })?;
        client
            .delete_torrents(&selector, options.delete_files)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete expired torrents, they remain stopped");
                OperationError::PurgeFailed(e)
            })?;

        for torrent in &expired {
            info!(hash = %torrent.hash, name = %torrent.name, "Purged torrent");
        }
        metrics::TORRENTS_PURGED.inc_by(expired.len() as u64);
    }

    Ok(PurgeReport {
        retention_days: options.retention_days,
        cutoff,
        dry_run: options.dry_run,
        torrents: expired,
    })
}
