//! Search-and-wait and grab.

use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::downloads;
use crate::error::OperationError;
use crate::metrics;
use crate::torrent_client::{
    SearchJobId, SearchQuery, SearchResultRecord, SearchState, TorrentClient,
};

use super::{CancelToken, GrabOutcome, PollPolicy};

/// Submit a search job and wait for it to complete.
///
/// Sleeps exactly once per status check that reports the job as running, and
/// gives up after `policy.max_wait_cycles` sleeps. On timeout or cancellation
/// the remote job is stopped; once results are fetched it is deleted. Both
/// clean-up calls are best effort.
///
/// Results are returned in the order the client reports them.
pub async fn search_and_wait(
    client: &dyn TorrentClient,
    query: &SearchQuery,
    policy: &PollPolicy,
    cancel: CancelToken,
) -> Result<Vec<SearchResultRecord>, OperationError> {
    if cancel.is_cancelled() {
        metrics::SEARCHES_TOTAL
            .with_label_values(&["cancelled"])
            .inc();
        return Err(OperationError::Cancelled);
    }

    let id = client.start_search(query).await.map_err(|e| {
        warn!(pattern = %query.pattern, error = %e, "Failed to start search");
        metrics::SEARCHES_TOTAL.with_label_values(&["failed"]).inc();
        OperationError::SearchFailed(e)
    })?;

    info!(
        job_id = %id,
        pattern = %query.pattern,
        plugins = %query.plugins.as_param(),
        category = %query.category,
        "Search started"
    );

    let mut waits: u32 = 0;
    loop {
        let status = match client.search_status(id).await {
            Ok(status) => status,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Failed to poll search status");
                metrics::SEARCHES_TOTAL.with_label_values(&["failed"]).inc();
                return Err(OperationError::SearchFailed(e));
            }
        };

        if status.state == SearchState::Completed {
            break;
        }

        if waits >= policy.max_wait_cycles {
            warn!(
                job_id = %id,
                waits,
                "Search still running, giving up"
            );
            abandon(client, id).await;
            metrics::SEARCHES_TOTAL
                .with_label_values(&["timed_out"])
                .inc();
            return Err(OperationError::SearchTimedOut { cycles: waits });
        }

        debug!(job_id = %id, total = status.total, waits, "Search running");

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(job_id = %id, "Search cancelled");
                abandon(client, id).await;
                metrics::SEARCHES_TOTAL.with_label_values(&["cancelled"]).inc();
                return Err(OperationError::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
        waits += 1;
    }

    let results = client.search_results(id).await.map_err(|e| {
        warn!(job_id = %id, error = %e, "Failed to fetch search results");
        metrics::SEARCHES_TOTAL.with_label_values(&["failed"]).inc();
        OperationError::SearchFailed(e)
    })?;

    if let Err(e) = client.delete_search(id).await {
        debug!(job_id = %id, error = %e, "Could not delete finished search job");
    }

    info!(
        job_id = %id,
        results = results.len(),
        waits,
        "Search completed"
    );
    metrics::SEARCHES_TOTAL
        .with_label_values(&["completed"])
        .inc();
    metrics::SEARCH_WAIT_CYCLES
        .with_label_values(&[])
        .observe(f64::from(waits));
    metrics::SEARCH_RESULTS
        .with_label_values(&[])
        .observe(results.len() as f64);

    Ok(results)
}

/// Stop and forget a job we no longer wait for.
async fn abandon(client: &dyn TorrentClient, id: SearchJobId) {
    if let Err(e) = client.stop_search(id).await {
        debug!(job_id = %id, error = %e, "Could not stop search job");
    }
    if let Err(e) = client.delete_search(id).await {
        debug!(job_id = %id, error = %e, "Could not delete search job");
    }
}

/// Search and add the first hit.
///
/// "First" is whatever the client returned first; hits are not re-ranked.
/// An empty search is not an error: it yields [`GrabOutcome::NoResults`]
/// and nothing is added.
pub async fn grab(
    client: &dyn TorrentClient,
    query: &SearchQuery,
    policy: &PollPolicy,
    downloads_config: &DownloadConfig,
    cancel: CancelToken,
) -> Result<GrabOutcome, OperationError> {
    let results = search_and_wait(client, query, policy, cancel).await?;

    let Some(hit) = results.into_iter().next() else {
        warn!(pattern = %query.pattern, "No results found to grab");
        metrics::GRABS_EMPTY.inc();
        return Ok(GrabOutcome::NoResults {
            pattern: query.pattern.clone(),
        });
    };

    info!(name = %hit.name, seeders = ?hit.seeders, "Grabbing first result");
    let torrent = downloads::add_url(
        client,
        &hit.download_url,
        Some(hit.name.clone()),
        downloads_config,
    )
    .await?;

    Ok(GrabOutcome::Added { hit, torrent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PluginSelector, ReannounceScope};
    use crate::error::ErrorKind;
    use crate::testing::{fixtures, MockCall, MockTorrentClient};
    use crate::torrent_client::{HashSelector, TorrentClientError, TorrentSource};
    use std::time::Duration;
    use tokio::time::Instant;

    fn policy(max_wait_cycles: u32) -> PollPolicy {
        PollPolicy::new(Duration::from_secs(1), max_wait_cycles)
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_once_per_running_status() {
        for running in [0u32, 1, 3, 7] {
            let client = MockTorrentClient::new();
            client.set_running_cycles(running).await;
            client
                .set_search_results(vec![fixtures::search_hit("Heat 1995", "aaa")])
                .await;

            let started = Instant::now();
            let results = search_and_wait(
                &client,
                &SearchQuery::new("Heat 1995"),
                &policy(10),
                CancelToken::never(),
            )
            .await
            .unwrap();

            assert_eq!(results.len(), 1);
            assert_eq!(client.status_checks().await, running + 1);
            assert_eq!(started.elapsed(), Duration::from_secs(u64::from(running)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_job_is_deleted() {
        let client = MockTorrentClient::new();
        client.set_running_cycles(2).await;

        search_and_wait(
            &client,
            &SearchQuery::new("x"),
            &policy(5),
            CancelToken::never(),
        )
        .await
        .unwrap();

        let calls = client.calls().await;
        assert!(calls.contains(&MockCall::DeleteSearch));
        assert!(!calls.contains(&MockCall::StopSearch));
    }

    #[tokio::test]
    async fn test_query_is_forwarded_unchanged() {
        let client = MockTorrentClient::new();
        let query = SearchQuery::new("Heat 1995")
            .with_plugins(PluginSelector::Named(vec!["yts_mx".to_string()]))
            .with_category("movies");

        search_and_wait(&client, &query, &policy(1), CancelToken::never())
            .await
            .unwrap();

        assert_eq!(client.started_searches().await, vec![query]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_max_wait_cycles() {
        let client = MockTorrentClient::new();
        client.set_running_cycles(u32::MAX).await;

        let started = Instant::now();
        let err = search_and_wait(
            &client,
            &SearchQuery::new("slow"),
            &policy(4),
            CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OperationError::SearchTimedOut { cycles: 4 }));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(client.status_checks().await, 5);

        let calls = client.calls().await;
        assert!(calls.contains(&MockCall::StopSearch));
        assert!(!calls.contains(&MockCall::SearchResults));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait() {
        let client = MockTorrentClient::new();
        client.set_running_cycles(u32::MAX).await;
        let (handle, token) = super::super::CancelHandle::new();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            handle.cancel();
        });

        let started = Instant::now();
        let err = search_and_wait(&client, &SearchQuery::new("x"), &policy(100), token)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, OperationError::Cancelled));
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
        assert!(client.calls().await.contains(&MockCall::StopSearch));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_remote_call() {
        let client = MockTorrentClient::new();
        let (handle, token) = super::super::CancelHandle::new();
        handle.cancel();

        let err = search_and_wait(&client, &SearchQuery::new("x"), &policy(1), token)
            .await
            .unwrap_err();

        assert!(matches!(err, OperationError::Cancelled));
        assert!(client.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_search_failed() {
        let client = MockTorrentClient::new();
        client
            .set_error_on(
                MockCall::SearchStatus,
                TorrentClientError::ConnectionFailed("refused".into()),
            )
            .await;

        let err = search_and_wait(
            &client,
            &SearchQuery::new("x"),
            &policy(3),
            CancelToken::never(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OperationError::SearchFailed(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_auth_failure_on_start() {
        let client = MockTorrentClient::new();
        client
            .set_next_error(TorrentClientError::AuthenticationFailed("Fails.".into()))
            .await;

        let err = search_and_wait(
            &client,
            &SearchQuery::new("x"),
            &policy(3),
            CancelToken::never(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_grab_adds_first_result() {
        let client = MockTorrentClient::new();
        client
            .set_search_results(vec![
                fixtures::search_hit("Heat (1995) [1080p]", "aaa"),
                fixtures::search_hit("Heat (1995) [720p]", "bbb"),
            ])
            .await;

        let config = DownloadConfig {
            save_path: Some("/srv/downloads".to_string()),
            ..DownloadConfig::default()
        };
        let outcome = grab(
            &client,
            &SearchQuery::new("Heat 1995"),
            &policy(3),
            &config,
            CancelToken::never(),
        )
        .await
        .unwrap();

        let added = client.added_torrents().await;
        assert_eq!(added.len(), 1);
        assert_eq!(
            added[0].source,
            TorrentSource::Url("magnet:?xt=urn:btih:aaa".to_string())
        );
        assert_eq!(added[0].save_path.as_deref(), Some("/srv/downloads"));

        match outcome {
            GrabOutcome::Added { hit, torrent } => {
                assert_eq!(hit.name, "Heat (1995) [1080p]");
                assert_eq!(torrent.hash.as_deref(), Some("aaa"));
            }
            other => panic!("expected Added, got {:?}", other),
        }
        assert_eq!(client.reannounced().await, vec![HashSelector::All]);
    }

    #[tokio::test]
    async fn test_grab_without_results_adds_nothing() {
        let client = MockTorrentClient::new();
        client.set_search_results(vec![]).await;

        let outcome = grab(
            &client,
            &SearchQuery::new("nothing matches"),
            &policy(3),
            &DownloadConfig::default(),
            CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            GrabOutcome::NoResults {
                pattern: "nothing matches".to_string()
            }
        );
        assert!(client.added_torrents().await.is_empty());
        assert!(client.reannounced().await.is_empty());
    }

    #[tokio::test]
    async fn test_grab_reannounces_only_added_when_configured() {
        let client = MockTorrentClient::new();
        client
            .set_search_results(vec![fixtures::search_hit("Heat", "ABC")])
            .await;
        let config = DownloadConfig {
            reannounce: ReannounceScope::Added,
            ..DownloadConfig::default()
        };

        grab(
            &client,
            &SearchQuery::new("Heat"),
            &policy(1),
            &config,
            CancelToken::never(),
        )
        .await
        .unwrap();

        assert_eq!(
            client.reannounced().await,
            vec![HashSelector::Hashes(vec!["abc".to_string()])]
        );
    }
}
