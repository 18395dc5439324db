use std::{sync::Arc, time::Duration};

use reqwest::Client;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ResolverConfig;
use super::error::{ResolveError, TaskError};
use super::fetcher::{ProviderFetcher, TaskResult};
use super::prefilter::SourceDescriptor;

/// Fetches every candidate concurrently and assembles the link list.
///
/// Returns a single preferred link as soon as one shows up within the fast
/// path window. Otherwise collects results in descriptor order until every
/// worker reported or the deadline passes. Workers still running when this
/// returns are cancelled.
pub async fn collect_links(
    client: Client,
    config: Arc<ResolverConfig>,
    candidates: Vec<SourceDescriptor>,
) -> Result<Vec<String>, ResolveError> {
    if candidates.is_empty() {
        return Err(ResolveError::NoCandidates);
    }
    let fetcher = Arc::new(ProviderFetcher::new(client, config));
    run_workers(fetcher, candidates).await
}

async fn run_workers(
    fetcher: Arc<ProviderFetcher>,
    candidates: Vec<SourceDescriptor>,
) -> Result<Vec<String>, ResolveError> {
    let total = candidates.len();
    let started = Instant::now();
    let deadline = started + fetcher.config().deadline;
    // The window never outlasts the overall deadline.
    let fast_path_until = (started + fetcher.config().fast_path_window).min(deadline);

    let cancel = CancellationToken::new();
    let _abandon = cancel.clone().drop_guard();
    let (tx, mut rx) = mpsc::channel(total);
    for (index, descriptor) in candidates.into_iter().enumerate() {
        tokio::spawn(Arc::clone(&fetcher).run(index, descriptor, tx.clone(), cancel.child_token()));
    }
    // Workers hold the only senders, so the channel closes once all of them finish.
    drop(tx);

    let mut slots = ResultSlots::new(total);

    let window = sleep_until(fast_path_until);
    tokio::pin!(window);
    loop {
        tokio::select! {
            biased;
            link = fetcher.fast_path().wait() => {
                info!(%link, elapsed = ?started.elapsed(), "preferred provider link resolved");
                return Ok(vec![link]);
            }
            () = &mut window => break,
            received = rx.recv() => match received {
                Some(result) => slots.record(result),
                None => return slots.finish(),
            },
        }
    }

    debug!(pending = slots.pending(), "no preferred link in time, collecting all results");
    let expiry = sleep_until(deadline);
    tokio::pin!(expiry);
    while slots.pending() > 0 {
        tokio::select! {
            // Results already delivered count before the deadline fires.
            biased;
            received = rx.recv() => match received {
                Some(result) => slots.record(result),
                None => break,
            },
            () = &mut expiry => return slots.expire(started.elapsed()),
        }
    }
    slots.finish()
}

/// Per-descriptor result slots, filled in completion order and read in index order.
struct ResultSlots {
    slots: Vec<Option<Vec<String>>>,
    errors: Vec<TaskError>,
    reported: usize,
}

impl ResultSlots {
    fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            errors: Vec::new(),
            reported: 0,
        }
    }

    fn record(&mut self, result: TaskResult) {
        let TaskResult { index, outcome } = result;
        match outcome {
            Ok(links) => match self.slots.get_mut(index) {
                Some(slot) if slot.is_none() => {
                    debug!(index, links = links.len(), "provider responded");
                    *slot = Some(links);
                    self.reported += 1;
                }
                _ => warn!(index, "ignoring repeated provider result"),
            },
            Err(error) => {
                debug!(index, %error, "provider failed");
                self.errors.push(TaskError { index, error });
                self.reported += 1;
            }
        }
    }

    fn pending(&self) -> usize {
        self.slots.len().saturating_sub(self.reported)
    }

    fn successes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn flatten(&mut self) -> Vec<String> {
        self.slots.iter_mut().filter_map(Option::take).flatten().collect()
    }

    fn expire(mut self, waited: Duration) -> Result<Vec<String>, ResolveError> {
        if self.successes() == 0 {
            return Err(ResolveError::Timeout { waited });
        }
        warn!(
            pending = self.pending(),
            failed = self.errors.len(),
            "deadline reached, returning partial links"
        );
        Ok(self.flatten())
    }

    fn finish(mut self) -> Result<Vec<String>, ResolveError> {
        let links = self.flatten();
        if links.is_empty() {
            return Err(ResolveError::NoLinksFound {
                attempted: self.slots.len(),
                errors: self.errors,
            });
        }
        info!(links = links.len(), failed = self.errors.len(), "provider links collected");
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;
    use crate::resolver::decoder::encode;

    fn config_for(server: &MockServer, fast_path_window: Duration, deadline: Duration) -> Arc<ResolverConfig> {
        Arc::new(ResolverConfig {
            base_url: server.uri(),
            rate_limit: Duration::from_millis(5),
            fast_path_window,
            deadline,
            request_timeout: Duration::from_secs(10),
            ..ResolverConfig::default()
        })
    }

    fn candidates(ids: &[&str]) -> Vec<SourceDescriptor> {
        ids.iter()
            .map(|id| {
                let raw = format!("--{}", encode(&format!("/apivtwo/clock?id={id}")));
                SourceDescriptor::parse(&raw).unwrap()
            })
            .collect()
    }

    async fn mount_links(server: &MockServer, id: &str, links: &[&str], delay: Duration) {
        let entries: Vec<_> = links.iter().map(|link| json!({ "link": link })).collect();
        Mock::given(method("GET"))
            .and(path("/apivtwo/clock.json"))
            .and(query_param("id", id))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "links": entries }))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    async fn mount_status(server: &MockServer, id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path("/apivtwo/clock.json"))
            .and(query_param("id", id))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn preserves_descriptor_order_regardless_of_completion_order() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0", "https://a.example/0b"], Duration::from_millis(400)).await;
        mount_links(&server, "1", &["https://b.example/1"], Duration::ZERO).await;
        mount_links(&server, "2", &["https://c.example/2"], Duration::from_millis(200)).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_secs(5));
        let links = collect_links(Client::new(), config, candidates(&["0", "1", "2"]))
            .await
            .unwrap();

        assert_eq!(
            links,
            [
                "https://a.example/0",
                "https://a.example/0b",
                "https://b.example/1",
                "https://c.example/2",
            ]
        );
    }

    #[tokio::test]
    async fn fast_path_returns_single_preferred_link() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/slow"], Duration::from_secs(5)).await;
        mount_links(
            &server,
            "1",
            &["https://x.mp4upload.com/1", "https://y.sharepoint.com/1"],
            Duration::ZERO,
        )
        .await;

        let config = config_for(&server, Duration::from_secs(2), Duration::from_secs(10));
        let started = std::time::Instant::now();
        let links = collect_links(Client::new(), config, candidates(&["0", "1"]))
            .await
            .unwrap();

        assert_eq!(links, ["https://y.sharepoint.com/1"]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn preferred_link_after_window_is_collected_normally() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0"], Duration::ZERO).await;
        mount_links(&server, "1", &["https://f.filemoon.sx/1"], Duration::from_millis(300)).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_secs(5));
        let links = collect_links(Client::new(), config, candidates(&["0", "1"]))
            .await
            .unwrap();

        assert_eq!(links, ["https://a.example/0", "https://f.filemoon.sx/1"]);
    }

    #[tokio::test]
    async fn finishes_before_window_when_every_worker_reported() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0"], Duration::ZERO).await;

        let config = config_for(&server, Duration::from_secs(3), Duration::from_secs(10));
        let started = std::time::Instant::now();
        let links = collect_links(Client::new(), config, candidates(&["0"]))
            .await
            .unwrap();

        assert_eq!(links, ["https://a.example/0"]);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn failures_are_tolerated_when_another_source_succeeds() {
        let server = MockServer::start().await;
        mount_status(&server, "0", 500).await;
        mount_links(&server, "1", &["https://b.example/1"], Duration::ZERO).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_secs(5));
        let links = collect_links(Client::new(), config, candidates(&["0", "1"]))
            .await
            .unwrap();

        assert_eq!(links, ["https://b.example/1"]);
    }

    #[tokio::test]
    async fn all_sources_empty_or_failed_is_no_links_found() {
        let server = MockServer::start().await;
        mount_status(&server, "0", 404).await;
        mount_links(&server, "1", &[], Duration::ZERO).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_secs(5));
        let err = collect_links(Client::new(), config, candidates(&["0", "1"]))
            .await
            .unwrap_err();

        match err {
            ResolveError::NoLinksFound { attempted, errors } => {
                assert_eq!(attempted, 2);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].index, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn deadline_without_success_is_a_timeout() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0"], Duration::from_secs(3)).await;
        mount_links(&server, "1", &["https://b.example/1"], Duration::from_secs(3)).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = collect_links(Client::new(), config, candidates(&["0", "1"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn deadline_with_success_returns_partial_links() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0"], Duration::from_secs(3)).await;
        mount_links(&server, "1", &["https://b.example/1"], Duration::ZERO).await;
        mount_links(&server, "2", &["https://c.example/2"], Duration::from_millis(20)).await;

        let config = config_for(&server, Duration::from_millis(50), Duration::from_millis(500));
        let links = collect_links(Client::new(), config, candidates(&["0", "1", "2"]))
            .await
            .unwrap();

        assert_eq!(links, ["https://b.example/1", "https://c.example/2"]);
    }

    #[tokio::test]
    async fn deadline_shorter_than_window_still_applies() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/0"], Duration::from_secs(5)).await;

        let config = config_for(&server, Duration::from_secs(2), Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = collect_links(Client::new(), config, candidates(&["0"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn fast_path_return_cancels_pending_workers() {
        let server = MockServer::start().await;
        mount_links(&server, "0", &["https://a.example/slow"], Duration::from_secs(5)).await;
        mount_links(&server, "1", &["https://f.filemoon.sx/1"], Duration::ZERO).await;

        let fetcher = Arc::new(ProviderFetcher::new(
            Client::new(),
            config_for(&server, Duration::from_secs(2), Duration::from_secs(10)),
        ));
        let links = run_workers(Arc::clone(&fetcher), candidates(&["0", "1"]))
            .await
            .unwrap();
        assert_eq!(links, ["https://f.filemoon.sx/1"]);

        // Every worker task owns a clone; only ours survives once they stop.
        tokio::time::timeout(Duration::from_secs(1), async {
            while Arc::strong_count(&fetcher) > 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("slow worker should be cancelled well before its response");
    }

    #[tokio::test]
    async fn empty_candidate_list_is_rejected() {
        let config = Arc::new(ResolverConfig::default());
        let err = collect_links(Client::new(), config, Vec::new()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCandidates));
    }

    #[test]
    fn slots_ignore_repeated_results() {
        let mut slots = ResultSlots::new(2);
        slots.record(TaskResult {
            index: 1,
            outcome: Ok(vec!["first".to_string()]),
        });
        slots.record(TaskResult {
            index: 1,
            outcome: Ok(vec!["second".to_string()]),
        });
        assert_eq!(slots.pending(), 1);
        assert_eq!(slots.successes(), 1);
        assert_eq!(slots.finish().unwrap(), ["first"]);
    }
}
