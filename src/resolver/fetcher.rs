use std::sync::Arc;

use reqwest::{
    Client,
    header::{REFERER, USER_AGENT},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ResolverConfig;
use super::error::FetchError;
use super::limiter::LaunchPacer;
use super::prefilter::SourceDescriptor;
use super::signal::FastPath;

/// Outcome of one provider fetch, tied to its descriptor's position.
#[derive(Debug)]
pub struct TaskResult {
    pub index: usize,
    pub outcome: Result<Vec<String>, FetchError>,
}

/// State shared by every worker of a single resolution call.
pub struct ProviderFetcher {
    client: Client,
    config: Arc<ResolverConfig>,
    pacer: Option<LaunchPacer>,
    fast_path: FastPath,
}

impl ProviderFetcher {
    pub fn new(client: Client, config: Arc<ResolverConfig>) -> Self {
        // A zero interval disables pacing.
        let pacer = LaunchPacer::new(config.rate_limit);
        Self {
            client,
            config,
            pacer,
            fast_path: FastPath::default(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn fast_path(&self) -> &FastPath {
        &self.fast_path
    }

    /// Worker body: fetch one descriptor and publish the result.
    ///
    /// Publishes nothing when cancelled. A closed or vanished result channel
    /// means the coordinator already returned, so the result is dropped.
    pub async fn run(
        self: Arc<Self>,
        index: usize,
        descriptor: SourceDescriptor,
        results: mpsc::Sender<TaskResult>,
        cancel: CancellationToken,
    ) {
        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                debug!(index, "provider fetch abandoned");
                return;
            }
            outcome = self.fetch(&descriptor) => outcome,
        };

        if let Ok(links) = &outcome {
            self.offer_preferred(index, links);
        }

        if results.try_send(TaskResult { index, outcome }).is_err() {
            debug!(index, "coordinator finished, dropping provider result");
        }
    }

    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<Vec<String>, FetchError> {
        if let Some(pacer) = &self.pacer {
            pacer.ready().await;
        }

        let url = format!("{}{}", self.config.base_url, descriptor.decoded_path());
        debug!(%url, priority = descriptor.priority(), "fetching provider links");

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, self.config.user_agent.as_str())
            .header(REFERER, self.config.referer.as_str())
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status, url });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        parse_links(&body).map_err(|source| FetchError::Parse { url, source })
    }

    fn offer_preferred(&self, index: usize, links: &[String]) {
        let preferred = self.config.priorities.preferred(self.config.preferred_count);
        let hit = links
            .iter()
            .find(|link| preferred.iter().any(|domain| link.contains(domain.as_str())));
        if let Some(link) = hit {
            if self.fast_path.offer(link) {
                debug!(index, %link, "preferred provider link found");
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    links: Vec<serde_json::Value>,
}

/// Extracts `links[].link`; entries of any other shape are skipped.
fn parse_links(body: &[u8]) -> Result<Vec<String>, serde_json::Error> {
    let response: ClockResponse = serde_json::from_slice(body)?;
    Ok(response
        .links
        .iter()
        .filter_map(|entry| entry.get("link").and_then(serde_json::Value::as_str))
        .map(str::to_owned)
        .collect())
}
