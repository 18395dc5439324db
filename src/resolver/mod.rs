//! Stream link resolution for a single episode.
//!
//! AllAnime hands out one obfuscated descriptor per hosting provider. The
//! resolver decodes them, queries the providers concurrently and returns the
//! playable links, short-circuiting as soon as a preferred provider answers.

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use tracing::{debug, instrument};

mod coordinator;
mod decoder;
mod error;
mod fetcher;
mod limiter;
mod prefilter;
mod ranker;
mod signal;

pub use error::ResolveError;
pub use ranker::PriorityTable;

pub const DEFAULT_BASE_URL: &str = "https://allanime.day";
pub const DEFAULT_REFERER: &str = "https://allanime.to";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0";

/// Constants a resolution call runs with.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Host the decoded provider paths are requested from, without a trailing slash.
    pub base_url: String,
    pub referer: String,
    pub user_agent: String,
    pub priorities: PriorityTable,
    /// How many of the top priority domains trigger the fast path.
    pub preferred_count: usize,
    /// Spacing between provider request starts. Zero disables pacing.
    pub rate_limit: Duration,
    pub fast_path_window: Duration,
    /// Overall budget, measured from the start of the call.
    pub deadline: Duration,
    pub request_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            priorities: PriorityTable::default(),
            preferred_count: 3,
            rate_limit: Duration::from_millis(50),
            fast_path_window: Duration::from_secs(2),
            deadline: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Resolver {
    client: Client,
    config: Arc<ResolverConfig>,
}

impl Resolver {
    pub fn new(client: Client, config: ResolverConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Turns raw episode source descriptors into an ordered list of links.
    #[instrument(skip_all, fields(descriptors = descriptors.len()))]
    pub async fn resolve<S: AsRef<str>>(&self, descriptors: &[S]) -> Result<Vec<String>, ResolveError> {
        let candidates =
            prefilter::select_candidates(descriptors, self.config.priorities.dominant())?;
        debug!(candidates = candidates.len(), "resolving provider links");
        coordinator::collect_links(self.client.clone(), Arc::clone(&self.config), candidates).await
    }

    /// The link to hand to the player, if any.
    pub fn pick_best<'a>(&self, links: &'a [String]) -> Option<&'a str> {
        ranker::pick_best(links, &self.config.priorities)
    }

    pub fn priorities(&self) -> &PriorityTable {
        &self.config.priorities
    }
}
