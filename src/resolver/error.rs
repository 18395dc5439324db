use std::time::Duration;

use thiserror::Error;

/// A source descriptor that cannot be fetched. Dropped before fetching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed source descriptor {raw:?}")]
pub struct MalformedDescriptor {
    pub raw: String,
}

/// Failure of a single provider fetch. Never aborts sibling fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A fetch failure tagged with the position of its descriptor.
#[derive(Debug, Error)]
#[error("source {}: {error}", .index + 1)]
pub struct TaskError {
    pub index: usize,
    #[source]
    pub error: FetchError,
}

/// Fatal outcome of a resolution call.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no valid source descriptors found")]
    NoCandidates,

    #[error("timed out after {waited:?} without a successful provider response")]
    Timeout { waited: Duration },

    #[error("no links found from {attempted} sources: [{}]", join_errors(.errors))]
    NoLinksFound {
        attempted: usize,
        errors: Vec<TaskError>,
    },
}

fn join_errors(errors: &[TaskError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
