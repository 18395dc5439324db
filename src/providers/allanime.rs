use anyhow::{Context, Result, anyhow, bail};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use super::AnimeProvider;
use crate::config::{ApiSettings, Settings};
use crate::resolver::Resolver;
use crate::types::{EpisodeCounts, ShowInfo, Translation};

pub struct AllAnimeClient {
    client: Client,
    api: ApiSettings,
    resolver: Resolver,
}

impl AllAnimeClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.api.user_agent.as_str())
            .build()
            .context("failed to create HTTP client")?;
        let resolver = Resolver::new(client.clone(), settings.resolver_config());
        Ok(Self {
            client,
            api: settings.api.clone(),
            resolver,
        })
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        what: &str,
    ) -> Result<T> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });
        let response = self
            .client
            .post(&self.api.api_url)
            .header("Referer", self.api.referer.as_str())
            .header("Origin", self.api.base_url.as_str())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            bail!("AllAnime API HTTP {status}: {text}");
        }
        let envelope: GraphQlEnvelope<T> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {what} response"))?;
        Self::extract_data(envelope)
    }

    /// Raw source descriptors for one episode, in API order.
    pub async fn fetch_source_urls(
        &self,
        show_id: &str,
        translation: Translation,
        episode: &str,
    ) -> Result<Vec<String>> {
        let variables = serde_json::json!({
            "showId": show_id,
            "translationType": translation.as_str(),
            "episodeString": episode
        });
        let payload: EpisodePayload = self
            .query(EPISODE_SOURCES_QUERY, variables, "episode")
            .await?;
        let Some(episode_sources) = payload.episode else {
            bail!(
                "Episode {episode} is not available for {} translation",
                translation.label()
            );
        };
        let descriptors: Vec<String> = episode_sources
            .source_urls
            .into_iter()
            .map(|source| source.source_url)
            .collect();
        debug!(show_id, episode, descriptors = descriptors.len(), "episode sources fetched");
        Ok(descriptors)
    }

    fn extract_data<T>(envelope: GraphQlEnvelope<T>) -> Result<T> {
        if let Some(errors) = envelope.errors {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            bail!("AllAnime API error: {joined}");
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("AllAnime API returned empty response"))
    }
}

impl AnimeProvider for AllAnimeClient {
    async fn search_shows(&self, query: &str, translation: Translation) -> Result<Vec<ShowInfo>> {
        let variables = serde_json::json!({
            "search": {
                "allowAdult": false,
                "allowUnknown": false,
                "query": query,
            },
            "limit": self.api.search_limit,
            "page": 1,
            "translationType": translation.as_str(),
            "countryOrigin": "ALL"
        });
        let payload: SearchPayload = self.query(SEARCH_SHOWS_QUERY, variables, "search").await?;
        Ok(payload
            .shows
            .edges
            .into_iter()
            .map(|edge| ShowInfo {
                id: edge.id,
                title: edge
                    .english_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(edge.name),
                available_eps: EpisodeCounts {
                    sub: edge.available_episodes.sub,
                    dub: edge.available_episodes.dub,
                },
            })
            .collect())
    }

    async fn fetch_episodes(&self, show_id: &str, translation: Translation) -> Result<Vec<String>> {
        let variables = serde_json::json!({ "showId": show_id });
        let payload: ShowDetailPayload = self
            .query(SHOW_DETAIL_QUERY, variables, "show detail")
            .await?;
        let detail = payload.show.available_episodes_detail;
        Ok(match translation {
            Translation::Sub => detail.sub,
            Translation::Dub => detail.dub,
        })
    }

    async fn fetch_streams(
        &self,
        show_id: &str,
        translation: Translation,
        episode: &str,
    ) -> Result<Vec<String>> {
        let descriptors = self
            .fetch_source_urls(show_id, translation, episode)
            .await?;
        let links = self.resolver.resolve(&descriptors).await?;
        Ok(links)
    }
}

// --- GraphQL Structs ---

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    shows: SearchShows,
}

#[derive(Debug, Deserialize)]
struct SearchShows {
    edges: Vec<SearchEdge>,
}

#[derive(Debug, Deserialize)]
struct SearchEdge {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "englishName")]
    #[serde(default)]
    english_name: Option<String>,
    #[serde(rename = "availableEpisodes")]
    #[serde(default)]
    available_episodes: AvailabilitySnapshot,
}

#[derive(Debug, Deserialize, Default)]
struct AvailabilitySnapshot {
    #[serde(default)]
    sub: usize,
    #[serde(default)]
    dub: usize,
}

#[derive(Debug, Deserialize)]
struct ShowDetailPayload {
    show: ShowDetail,
}

#[derive(Debug, Deserialize)]
struct ShowDetail {
    #[serde(rename = "availableEpisodesDetail")]
    #[serde(default)]
    available_episodes_detail: EpisodeDetail,
}

#[derive(Debug, Deserialize, Default)]
struct EpisodeDetail {
    #[serde(default)]
    sub: Vec<String>,
    #[serde(default)]
    dub: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodePayload {
    episode: Option<EpisodeSources>,
}

#[derive(Debug, Deserialize)]
struct EpisodeSources {
    #[serde(rename = "sourceUrls")]
    #[serde(default)]
    source_urls: Vec<SourceUrl>,
}

#[derive(Debug, Deserialize)]
struct SourceUrl {
    #[serde(rename = "sourceUrl")]
    source_url: String,
}

// --- Queries ---

const SEARCH_SHOWS_QUERY: &str = r#"query($search: SearchInput, $limit: Int, $page: Int, $translationType: VaildTranslationTypeEnumType, $countryOrigin: VaildCountryOriginEnumType) {
  shows(search: $search, limit: $limit, page: $page, translationType: $translationType, countryOrigin: $countryOrigin) {
    edges {
      _id
      name
      englishName
      availableEpisodes
    }
  }
}"#;

const SHOW_DETAIL_QUERY: &str = r#"query($showId: String!) {
  show(_id: $showId) {
    _id
    name
    availableEpisodesDetail
  }
}"#;

const EPISODE_SOURCES_QUERY: &str = r#"query($showId: String!, $translationType: VaildTranslationTypeEnumType!, $episodeString: String!) {
  episode(showId: $showId, translationType: $translationType, episodeString: $episodeString) {
    episodeString
    sourceUrls
  }
}"#;
