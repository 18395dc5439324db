use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::Parser;
use dialoguer::Select;
use tracing::{info, warn};

mod config;
mod history;
mod player;
mod providers;
mod resolver;
mod telemetry;
mod types;

use config::Settings;
use history::{History, HistoryEntry, history_path, theme};
use providers::{AnimeProvider, allanime::AllAnimeClient};
use resolver::{ResolveError, Resolver};
use types::{EpisodeCounts, ShowInfo, Translation, compare_episode_labels, next_episode_label};

#[derive(Debug, Parser)]
#[command(name = "aniview", about = "Stream anime from AllAnime via mpv.", version)]
struct Cli {
    #[arg(long)]
    dub: bool,
    #[arg(long)]
    history: bool,

    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<String>,

    /// Config file to use instead of the default location.
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the default config file and exit.
    #[arg(long)]
    init_config: bool,

    /// Choose among the resolved links instead of playing the best one.
    #[arg(long)]
    pick_link: bool,

    /// Print the resolved links for the chosen episode and exit.
    #[arg(long)]
    links_only: bool,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init()?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    if cli.init_config {
        if Settings::write_default(&config_path)? {
            println!("Wrote default config to {}", config_path.display());
        } else {
            println!("Config already exists at {}", config_path.display());
        }
        return Ok(());
    }
    let settings = Settings::load(&config_path)?;

    let history_mode =
        cli.history || (cli.query.len() == 1 && cli.query[0].eq_ignore_ascii_case("history"));
    let history_path = history_path()?;
    let history = History::load(&history_path)?;
    let translation = if cli.dub {
        Translation::Dub
    } else {
        Translation::Sub
    };

    let mut session = Session {
        client: AllAnimeClient::new(&settings)?,
        settings,
        history,
        history_path,
        pick_link: cli.pick_link,
        links_only: cli.links_only,
    };

    if history_mode {
        if let Some(entry) = session.history.select_entry()? {
            let show = ShowInfo {
                id: entry.show_id.clone(),
                title: entry.show_title.clone(),
                available_eps: EpisodeCounts::default(),
            };
            session
                .play_show(entry.translation, show, Some(entry.episode.clone()))
                .await?;
        }
        return Ok(());
    }

    if cli.query.is_empty() {
        println!("No query provided. Use `aniview <name>` or `aniview --history`.");
        return Ok(());
    }

    let query = cli.query.join(" ");
    let shows = session.client.search_shows(&query, translation).await?;
    if shows.is_empty() {
        bail!("No results for \"{}\" ({})", query, translation.label());
    }

    let options: Vec<String> = shows
        .iter()
        .map(|s| format!("{} [{} episodes]", s.title, s.episode_count(translation)))
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a show (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let show = shows[idx].clone();
    session.play_show(translation, show, cli.episode.clone()).await
}

struct Session {
    client: AllAnimeClient,
    settings: Settings,
    history: History,
    history_path: PathBuf,
    pick_link: bool,
    links_only: bool,
}

impl Session {
    async fn play_show(
        &mut self,
        translation: Translation,
        show: ShowInfo,
        prefer_episode: Option<String>,
    ) -> Result<()> {
        let episodes = self.client.fetch_episodes(&show.id, translation).await?;
        if episodes.is_empty() {
            bail!(
                "No {} episodes available for {}",
                translation.label(),
                show.title
            );
        }

        let latest_available = episodes
            .iter()
            .max_by(|a, b| compare_episode_labels(a, b))
            .cloned()
            .unwrap_or_else(|| String::from("1"));
        println!(
            "Found {} {} episodes. Latest available: {}.",
            episodes.len(),
            translation.label(),
            latest_available
        );

        let last_watched = self.history.last_episode(&show.id, translation);
        if let Some(prev) = &last_watched {
            println!("Last watched {} episode: {}.", translation.label(), prev);
        }

        // A valid --episode jumps straight to playback on the first pass.
        let (mut current_episode, mut skip_selection) = match &prefer_episode {
            Some(ep) if episodes.contains(ep) => (ep.clone(), true),
            Some(ep) => {
                println!(
                    "Episode '{}' does not exist for '{}'. Showing episode list.",
                    ep, show.title
                );
                (
                    last_watched
                        .clone()
                        .unwrap_or_else(|| latest_available.clone()),
                    false,
                )
            }
            None => (
                last_watched
                    .clone()
                    .unwrap_or_else(|| latest_available.clone()),
                false,
            ),
        };

        loop {
            let default_idx = episodes
                .iter()
                .position(|ep| ep == &current_episode)
                .or_else(|| episodes.iter().position(|ep| ep == &latest_available))
                .unwrap_or(0);

            let idx = if skip_selection {
                skip_selection = false;
                default_idx
            } else {
                let selection = Select::with_theme(&theme())
                    .with_prompt("Episode to play (Enter to select, Esc to cancel)")
                    .items(&episodes)
                    .default(default_idx)
                    .interact_opt()?;
                let Some(i) = selection else {
                    println!("Exiting playback loop.");
                    return Ok(());
                };
                i
            };

            let chosen = episodes[idx].clone();
            let auto_advance = idx == default_idx;

            println!("Resolving streams for episode {}...", chosen);
            let links = match self
                .client
                .fetch_streams(&show.id, translation, &chosen)
                .await
            {
                Ok(links) => links,
                Err(err) if self.links_only => return Err(err),
                Err(err) => {
                    match err.downcast_ref::<ResolveError>() {
                        Some(resolve_err) => {
                            println!("Could not resolve episode {chosen}: {resolve_err}")
                        }
                        None => println!("Error fetching streams: {err:#}"),
                    }
                    current_episode = chosen;
                    continue;
                }
            };

            if links.is_empty() {
                if self.links_only {
                    bail!("No playable links found for episode {chosen}");
                }
                println!(
                    "No playable links found for episode {chosen}. Try another episode or rerun later."
                );
                current_episode = chosen;
                continue;
            }
            info!(episode = %chosen, links = links.len(), "episode resolved");

            if self.links_only {
                for link in ranked_links(&links, self.client.resolver()) {
                    println!("{link}");
                }
                return Ok(());
            }

            let link = if self.pick_link {
                match player::choose_link(&links, self.client.resolver().priorities()) {
                    Ok(Some(link)) => link,
                    Ok(None) => {
                        println!("Stream selection cancelled.");
                        current_episode = chosen;
                        continue;
                    }
                    Err(err) => {
                        println!("Could not select a stream: {err:#}");
                        current_episode = chosen;
                        continue;
                    }
                }
            } else {
                match self.client.resolver().pick_best(&links) {
                    Some(link) => link.to_string(),
                    None => {
                        warn!(episode = %chosen, "no link selected");
                        current_episode = chosen;
                        continue;
                    }
                }
            };

            let next_candidate = next_episode_label(&chosen, &episodes);

            player::launch_player(
                &self.settings.player,
                &link,
                &self.settings.api.referer,
                &show.title,
                &chosen,
            )
            .await?;

            self.history.upsert(HistoryEntry {
                show_id: show.id.clone(),
                show_title: show.title.clone(),
                episode: chosen.clone(),
                translation,
                watched_at: Utc::now(),
            });
            self.history.save(&self.history_path)?;
            match (auto_advance, next_candidate) {
                (true, Some(next)) => {
                    current_episode = next;
                }
                (true, None) => {
                    println!("No further episodes found. Exiting.");
                    return Ok(());
                }
                (false, candidate) => {
                    current_episode = candidate.unwrap_or(chosen);
                }
            }
        }
    }
}

/// Links with the ranker's choice moved to the front.
fn ranked_links(links: &[String], resolver: &Resolver) -> Vec<String> {
    let mut ordered = links.to_vec();
    let best = resolver
        .pick_best(links)
        .and_then(|best| links.iter().position(|link| link == best));
    if let Some(pos) = best {
        let link = ordered.remove(pos);
        ordered.insert(0, link);
    }
    ordered
}
