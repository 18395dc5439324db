use anyhow::{Context, Result, anyhow, bail};
use config::{Config, Environment, File, FileFormat};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

use crate::resolver::{
    DEFAULT_BASE_URL, DEFAULT_REFERER, DEFAULT_USER_AGENT, PriorityTable, ResolverConfig,
};

pub const ENV_PREFIX: &str = "ANIVIEW";
const ALLANIME_API_URL: &str = "https://api.allanime.day/api";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub resolver: ResolverSettings,
    pub player: PlayerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub api_url: String,
    pub base_url: String,
    pub referer: String,
    pub user_agent: String,
    pub search_limit: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_url: ALLANIME_API_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search_limit: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub priority_domains: Vec<String>,
    pub preferred_count: usize,
    pub rate_limit_ms: u64,
    pub fast_path_window_ms: u64,
    pub deadline_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let defaults = ResolverConfig::default();
        Self {
            priority_domains: defaults.priorities.domains().to_vec(),
            preferred_count: defaults.preferred_count,
            rate_limit_ms: millis(defaults.rate_limit),
            fast_path_window_ms: millis(defaults.fast_path_window),
            deadline_ms: millis(defaults.deadline),
            request_timeout_ms: millis(defaults.request_timeout),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub command: String,
    /// mpv JSON IPC socket; empty disables it.
    pub ipc_socket: String,
    pub extra_args: Vec<String>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            command: "mpv".to_string(),
            ipc_socket: String::new(),
            extra_args: Vec::new(),
        }
    }
}

impl Settings {
    /// Loads settings from the config file (if present) and `ANIVIEW_*` variables.
    pub fn load(path: &Path) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("resolver.priority_domains")
                    .with_list_parse_key("player.extra_args")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes the defaults to `path` unless a file already exists there.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let data = toml::to_string_pretty(&Settings::default())
            .context("failed to serialize default config")?;
        fs::write(path, data)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("api.api_url", &self.api.api_url), ("api.base_url", &self.api.base_url)] {
            Url::parse(value).with_context(|| format!("{name} is not a valid URL: {value}"))?;
        }
        if self.resolver.priority_domains.is_empty() {
            bail!("resolver.priority_domains must list at least one domain");
        }
        if self
            .resolver
            .priority_domains
            .iter()
            .any(|domain| domain.trim().is_empty())
        {
            bail!("resolver.priority_domains must not contain empty entries");
        }
        if self.resolver.deadline_ms == 0 || self.resolver.request_timeout_ms == 0 {
            bail!("resolver.deadline_ms and resolver.request_timeout_ms must be positive");
        }
        if self.player.command.trim().is_empty() {
            bail!("player.command must not be empty");
        }
        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        let resolver = &self.resolver;
        ResolverConfig {
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            referer: self.api.referer.clone(),
            user_agent: self.api.user_agent.clone(),
            priorities: PriorityTable::new(
                resolver.priority_domains.iter().map(|domain| domain.trim()),
            ),
            preferred_count: resolver.preferred_count,
            rate_limit: Duration::from_millis(resolver.rate_limit_ms),
            fast_path_window: Duration::from_millis(resolver.fast_path_window_ms),
            deadline: Duration::from_millis(resolver.deadline_ms),
            request_timeout: Duration::from_millis(resolver.request_timeout_ms),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(base.join("aniview").join("config.toml"))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
