use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    Sub,
    Dub,
}

impl Translation {
    pub fn as_str(self) -> &'static str {
        match self {
            Translation::Sub => "sub",
            Translation::Dub => "dub",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Translation::Sub => "Sub",
            Translation::Dub => "Dub",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShowInfo {
    pub id: String,
    pub title: String,
    pub available_eps: EpisodeCounts,
}

impl ShowInfo {
    pub fn episode_count(&self, translation: Translation) -> usize {
        match translation {
            Translation::Sub => self.available_eps.sub,
            Translation::Dub => self.available_eps.dub,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeCounts {
    pub sub: usize,
    pub dub: usize,
}

pub fn compare_episode_labels(left: &str, right: &str) -> Ordering {
    let l = parse_episode_key(left);
    let r = parse_episode_key(right);
    l.partial_cmp(&r).unwrap_or(Ordering::Equal)
}

fn parse_episode_key(label: &str) -> f32 {
    label.parse::<f32>().unwrap_or(0.0)
}

/// Episode labels in ascending numeric order ("1", "2", "10", "12.5").
pub fn sorted_episode_labels(episodes: &[String]) -> Vec<String> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| compare_episode_labels(a, b));
    sorted.dedup();
    sorted
}

pub fn next_episode_label(current: &str, episodes: &[String]) -> Option<String> {
    let sorted = sorted_episode_labels(episodes);
    let pos = sorted.iter().position(|ep| ep == current)?;
    sorted.get(pos + 1).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sorts_labels_numerically() {
        let episodes = labels(&["10", "2", "1", "12.5", "2"]);
        assert_eq!(sorted_episode_labels(&episodes), ["1", "2", "10", "12.5"]);
    }

    #[test]
    fn next_episode_follows_numeric_order() {
        let episodes = labels(&["3", "1", "2"]);
        assert_eq!(next_episode_label("1", &episodes), Some("2".to_string()));
        assert_eq!(next_episode_label("3", &episodes), None);
        assert_eq!(next_episode_label("7", &episodes), None);
    }

    #[test]
    fn translation_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Translation::Dub).unwrap(), "\"dub\"");
        assert_eq!(Translation::Sub.as_str(), "sub");
    }
}
