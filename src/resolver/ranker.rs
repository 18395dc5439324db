/// Ordered provider domains, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    domains: Vec<String>,
}

impl PriorityTable {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    /// The provider whose descriptors collapse all others during pre-filtering.
    pub fn dominant(&self) -> Option<&str> {
        self.domains.first().map(String::as_str)
    }

    /// The first `count` domains, used to trigger the fast path.
    pub fn preferred(&self, count: usize) -> &[String] {
        &self.domains[..count.min(self.domains.len())]
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Score of the first domain contained in `link`; higher is better.
    pub fn score(&self, link: &str) -> Option<usize> {
        let total = self.domains.len();
        self.domains
            .iter()
            .position(|domain| link.contains(domain.as_str()))
            .map(|idx| total - idx)
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::new(["filemoon", "sharepoint", "doodstream", "mp4upload"])
    }
}

/// Picks the link served by the highest-ranked provider.
///
/// Falls back to the first candidate when no link matches the table and
/// returns `None` only for an empty candidate list.
pub fn pick_best<'a>(links: &'a [String], table: &PriorityTable) -> Option<&'a str> {
    let mut best: Option<(usize, &str)> = None;
    for link in links {
        let Some(score) = table.score(link) else {
            continue;
        };
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, link));
        }
    }
    best.map(|(_, link)| link)
        .or_else(|| links.first().map(String::as_str))
}
